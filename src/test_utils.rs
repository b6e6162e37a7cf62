//! Shared test utilities for the roommate tracker.
//!
//! This module provides common helper functions for setting up test databases,
//! creating test entities with sensible defaults and building client facades wired to
//! in-memory storage and notifier doubles.
#![allow(clippy::unwrap_used)]

use crate::{
    cache::LocalCache,
    client::RoommateApp,
    config::AppConfig,
    core::{
        auth::AuthUser,
        room,
        transaction::{self, NewTransaction},
    },
    entities::{TransactionKind, TransactionStatus, profile},
    errors::{Error, Result},
    notifications::{PushMessage, PushNotifier},
    realtime::ChangeFeed,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Creates an in-memory `SQLite` database with all backend tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_backend_tables(&db).await?;
    Ok(db)
}

/// Creates a cache over its own in-memory database.
pub async fn setup_test_cache(online: bool) -> Result<LocalCache> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    LocalCache::open(db, online).await
}

/// Creates a confirmed profile without a password.
///
/// # Defaults
/// * `email`: lower-cased name at `example.com`, e.g. `alice@example.com`
/// * `full_name`: same as `name`
pub async fn create_test_user(db: &DatabaseConnection, name: &str) -> Result<profile::Model> {
    let now = Utc::now();
    profile::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(format!("{}@example.com", name.to_lowercase())),
        name: Set(name.to_string()),
        full_name: Set(name.to_string()),
        password_hash: Set(None),
        email_confirmed: Set(true),
        push_token: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates users for `names` and a room they all belong to.
/// The first user creates the room, the others join with its invite code.
pub async fn setup_room_with_members(
    names: &[&str],
) -> Result<(DatabaseConnection, crate::entities::room::Model, Vec<profile::Model>)> {
    let db = setup_test_db().await?;
    let mut users = Vec::with_capacity(names.len());
    for name in names {
        users.push(create_test_user(&db, name).await?);
    }
    let creator = users.first().ok_or(Error::MissingField { field: "names" })?;
    let room_model = room::create_room(&db, "Test Room", "", &creator.id).await?;
    for user in users.iter().skip(1) {
        room::join_room(&db, &room_model.invite_code, &user.id).await?;
    }
    Ok((db, room_model, users))
}

/// Creates a pending `lent` transaction described as `"Test transaction"`.
pub async fn create_test_transaction(
    db: &DatabaseConnection,
    room_id: &str,
    from_user_id: &str,
    to_user_id: &str,
    amount: f64,
) -> Result<crate::entities::transaction::Model> {
    create_custom_transaction(db, room_id, from_user_id, to_user_id, amount, TransactionKind::Lent)
        .await
}

/// Creates a pending transaction of the given kind.
pub async fn create_custom_transaction(
    db: &DatabaseConnection,
    room_id: &str,
    from_user_id: &str,
    to_user_id: &str,
    amount: f64,
    kind: TransactionKind,
) -> Result<crate::entities::transaction::Model> {
    transaction::create_transaction(
        db,
        room_id,
        from_user_id,
        NewTransaction {
            amount,
            kind,
            description: "Test transaction".to_string(),
            target_user_id: to_user_id.to_string(),
        },
    )
    .await
}

/// Builds a transaction row in memory, without storage.
pub fn sample_transaction_model(
    room_id: &str,
    from_user_id: &str,
    to_user_id: &str,
    amount: f64,
    kind: TransactionKind,
) -> crate::entities::transaction::Model {
    crate::entities::transaction::Model {
        id: Uuid::new_v4().to_string(),
        room_id: room_id.to_string(),
        amount,
        kind,
        description: "Test transaction".to_string(),
        from_user_id: from_user_id.to_string(),
        to_user_id: to_user_id.to_string(),
        status: TransactionStatus::Pending,
        settled_at: None,
        created_at: Utc::now(),
    }
}

/// Notifier that records every message it is asked to send.
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<PushMessage>>>,
}

impl RecordingNotifier {
    /// Messages sent so far, oldest first.
    pub fn messages(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl PushNotifier for RecordingNotifier {
    async fn send(&self, message: &PushMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Notifier whose deliveries always fail.
#[derive(Debug, Clone, Copy)]
pub struct FailingNotifier;

impl PushNotifier for FailingNotifier {
    async fn send(&self, _message: &PushMessage) -> Result<()> {
        Err(Error::Notification {
            message: "push endpoint unreachable".to_string(),
        })
    }
}

/// Client facade over fresh in-memory backend and cache, online, signed out.
pub async fn setup_test_app() -> Result<RoommateApp<RecordingNotifier>> {
    let db = setup_test_db().await?;
    let cache = setup_test_cache(true).await?;
    Ok(RoommateApp::new(
        Arc::new(db),
        Arc::new(cache),
        ChangeFeed::new(),
        RecordingNotifier::default(),
        &AppConfig::default(),
    ))
}

/// A second signed-out facade sharing backend, cache, feed and notifier record with
/// `app`, as another device of the same deployment would.
pub fn app_sharing(app: &RoommateApp<RecordingNotifier>) -> RoommateApp<RecordingNotifier> {
    app_with_notifier(app, app.notifier().clone())
}

/// Like [`app_sharing`] with a different notifier.
pub fn app_with_notifier<N: PushNotifier>(
    app: &RoommateApp<RecordingNotifier>,
    notifier: N,
) -> RoommateApp<N> {
    RoommateApp::new(
        Arc::clone(app.shared_db()),
        Arc::clone(app.cache()),
        app.feed().clone(),
        notifier,
        &AppConfig::default(),
    )
}

/// A facade sharing `app`'s cache whose backend has no tables, so every backend
/// query fails. The session is restored from the cache.
pub async fn app_with_broken_backend(
    app: &RoommateApp<RecordingNotifier>,
) -> Result<RoommateApp<RecordingNotifier>> {
    let broken_db = sea_orm::Database::connect("sqlite::memory:").await?;
    let broken = RoommateApp::new(
        Arc::new(broken_db),
        Arc::clone(app.cache()),
        app.feed().clone(),
        app.notifier().clone(),
        &AppConfig::default(),
    );
    broken.restore_session().await;
    Ok(broken)
}

/// Signs up `name` (`<name>@example.com`, password `password123`) on `app`.
pub async fn sign_up_test_user<N: PushNotifier>(
    app: &RoommateApp<N>,
    name: &str,
) -> Result<AuthUser> {
    app.sign_up(
        &format!("{}@example.com", name.to_lowercase()),
        "password123",
        name,
    )
    .await?;
    app.current_user().await.ok_or(Error::NotAuthenticated)
}

/// Alice's and Bob's facades sharing one deployment, both members of one room that
/// Alice created. Returns `(alice_app, bob_app, room_id)`.
pub async fn setup_shared_room() -> Result<(
    RoommateApp<RecordingNotifier>,
    RoommateApp<RecordingNotifier>,
    String,
)> {
    let alice_app = setup_test_app().await?;
    sign_up_test_user(&alice_app, "Alice").await?;
    let created = alice_app.create_room("Apt 4B", "").await?;

    let bob_app = app_sharing(&alice_app);
    sign_up_test_user(&bob_app, "Bob").await?;
    bob_app.join_room(&created.invite_code).await?;

    Ok((alice_app, bob_app, created.id))
}
