//! Client layer - the application facade used by front ends.
//!
//! [`RoommateApp`] is built once at start-up with its collaborators injected: the
//! backend database, the local cache, the change feed and a push notifier. Each
//! submodule adds one feature area to it.
//!
//! Reads never fail: they refresh from the backend, re-cache, and on error log and fall
//! back to the cached copy (or empty). Writes require a signed-in user, propagate
//! errors, publish change events and refresh the affected caches.

/// Sign-up, sign-in, session restore and sign-out
pub mod auth;
/// Live room summaries driven by the change feed
pub mod live;
/// Room management and membership
pub mod rooms;
/// Per-room balance summaries
pub mod summary;
/// Ledger entries, settlement and export
pub mod transactions;

pub use live::LiveSummary;

use crate::{
    cache::LocalCache,
    config::{AppConfig, AuthSettings, NotificationSettings},
    core::auth::{AuthSession, AuthUser, LoginThrottle},
    errors::{Error, Result},
    notifications::PushNotifier,
    realtime::ChangeFeed,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for one signed-in device.
pub struct RoommateApp<N> {
    db: Arc<DatabaseConnection>,
    cache: Arc<LocalCache>,
    feed: ChangeFeed,
    notifier: N,
    auth_settings: AuthSettings,
    notification_settings: NotificationSettings,
    throttle: LoginThrottle,
    session: RwLock<Option<AuthSession>>,
}

impl<N: PushNotifier> RoommateApp<N> {
    /// Creates the facade. No session is active until a sign-in or
    /// [`restore_session`](Self::restore_session).
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: Arc<LocalCache>,
        feed: ChangeFeed,
        notifier: N,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            cache,
            feed,
            notifier,
            throttle: LoginThrottle::from_settings(&config.auth),
            auth_settings: config.auth.clone(),
            notification_settings: config.notifications.clone(),
            session: RwLock::new(None),
        }
    }

    /// Backend connection.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Shared handle to the backend connection, for building more facades over it.
    pub const fn shared_db(&self) -> &Arc<DatabaseConnection> {
        &self.db
    }

    /// Local cache.
    pub const fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    /// Change feed mutations are published on.
    pub const fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Push notifier used for new transactions.
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    /// The signed-in user, if any.
    pub async fn current_user(&self) -> Option<AuthUser> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }

    async fn require_user(&self) -> Result<AuthUser> {
        self.current_user().await.ok_or(Error::NotAuthenticated)
    }
}
