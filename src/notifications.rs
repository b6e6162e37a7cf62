//! Push notifications for new transactions.
//!
//! Delivery goes through the [`PushNotifier`] capability so the client can be tested
//! without the network. [`ExpoPushClient`] is the production implementation.
//!
//! Notifications are best effort: a missing push token, disabled notifications or a
//! delivery failure is logged and never fails the transaction that triggered it.

use crate::{
    config::NotificationSettings,
    core::auth,
    entities::{TransactionKind, transaction},
    errors::Result,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Title of every transaction notification.
pub const TRANSACTION_TITLE: &str = "New Transaction";

/// One push message in the Expo wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Device push token
    pub to: String,
    /// Notification sound
    pub sound: String,
    /// Title line
    pub title: String,
    /// Body text
    pub body: String,
    /// Payload handed to the app when the notification is opened
    pub data: serde_json::Value,
}

impl PushMessage {
    /// Creates a message with the default sound.
    pub fn new(
        to: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            to: to.into(),
            sound: "default".to_string(),
            title: title.into(),
            body: body.into(),
            data,
        }
    }
}

/// Something that can deliver a push message.
pub trait PushNotifier: Send + Sync {
    /// Delivers one message.
    fn send(&self, message: &PushMessage) -> impl Future<Output = Result<()>> + Send;
}

/// Posts messages to the Expo push API.
#[derive(Debug, Clone)]
pub struct ExpoPushClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ExpoPushClient {
    /// Builds a client for the configured endpoint and timeout.
    pub fn new(settings: &NotificationSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: settings.push_endpoint.clone(),
        })
    }
}

impl PushNotifier for ExpoPushClient {
    async fn send(&self, message: &PushMessage) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(message)
            .send()
            .await?
            .error_for_status()?;
        let receipt: serde_json::Value = response.json().await?;
        debug!(%receipt, "Push notification sent");
        Ok(())
    }
}

/// Body text for a transaction notification, e.g. `"Bob lent you $40 - Groceries"`.
#[must_use]
pub fn transaction_notification_body(
    from_name: &str,
    kind: TransactionKind,
    amount: f64,
    description: &str,
) -> String {
    let verb = match kind {
        TransactionKind::Lent => "lent you",
        TransactionKind::Borrowed => "borrowed from you",
        TransactionKind::Shared => "shared an expense with you for",
    };
    format!("{from_name} {verb} ${amount} - {description}")
}

/// Builds the notification for a new transaction addressed to `push_token`.
#[must_use]
pub fn transaction_message(
    push_token: &str,
    from_name: &str,
    transaction: &transaction::Model,
) -> PushMessage {
    PushMessage::new(
        push_token,
        TRANSACTION_TITLE,
        transaction_notification_body(
            from_name,
            transaction.kind,
            transaction.amount,
            &transaction.description,
        ),
        json!({
            "roomId": transaction.room_id,
            "type": "transaction",
            "transactionId": transaction.id,
            "amount": transaction.amount,
            "kind": transaction.kind.as_str(),
            "description": transaction.description,
        }),
    )
}

/// Notifies the target of a new transaction. Returns whether a message was delivered.
///
/// Never fails: every problem is logged and reported as `false`.
pub async fn notify_transaction<N: PushNotifier>(
    db: &DatabaseConnection,
    notifier: &N,
    settings: &NotificationSettings,
    from_name: &str,
    transaction: &transaction::Model,
) -> bool {
    if !settings.enabled {
        debug!("Notifications disabled, skipping");
        return false;
    }

    let push_token = match auth::get_profile(db, &transaction.to_user_id).await {
        Ok(Some(profile)) => profile.push_token.filter(|t| !t.is_empty()),
        Ok(None) => None,
        Err(e) => {
            warn!("Error loading recipient profile: {}", e);
            return false;
        }
    };
    let Some(push_token) = push_token else {
        info!(user_id = %transaction.to_user_id, "No push token found for user");
        return false;
    };

    let message = transaction_message(&push_token, from_name, transaction);
    match notifier.send(&message).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Error sending transaction notification: {}", e);
            false
        }
    }
}
