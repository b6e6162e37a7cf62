//! In-process change feed.
//!
//! Every committed mutation publishes a [`ChangeEvent`]. Consumers open a
//! [`Subscription`] for one table, optionally narrowed to one room, and pull matching
//! events with [`Subscription::next`]. A subscription that falls behind the channel
//! capacity receives a synthetic [`ChangeKind::Resync`] event instead of the dropped
//! ones, so the consumer refetches rather than missing a change.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

/// Events buffered per subscriber before it is considered lagging.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Tables that publish changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// `rooms`
    Rooms,
    /// `room_members`
    RoomMembers,
    /// `transactions`
    Transactions,
}

/// What happened to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Row created
    Insert,
    /// Row changed
    Update,
    /// Row removed
    Delete,
    /// Events were dropped; refetch everything for the table
    Resync,
}

/// A single row change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table the row belongs to
    pub table: Table,
    /// Kind of change
    pub kind: ChangeKind,
    /// Room the row is scoped to, when it has one
    pub room_id: Option<String>,
    /// Primary key of the row, empty for resync events
    pub row_id: String,
}

impl ChangeEvent {
    /// Creates an event for a row.
    pub fn new(
        table: Table,
        kind: ChangeKind,
        room_id: Option<String>,
        row_id: impl Into<String>,
    ) -> Self {
        Self {
            table,
            kind,
            room_id,
            row_id: row_id.into(),
        }
    }

    /// Synthetic event telling a lagging subscriber to refetch.
    #[must_use]
    pub fn resync(table: Table, room_id: Option<String>) -> Self {
        Self::new(table, ChangeKind::Resync, room_id, String::new())
    }
}

/// Which events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    /// Table to follow
    pub table: Table,
    /// Restrict to one room; `None` follows the whole table
    pub room_id: Option<String>,
}

impl SubscriptionFilter {
    /// Follows every change to `table`.
    #[must_use]
    pub const fn table(table: Table) -> Self {
        Self {
            table,
            room_id: None,
        }
    }

    /// Follows changes to `table` scoped to one room.
    pub fn room(table: Table, room_id: impl Into<String>) -> Self {
        Self {
            table,
            room_id: Some(room_id.into()),
        }
    }

    /// Whether `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        match &self.room_id {
            Some(room_id) => event.room_id.as_deref() == Some(room_id.as_str()),
            None => true,
        }
    }
}

/// Publisher side of the feed. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    inner: Arc<broadcast::Sender<ChangeEvent>>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    /// Creates a feed with [`CHANNEL_CAPACITY`] slots.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Creates a feed with a custom per-subscriber buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(sender),
        }
    }

    /// Publishes an event to every live subscription.
    pub fn publish(&self, event: ChangeEvent) {
        trace!(?event, "Publishing change");
        // No subscribers is not an error
        let _ = self.inner.send(event);
    }

    /// Opens a subscription.
    #[must_use]
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        Subscription {
            filter,
            receiver: self.inner.subscribe(),
        }
    }

    /// Number of open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.receiver_count()
    }
}

/// A live listener on the feed. Dropping it releases the listener.
#[derive(Debug)]
pub struct Subscription {
    filter: SubscriptionFilter,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// The filter this subscription was opened with.
    #[must_use]
    pub const fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    /// Waits for the next matching event.
    ///
    /// Returns `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        skipped,
                        table = ?self.filter.table,
                        "Subscription lagged, requesting resync"
                    );
                    return Some(ChangeEvent::resync(
                        self.filter.table,
                        self.filter.room_id.clone(),
                    ));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Stops listening.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
