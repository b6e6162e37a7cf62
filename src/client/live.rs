//! Live room summaries.
//!
//! A [`LiveSummary`] recomputes a room's summary whenever a transaction or membership of
//! that room changes. Each computation is tagged with the generation it started in;
//! after [`LiveSummary::close`] the generation moves on and late results are dropped.

use super::RoommateApp;
use crate::{
    core::balance::Summary,
    notifications::PushNotifier,
    realtime::{SubscriptionFilter, Table},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to a background task keeping one room's summary current.
#[derive(Debug)]
pub struct LiveSummary {
    room_id: String,
    receiver: watch::Receiver<Option<Summary>>,
    generation: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl LiveSummary {
    /// Starts following `room_id` for the signed-in user of `app`.
    #[must_use]
    pub fn spawn<N>(app: Arc<RoommateApp<N>>, room_id: impl Into<String>) -> Self
    where
        N: PushNotifier + 'static,
    {
        let room_id = room_id.into();
        let (sender, receiver) = watch::channel(None);
        let generation = Arc::new(AtomicU64::new(0));

        // Subscribe before the first computation so no change slips in between
        let mut transactions = app
            .feed()
            .subscribe(SubscriptionFilter::room(Table::Transactions, room_id.as_str()));
        let mut members = app
            .feed()
            .subscribe(SubscriptionFilter::room(Table::RoomMembers, room_id.as_str()));

        let task = {
            let generation = Arc::clone(&generation);
            let room_id = room_id.clone();
            tokio::spawn(async move {
                let started = generation.load(Ordering::SeqCst);
                loop {
                    let summary = app.summary(Some(&room_id)).await;
                    if generation.load(Ordering::SeqCst) != started {
                        debug!(%room_id, "Dropping summary computed after close");
                        break;
                    }
                    sender.send_replace(summary);

                    let event = tokio::select! {
                        event = transactions.next() => event,
                        event = members.next() => event,
                    };
                    let Some(event) = event else {
                        break;
                    };
                    debug!(?event, "Recomputing summary");
                }
            })
        };

        info!(%room_id, "Following room summary");
        Self {
            room_id,
            receiver,
            generation,
            task,
        }
    }

    /// Room being followed.
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Current generation; bumped by [`close`](Self::close).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Latest published summary.
    #[must_use]
    pub fn current(&self) -> Option<Summary> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next recomputation. `None` once the task has stopped.
    pub async fn changed(&mut self) -> Option<Summary> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }

    /// Stops following. Results still in flight are discarded.
    pub fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for LiveSummary {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::transaction::NewTransaction;
    use crate::entities::TransactionKind;
    use crate::errors::Result;
    use crate::test_utils::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_live_summary_recomputes_on_change() -> Result<()> {
        let (alice_app, bob_app, room_id) = setup_shared_room().await?;
        let alice = alice_app.current_user().await.unwrap();
        let bob_app = Arc::new(bob_app);

        let mut live = LiveSummary::spawn(Arc::clone(&bob_app), room_id.as_str());
        let initial = timeout(Duration::from_secs(5), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(initial.totals.net_balance, 0.0);

        bob_app
            .add_transaction(
                &room_id,
                NewTransaction {
                    amount: 40.0,
                    kind: TransactionKind::Lent,
                    description: "Groceries".to_string(),
                    target_user_id: alice.id.clone(),
                },
            )
            .await?;

        let updated = timeout(Duration::from_secs(5), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.balance_with(&alice.id).unwrap().owes_you, 40.0);
        assert_eq!(live.current(), Some(updated));
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_room_clears_summary() -> Result<()> {
        let (alice_app, bob_app, room_id) = setup_shared_room().await?;
        let bob_app = Arc::new(bob_app);

        let mut live = LiveSummary::spawn(Arc::clone(&bob_app), room_id.as_str());
        timeout(Duration::from_secs(5), live.changed())
            .await
            .unwrap()
            .unwrap();

        alice_app.delete_room(&room_id).await?;

        let next = timeout(Duration::from_secs(5), live.changed()).await.unwrap();
        assert!(next.is_none());
        assert!(live.current().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_close_stops_updates() -> Result<()> {
        let (alice_app, bob_app, room_id) = setup_shared_room().await?;
        let alice = alice_app.current_user().await.unwrap();
        let bob_app = Arc::new(bob_app);

        let mut live = LiveSummary::spawn(Arc::clone(&bob_app), room_id.as_str());
        timeout(Duration::from_secs(5), live.changed()).await.unwrap();
        let before = live.generation();

        live.close();
        assert_eq!(live.generation(), before + 1);

        bob_app
            .add_transaction(
                &room_id,
                NewTransaction {
                    amount: 40.0,
                    kind: TransactionKind::Lent,
                    description: "Groceries".to_string(),
                    target_user_id: alice.id.clone(),
                },
            )
            .await?;

        // The task is gone, so the channel closes without a new value
        let next = timeout(Duration::from_secs(5), live.changed()).await.unwrap();
        assert!(next.is_none());
        assert_eq!(live.current().unwrap().totals.net_balance, 0.0);
        Ok(())
    }
}
