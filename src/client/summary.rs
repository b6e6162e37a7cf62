//! Balance summaries for the signed-in user.

use super::RoommateApp;
use crate::{
    cache::keys,
    core::{
        balance::{self, Summary},
        room,
    },
    notifications::PushNotifier,
};
use tracing::error;

impl<N: PushNotifier> RoommateApp<N> {
    /// Summary of a room for the signed-in user.
    ///
    /// `None` without a room or a session, and for rooms the user does not belong to.
    /// Falls back to the last cached summary when the backend cannot be reached.
    pub async fn summary(&self, room_id: Option<&str>) -> Option<Summary> {
        let room_id = room_id?;
        let user = self.current_user().await?;

        let computed = match room::is_member(self.db(), room_id, &user.id).await {
            Ok(false) => return None,
            Ok(true) => balance::room_summary(self.db(), Some(room_id), Some(&user.id)).await,
            Err(e) => Err(e),
        };
        match computed {
            Ok(summary) => {
                if let Some(summary) = &summary {
                    self.cache.set(&keys::summary(room_id), summary, false).await;
                }
                summary
            }
            Err(e) => {
                error!("Error calculating summary: {}", e);
                self.cache.get(&keys::summary(room_id)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use crate::core::transaction::NewTransaction;
    use crate::entities::TransactionKind;
    use crate::errors::Result;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_summary_without_room_or_user() -> Result<()> {
        let app = setup_test_app().await?;
        assert!(app.summary(None).await.is_none());
        assert!(app.summary(Some("room")).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_for_both_sides() -> Result<()> {
        let (alice_app, bob_app, room_id) = setup_shared_room().await?;
        let alice = alice_app.current_user().await.unwrap();
        let bob = bob_app.current_user().await.unwrap();

        bob_app
            .add_transaction(
                &room_id,
                NewTransaction {
                    amount: 60.0,
                    kind: TransactionKind::Shared,
                    description: "Pizza".to_string(),
                    target_user_id: alice.id.clone(),
                },
            )
            .await?;

        let bob_view = bob_app.summary(Some(&room_id)).await.unwrap();
        let with_alice = bob_view.balance_with(&alice.id).unwrap();
        assert_eq!(with_alice.owes_you, 30.0);
        assert_eq!(bob_view.totals.net_balance, 30.0);

        let alice_view = alice_app.summary(Some(&room_id)).await.unwrap();
        let with_bob = alice_view.balance_with(&bob.id).unwrap();
        assert_eq!(with_bob.you_owe, 30.0);
        assert_eq!(alice_view.totals.net_balance, -30.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_hidden_from_outsiders() -> Result<()> {
        let (_alice_app, bob_app, room_id) = setup_shared_room().await?;
        let mallory_app = app_sharing(&bob_app);
        sign_up_test_user(&mallory_app, "Mallory").await?;

        assert!(mallory_app.summary(Some(&room_id)).await.is_none());
        assert!(bob_app.summary(Some(&room_id)).await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_cache() -> Result<()> {
        let (_alice_app, bob_app, room_id) = setup_shared_room().await?;
        let fresh = bob_app.summary(Some(&room_id)).await.unwrap();

        let broken = app_with_broken_backend(&bob_app).await?;
        let cached = broken.summary(Some(&room_id)).await.unwrap();
        assert_eq!(cached, fresh);
        Ok(())
    }
}
