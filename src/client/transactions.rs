//! Ledger features of the client: listing, recording, settling and exporting.

use super::RoommateApp;
use crate::{
    cache::keys,
    core::{
        report, room,
        transaction::{self, NewTransaction, TransactionWithParties},
    },
    entities::transaction as transaction_entity,
    errors::{Error, Result},
    notifications::{self, PushNotifier},
    realtime::{ChangeEvent, ChangeKind, Table},
};
use tracing::error;

impl<N: PushNotifier> RoommateApp<N> {
    /// Transactions of a room from the last successful fetch.
    pub async fn cached_transactions(&self, room_id: &str) -> Vec<TransactionWithParties> {
        self.cache
            .get(&keys::transactions(room_id))
            .await
            .unwrap_or_default()
    }

    /// Transactions of a room, newest first, refreshed from the backend.
    ///
    /// Falls back to the cached list when the fetch fails; empty when signed out or
    /// not a member of the room.
    pub async fn transactions(&self, room_id: &str) -> Vec<TransactionWithParties> {
        let Some(user) = self.current_user().await else {
            return Vec::new();
        };

        let fetched = match room::is_member(self.db(), room_id, &user.id).await {
            Ok(false) => return Vec::new(),
            Ok(true) => transaction::get_transactions_with_parties(self.db(), room_id).await,
            Err(e) => Err(e),
        };
        match fetched {
            Ok(entries) => {
                self.cache
                    .set(&keys::transactions(room_id), &entries, true)
                    .await;
                entries
            }
            Err(e) => {
                error!("Error fetching transactions: {}", e);
                self.cached_transactions(room_id).await
            }
        }
    }

    /// Records a transaction from the signed-in user and notifies the counterparty.
    ///
    /// A failed notification is logged; the transaction still counts as recorded.
    pub async fn add_transaction(
        &self,
        room_id: &str,
        input: NewTransaction,
    ) -> Result<transaction_entity::Model> {
        let user = self.require_user().await?;
        let created = transaction::create_transaction(self.db(), room_id, &user.id, input).await?;

        self.feed.publish(ChangeEvent::new(
            Table::Transactions,
            ChangeKind::Insert,
            Some(created.room_id.clone()),
            created.id.as_str(),
        ));
        notifications::notify_transaction(
            self.db(),
            &self.notifier,
            &self.notification_settings,
            &user.name,
            &created,
        )
        .await;
        self.transactions(room_id).await;
        Ok(created)
    }

    /// Settles one transaction of a room the signed-in user belongs to.
    pub async fn mark_as_paid(&self, transaction_id: &str) -> Result<transaction_entity::Model> {
        let user = self.require_user().await?;
        let settled = transaction::mark_as_paid(self.db(), transaction_id, &user.id).await?;

        self.feed.publish(ChangeEvent::new(
            Table::Transactions,
            ChangeKind::Update,
            Some(settled.room_id.clone()),
            settled.id.as_str(),
        ));
        self.transactions(&settled.room_id).await;
        Ok(settled)
    }

    /// Settles every pending transaction of the signed-in user in a room, optionally
    /// only those with `counterparty`.
    pub async fn settle_all(
        &self,
        room_id: &str,
        counterparty: Option<&str>,
    ) -> Result<Vec<transaction_entity::Model>> {
        let user = self.require_user().await?;
        let settled = transaction::settle_all(self.db(), room_id, &user.id, counterparty).await?;

        for row in &settled {
            self.feed.publish(ChangeEvent::new(
                Table::Transactions,
                ChangeKind::Update,
                Some(row.room_id.clone()),
                row.id.as_str(),
            ));
        }
        self.transactions(room_id).await;
        Ok(settled)
    }

    /// CSV export of a room's ledger and a suggested file name.
    pub async fn export_transactions(&self, room_id: &str) -> Result<(String, String)> {
        let user = self.require_user().await?;
        if !room::is_member(self.db(), room_id, &user.id).await? {
            return Err(Error::NotAMember {
                room_id: room_id.to_string(),
                user_id: user.id,
            });
        }
        let csv = report::export_transactions_csv(self.db(), room_id).await?;
        Ok((report::export_file_name(), csv))
    }
}
