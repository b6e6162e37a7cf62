//! Local cache and offline sync queue.
//!
//! [`LocalCache`] is a key-value store over the local database. Values are stored as JSON
//! so any serializable collection can be cached and read back deep-equal.
//!
//! Writes flagged `requires_sync` that happen while offline are also appended to a
//! persistent queue. When connectivity comes back the queue is drained in insertion
//! order: each entry is replayed as a plain (non-sync) write, which marks it synced.
//! Entries whose replay fails go back to the end of the queue and are retried on the
//! next reconnect. There is no backoff and no deduplication; two queued writes to the
//! same key are both replayed, oldest first.
//!
//! The plain accessors (`get`, `set`, `remove`, `clear`) log storage failures and never
//! return them. `try_get` and `try_set` expose the error for callers that need to tell
//! "absent" apart from "read failed".

/// Key-prefix conventions shared by all features
pub mod keys;

use crate::{
    config::database::create_cache_tables,
    entities::{CacheEntry, SyncQueueItem, cache_entry, sync_queue_item},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// A write waiting in the sync queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedWrite {
    /// Queue position, lower replays first
    pub id: i64,
    /// Target key
    pub key: String,
    /// JSON text of the written value
    pub value: String,
    /// When the write was made
    pub queued_at: DateTime<Utc>,
}

impl QueuedWrite {
    /// Decodes the queued value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.value).map_err(Into::into)
    }
}

impl From<sync_queue_item::Model> for QueuedWrite {
    fn from(item: sync_queue_item::Model) -> Self {
        Self {
            id: item.id,
            key: item.key,
            value: item.value,
            queued_at: item.queued_at,
        }
    }
}

/// Outcome of one queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Keys replayed successfully, in replay order
    pub synced: Vec<String>,
    /// Keys put back on the queue, in replay order
    pub requeued: Vec<String>,
}

/// Key-value cache with an offline write queue.
#[derive(Debug)]
pub struct LocalCache {
    db: DatabaseConnection,
    online: AtomicBool,
    drain_lock: Mutex<()>,
}

impl LocalCache {
    /// Wraps an existing local database whose tables already exist.
    #[must_use]
    pub fn new(db: DatabaseConnection, online: bool) -> Self {
        Self {
            db,
            online: AtomicBool::new(online),
            drain_lock: Mutex::new(()),
        }
    }

    /// Creates the cache tables if needed and wraps the database.
    ///
    /// A queue persisted by a previous run is kept and drains on the next reconnect.
    pub async fn open(db: DatabaseConnection, online: bool) -> Result<Self> {
        create_cache_tables(&db).await?;
        let cache = Self::new(db, online);
        let pending = cache.try_pending_sync_count().await?;
        if pending > 0 {
            info!("Loaded {} queued writes from previous session", pending);
        }
        Ok(cache)
    }

    /// Current connectivity flag.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Updates the connectivity flag.
    ///
    /// An offline to online transition drains the queue and returns its report.
    pub async fn set_online(&self, online: bool) -> Option<SyncReport> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            info!("Connectivity restored, draining sync queue");
            Some(self.drain_queue().await)
        } else {
            if !online && was_online {
                info!("Connectivity lost, sync-requiring writes will be queued");
            }
            None
        }
    }

    /// Reads the value stored under `key`.
    pub async fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.entry(key).await? {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Reads the value stored under `key`; failures are logged and read as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.try_get(key)
            .await
            .inspect_err(|e| error!("Error getting cache item {}: {}", key, e))
            .ok()
            .flatten()
    }

    /// Reads the raw entry (JSON value plus write time and synced flag).
    pub async fn entry(&self, key: &str) -> Result<Option<cache_entry::Model>> {
        CacheEntry::find_by_id(key.to_string())
            .one(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Stores `value` under `key`.
    ///
    /// When `requires_sync` is set while offline, the write is also queued and the entry
    /// stays unsynced until the queue drains.
    pub async fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        requires_sync: bool,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let online = self.is_connected();
        let queue = requires_sync && !online;
        let now = Utc::now();

        let txn = self.db.begin().await?;
        write_entry(&txn, key, &json, !queue, now).await?;
        if queue {
            sync_queue_item::ActiveModel {
                key: Set(key.to_string()),
                value: Set(json),
                queued_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            debug!("Queued {} for sync", key);
        }
        txn.commit().await?;
        Ok(())
    }

    /// Stores `value` under `key`; failures are logged.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, requires_sync: bool) {
        if let Err(e) = self.try_set(key, value, requires_sync).await {
            error!("Error setting cache item {}: {}", key, e);
        }
    }

    /// Deletes the value under `key` and purges queued writes for it.
    pub async fn remove(&self, key: &str) {
        let result: Result<()> = async {
            let txn = self.db.begin().await?;
            CacheEntry::delete_by_id(key.to_string()).exec(&txn).await?;
            SyncQueueItem::delete_many()
                .filter(sync_queue_item::Column::Key.eq(key))
                .exec(&txn)
                .await?;
            txn.commit().await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            error!("Error removing cache item {}: {}", key, e);
        }
    }

    /// Wipes every entry and the whole queue.
    pub async fn clear(&self) {
        let result: Result<()> = async {
            let txn = self.db.begin().await?;
            CacheEntry::delete_many().exec(&txn).await?;
            SyncQueueItem::delete_many().exec(&txn).await?;
            txn.commit().await?;
            Ok(())
        }
        .await;
        match result {
            Ok(()) => info!("Local storage cleared"),
            Err(e) => error!("Error clearing storage: {}", e),
        }
    }

    /// Queued writes in replay order.
    pub async fn queued_writes(&self) -> Result<Vec<QueuedWrite>> {
        Ok(SyncQueueItem::find()
            .order_by_asc(sync_queue_item::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(QueuedWrite::from)
            .collect())
    }

    /// Number of queued writes.
    pub async fn try_pending_sync_count(&self) -> Result<u64> {
        SyncQueueItem::find()
            .count(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Number of queued writes; failures are logged and read as zero.
    pub async fn pending_sync_count(&self) -> u64 {
        self.try_pending_sync_count()
            .await
            .inspect_err(|e| error!("Error reading sync queue length: {}", e))
            .unwrap_or(0)
    }

    /// Drains the queue, replaying each write locally.
    pub async fn drain_queue(&self) -> SyncReport {
        self.drain_queue_with(|_| async { Ok(()) }).await
    }

    /// Drains the queue, calling `push` for each write before marking it synced.
    ///
    /// Does nothing while offline. A write is re-queued when `push` or the local replay
    /// fails.
    pub async fn drain_queue_with<F, Fut>(&self, mut push: F) -> SyncReport
    where
        F: FnMut(QueuedWrite) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut report = SyncReport::default();
        if !self.is_connected() {
            return report;
        }
        let _guard = self.drain_lock.lock().await;

        let items = match self.take_queue().await {
            Ok(items) => items,
            Err(e) => {
                error!("Error loading sync queue: {}", e);
                return report;
            }
        };
        if items.is_empty() {
            return report;
        }

        for item in items {
            let key = item.key.clone();
            let replayed = match push(item.clone()).await {
                Ok(()) => write_entry(&self.db, &item.key, &item.value, true, Utc::now()).await,
                Err(e) => Err(e),
            };
            match replayed {
                Ok(()) => {
                    debug!("Synced item: {}", key);
                    report.synced.push(key);
                }
                Err(e) => {
                    warn!("Error syncing item {}: {}", key, e);
                    self.requeue(&item).await;
                    report.requeued.push(key);
                }
            }
        }

        info!(
            synced = report.synced.len(),
            requeued = report.requeued.len(),
            "Sync queue drained"
        );
        report
    }

    /// Removes and returns the current queue contents in order.
    async fn take_queue(&self) -> Result<Vec<QueuedWrite>> {
        let items = self.queued_writes().await?;
        if !items.is_empty() {
            let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
            SyncQueueItem::delete_many()
                .filter(sync_queue_item::Column::Id.is_in(ids))
                .exec(&self.db)
                .await?;
        }
        Ok(items)
    }

    async fn requeue(&self, item: &QueuedWrite) {
        let result = sync_queue_item::ActiveModel {
            key: Set(item.key.clone()),
            value: Set(item.value.clone()),
            queued_at: Set(item.queued_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await;
        if let Err(e) = result {
            error!("Error re-queueing item {}: {}", item.key, e);
        }
    }
}

async fn write_entry<C>(
    db: &C,
    key: &str,
    json: &str,
    synced: bool,
    updated_at: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let entry = cache_entry::ActiveModel {
        key: Set(key.to_string()),
        value: Set(json.to_string()),
        updated_at: Set(updated_at),
        synced: Set(synced),
    };
    CacheEntry::insert(entry)
        .on_conflict(
            OnConflict::column(cache_entry::Column::Key)
                .update_columns([
                    cache_entry::Column::Value,
                    cache_entry::Column::UpdatedAt,
                    cache_entry::Column::Synced,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}
