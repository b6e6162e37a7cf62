//! Sync queue entity - Writes made while offline, replayed in `id` order on reconnect.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pending write database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_queue")]
pub struct Model {
    /// Monotonic id, defines replay order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Cache key the write targets
    pub key: String,
    /// JSON-encoded value that was written
    pub value: String,
    /// When the write was made
    pub queued_at: DateTimeUtc,
}

/// `SyncQueueItem` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
