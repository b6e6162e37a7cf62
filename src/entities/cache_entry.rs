//! Cache entry entity - Key-value rows of the local on-device store.
//! Values are JSON text so any serializable collection can be cached.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local cache database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cache_entries")]
pub struct Model {
    /// Cache key (see `cache::keys` for the prefixes in use)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// JSON-encoded value
    pub value: String,
    /// When the value was last written
    pub updated_at: DateTimeUtc,
    /// False while a sync-requiring write is waiting in the queue
    pub synced: bool,
}

/// `CacheEntry` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
