//! Session entity - Opaque access tokens issued at sign-in.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// URL-safe random access token
    #[sea_orm(primary_key, auto_increment = false)]
    pub token: String,
    /// Profile the session belongs to
    pub user_id: String,
    /// When the session was issued
    pub created_at: DateTimeUtc,
    /// When the session stops being accepted
    pub expires_at: DateTimeUtc,
}

/// `Session` has no relations mapped
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
