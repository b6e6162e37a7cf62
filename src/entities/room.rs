//! Room entity - A shared living space whose members record debts between each other.
//!
//! Rooms are joined with a six-character invite code and can only be deleted by their creator.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Room database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    /// UUID of the room
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name (e.g., "Apt 4B")
    pub name: String,
    /// Free-text description, may be empty
    pub description: String,
    /// Upper-case invite code shared with new members
    #[sea_orm(unique)]
    pub invite_code: String,
    /// Profile id of the creator
    pub created_by: String,
    /// When the room was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Room and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One room has many memberships
    #[sea_orm(has_many = "super::room_member::Entity")]
    Members,
    /// One room has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::room_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
