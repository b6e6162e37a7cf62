//! Room member entity - Join record linking a profile to a room.
//!
//! `(room_id, user_id)` is unique; the index is created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Room membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "room_members")]
pub struct Model {
    /// UUID of the membership row
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Room being joined
    pub room_id: String,
    /// Profile id of the member
    pub user_id: String,
    /// When the user joined
    pub joined_at: DateTimeUtc,
}

/// Defines relationships between `RoomMember` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one room
    #[sea_orm(
        belongs_to = "super::room::Entity",
        from = "Column::RoomId",
        to = "super::room::Column::Id",
        on_delete = "Cascade"
    )]
    Room,
}

impl Related<super::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Room.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
