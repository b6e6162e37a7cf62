//! Transaction entity - One ledger entry between two members of a room.
//!
//! `from_user_id` is the member who recorded the entry, `to_user_id` the counterparty.
//! Rows are immutable except for the pending to settled transition.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a ledger entry, seen from the member who recorded it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Recorder borrowed the amount from the counterparty
    #[sea_orm(string_value = "borrowed")]
    Borrowed,
    /// Recorder lent the amount to the counterparty
    #[sea_orm(string_value = "lent")]
    Lent,
    /// Recorder paid a shared expense, split with the counterparty
    #[sea_orm(string_value = "shared")]
    Shared,
}

impl TransactionKind {
    /// Wire name of the kind (`"borrowed"`, `"lent"`, `"shared"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Borrowed => "borrowed",
            Self::Lent => "lent",
            Self::Shared => "shared",
        }
    }
}

/// Settlement state of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Still counted in balances
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Paid back, kept for history
    #[sea_orm(string_value = "settled")]
    Settled,
}

impl TransactionStatus {
    /// Wire name of the status (`"pending"`, `"settled"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Settled => "settled",
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// UUID of the transaction
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Room the entry belongs to
    pub room_id: String,
    /// Positive amount in dollars
    pub amount: f64,
    /// `borrowed`, `lent` or `shared`
    pub kind: TransactionKind,
    /// Human-readable description of the transaction
    pub description: String,
    /// Member who recorded the entry
    pub from_user_id: String,
    /// Counterparty of the entry
    pub to_user_id: String,
    /// `pending` or `settled`
    pub status: TransactionStatus,
    /// When the entry was settled, if it has been
    pub settled_at: Option<DateTimeUtc>,
    /// When the entry was recorded
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Whether `user_id` is the source or target of this entry.
    #[must_use]
    pub fn involves(&self, user_id: &str) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one room
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
