//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.
//!
//! `profile`, `room`, `room_member`, `session` and `transaction` live in the backend
//! database; `cache_entry` and `sync_queue_item` live in the local on-device store.

pub mod cache_entry;
pub mod profile;
pub mod room;
pub mod room_member;
pub mod session;
pub mod sync_queue_item;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use cache_entry::{
    Column as CacheEntryColumn, Entity as CacheEntry, Model as CacheEntryModel,
};
pub use profile::{Column as ProfileColumn, Entity as Profile, Model as ProfileModel};
pub use room::{Column as RoomColumn, Entity as Room, Model as RoomModel};
pub use room_member::{
    Column as RoomMemberColumn, Entity as RoomMember, Model as RoomMemberModel,
};
pub use session::{Column as SessionColumn, Entity as Session, Model as SessionModel};
pub use sync_queue_item::{
    Column as SyncQueueColumn, Entity as SyncQueueItem, Model as SyncQueueItemModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionKind, TransactionStatus,
};
