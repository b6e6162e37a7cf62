//! Database configuration module.
//!
//! This module handles `SQLite` connections and table creation using `SeaORM`. Two stores
//! exist: the backend database (profiles, sessions, rooms, memberships, transactions) and
//! the local on-device cache (cache entries and the offline sync queue). Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`, so the
//! schema always matches the Rust structs without hand-written SQL.

use crate::entities::{
    CacheEntry, Profile, Room, RoomMember, RoomMemberColumn, Session, SyncQueueItem, Transaction,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/roommate_tracker.sqlite?mode=rwc";
const DEFAULT_CACHE_DATABASE_URL: &str = "sqlite://data/local_cache.sqlite?mode=rwc";

/// Gets the backend database URL from `DATABASE_URL`, falling back to `configured`
/// and finally to a local `SQLite` file.
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        configured.map_or_else(|| DEFAULT_DATABASE_URL.to_string(), ToString::to_string)
    })
}

/// Gets the local cache URL from `CACHE_DATABASE_URL`, falling back to `configured`
/// and finally to a local `SQLite` file.
#[must_use]
pub fn get_cache_database_url(configured: Option<&str>) -> String {
    std::env::var("CACHE_DATABASE_URL").unwrap_or_else(|_| {
        configured.map_or_else(|| DEFAULT_CACHE_DATABASE_URL.to_string(), ToString::to_string)
    })
}

/// Establishes a connection to the given database URL.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the backend tables (profiles, sessions, rooms, memberships, transactions)
/// and the unique `(room_id, user_id)` membership index.
pub async fn create_backend_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let profile_table = schema
        .create_table_from_entity(Profile)
        .if_not_exists()
        .to_owned();
    let session_table = schema
        .create_table_from_entity(Session)
        .if_not_exists()
        .to_owned();
    let room_table = schema
        .create_table_from_entity(Room)
        .if_not_exists()
        .to_owned();
    let member_table = schema
        .create_table_from_entity(RoomMember)
        .if_not_exists()
        .to_owned();
    let transaction_table = schema
        .create_table_from_entity(Transaction)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&profile_table)).await?;
    db.execute(builder.build(&session_table)).await?;
    db.execute(builder.build(&room_table)).await?;
    db.execute(builder.build(&member_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;

    let membership_index = Index::create()
        .name("idx_room_members_room_user")
        .table(RoomMember)
        .col(RoomMemberColumn::RoomId)
        .col(RoomMemberColumn::UserId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&membership_index)).await?;

    Ok(())
}

/// Creates the local cache tables (cache entries and the sync queue).
pub async fn create_cache_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let entry_table = schema
        .create_table_from_entity(CacheEntry)
        .if_not_exists()
        .to_owned();
    let queue_table = schema
        .create_table_from_entity(SyncQueueItem)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&entry_table)).await?;
    db.execute(builder.build(&queue_table)).await?;

    Ok(())
}
