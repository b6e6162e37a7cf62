//! Room business logic - Creating, joining, listing, leaving and deleting rooms.
//!
//! A room's creator is always added as its first member. Joining happens only through the
//! room's invite code, and `(room, user)` memberships are unique: the check here gives a
//! distinguishable error and the unique index backs it up at the storage level.

use crate::{
    entities::{Profile, Room, RoomMember, Transaction, profile, room, room_member, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{Condition, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Number of characters in an invite code.
pub const INVITE_CODE_LEN: usize = 6;

const INVITE_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const INVITE_CODE_ATTEMPTS: usize = 8;

/// Display name used when a member has no profile row.
pub const UNKNOWN_USER_NAME: &str = "Unknown User";
/// Display email used when a member has no profile row.
pub const UNKNOWN_USER_EMAIL: &str = "unknown@email.com";

/// A room together with its current member count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomWithCount {
    /// The room row
    #[serde(flatten)]
    pub room: room::Model,
    /// Number of memberships
    pub member_count: u64,
}

/// A room member joined with the display fields of their profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Membership row id
    pub membership_id: String,
    /// Profile id of the member
    pub user_id: String,
    /// Display name, [`UNKNOWN_USER_NAME`] when the profile is missing
    pub name: String,
    /// Email, [`UNKNOWN_USER_EMAIL`] when the profile is missing
    pub email: String,
    /// When the member joined the room
    pub joined_at: DateTime<Utc>,
}

/// Generates a random upper-case alphanumeric invite code.
#[must_use]
pub fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    (0..INVITE_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..INVITE_CODE_CHARSET.len());
            char::from(INVITE_CODE_CHARSET[idx])
        })
        .collect()
}

/// Normalizes user-entered invite codes: surrounding whitespace removed, upper-cased.
#[must_use]
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Creates a room and adds the creator as its first member.
///
/// The invite code is regenerated if it collides with an existing room. Room and
/// membership are written in one database transaction.
pub async fn create_room(
    db: &DatabaseConnection,
    name: &str,
    description: &str,
    created_by: &str,
) -> Result<room::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::MissingField { field: "name" });
    }

    let invite_code = unused_invite_code(db).await?;
    let now = Utc::now();

    let txn = db.begin().await?;

    let room_model = room::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(name.to_string()),
        description: Set(description.trim().to_string()),
        invite_code: Set(invite_code),
        created_by: Set(created_by.to_string()),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    insert_membership(&txn, &room_model.id, created_by, now).await?;

    txn.commit().await?;

    info!(room_id = %room_model.id, "Created room '{}'", room_model.name);
    Ok(room_model)
}

async fn unused_invite_code(db: &DatabaseConnection) -> Result<String> {
    for _ in 0..INVITE_CODE_ATTEMPTS {
        let code = generate_invite_code();
        if get_room_by_invite_code(db, &code).await?.is_none() {
            return Ok(code);
        }
        debug!("Invite code {} already taken, regenerating", code);
    }
    Err(Error::Config {
        message: "Could not generate a unique invite code".to_string(),
    })
}

async fn insert_membership<C>(
    db: &C,
    room_id: &str,
    user_id: &str,
    joined_at: DateTime<Utc>,
) -> Result<room_member::Model>
where
    C: ConnectionTrait,
{
    room_member::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        room_id: Set(room_id.to_string()),
        user_id: Set(user_id.to_string()),
        joined_at: Set(joined_at),
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Adds a membership, reporting a concurrent duplicate as [`Error::AlreadyMember`].
async fn add_member(
    db: &DatabaseConnection,
    room_id: &str,
    user_id: &str,
) -> Result<room_member::Model> {
    match insert_membership(db, room_id, user_id, Utc::now()).await {
        Err(Error::Database(e))
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
        {
            Err(Error::AlreadyMember {
                room_id: room_id.to_string(),
            })
        }
        other => other,
    }
}

/// Finds a room by id.
pub async fn get_room_by_id(db: &DatabaseConnection, room_id: &str) -> Result<Option<room::Model>> {
    Room::find_by_id(room_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a room by its invite code. The code is normalized before lookup.
pub async fn get_room_by_invite_code(
    db: &DatabaseConnection,
    invite_code: &str,
) -> Result<Option<room::Model>> {
    Room::find()
        .filter(room::Column::InviteCode.eq(normalize_invite_code(invite_code)))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the membership row of `user_id` in `room_id`.
pub async fn get_membership<C>(
    db: &C,
    room_id: &str,
    user_id: &str,
) -> Result<Option<room_member::Model>>
where
    C: ConnectionTrait,
{
    RoomMember::find()
        .filter(room_member::Column::RoomId.eq(room_id))
        .filter(room_member::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Whether `user_id` belongs to `room_id`.
pub async fn is_member<C>(db: &C, room_id: &str, user_id: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(get_membership(db, room_id, user_id).await?.is_some())
}

/// Joins the room identified by `invite_code`.
///
/// Fails with [`Error::InvalidInviteCode`] when no room matches and with
/// [`Error::AlreadyMember`] when the user already belongs to it. No membership row is
/// written in either case.
pub async fn join_room(
    db: &DatabaseConnection,
    invite_code: &str,
    user_id: &str,
) -> Result<room::Model> {
    let code = normalize_invite_code(invite_code);
    if code.is_empty() {
        return Err(Error::MissingField {
            field: "invite_code",
        });
    }

    let room_model = get_room_by_invite_code(db, &code)
        .await?
        .ok_or(Error::InvalidInviteCode { code })?;

    if is_member(db, &room_model.id, user_id).await? {
        return Err(Error::AlreadyMember {
            room_id: room_model.id,
        });
    }

    add_member(db, &room_model.id, user_id).await?;
    info!(room_id = %room_model.id, user_id, "User joined room");
    Ok(room_model)
}

/// Lists rooms the user created or belongs to, newest first, with member counts.
pub async fn get_rooms_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<RoomWithCount>> {
    let room_ids: Vec<String> = RoomMember::find()
        .filter(room_member::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|membership| membership.room_id)
        .collect();

    let mut condition = Condition::any().add(room::Column::CreatedBy.eq(user_id));
    if !room_ids.is_empty() {
        condition = condition.add(room::Column::Id.is_in(room_ids));
    }

    let rooms = Room::find()
        .filter(condition)
        .order_by_desc(room::Column::CreatedAt)
        .all(db)
        .await?;

    let mut result = Vec::with_capacity(rooms.len());
    for room_model in rooms {
        let member_count = RoomMember::find()
            .filter(room_member::Column::RoomId.eq(room_model.id.as_str()))
            .count(db)
            .await?;
        result.push(RoomWithCount {
            room: room_model,
            member_count,
        });
    }
    Ok(result)
}

/// Lists members of a room, in join order, with profile display fields.
pub async fn get_room_members(
    db: &DatabaseConnection,
    room_id: &str,
) -> Result<Vec<MemberProfile>> {
    let memberships = RoomMember::find()
        .filter(room_member::Column::RoomId.eq(room_id))
        .order_by_asc(room_member::Column::JoinedAt)
        .all(db)
        .await?;

    let user_ids: Vec<String> = memberships.iter().map(|m| m.user_id.clone()).collect();
    let profiles = get_profiles_by_ids(db, user_ids).await?;

    Ok(memberships
        .into_iter()
        .map(|membership| {
            let profile = profiles.get(&membership.user_id);
            MemberProfile {
                name: profile.map_or_else(|| UNKNOWN_USER_NAME.to_string(), display_name),
                email: profile
                    .map_or_else(|| UNKNOWN_USER_EMAIL.to_string(), |p| p.email.clone()),
                membership_id: membership.id,
                user_id: membership.user_id,
                joined_at: membership.joined_at,
            }
        })
        .collect())
}

/// Loads profiles for the given ids, keyed by id.
pub async fn get_profiles_by_ids(
    db: &DatabaseConnection,
    user_ids: Vec<String>,
) -> Result<HashMap<String, profile::Model>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(Profile::find()
        .filter(profile::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect())
}

/// Name to show for a profile: `name`, then `full_name`, then the email.
#[must_use]
pub fn display_name(profile: &profile::Model) -> String {
    [&profile.name, &profile.full_name, &profile.email]
        .into_iter()
        .find(|candidate| !candidate.trim().is_empty())
        .map_or_else(|| UNKNOWN_USER_NAME.to_string(), Clone::clone)
}

/// Deletes a room together with its memberships and transactions.
///
/// Only the room's creator may delete it.
pub async fn delete_room(db: &DatabaseConnection, room_id: &str, user_id: &str) -> Result<()> {
    let room_model = get_room_by_id(db, room_id)
        .await?
        .ok_or_else(|| Error::RoomNotFound {
            room_id: room_id.to_string(),
        })?;

    if room_model.created_by != user_id {
        return Err(Error::NotRoomCreator {
            room_id: room_id.to_string(),
        });
    }

    let txn = db.begin().await?;

    let members = RoomMember::delete_many()
        .filter(room_member::Column::RoomId.eq(room_id))
        .exec(&txn)
        .await?;
    let transactions = Transaction::delete_many()
        .filter(transaction::Column::RoomId.eq(room_id))
        .exec(&txn)
        .await?;
    room_model.delete(&txn).await?;

    txn.commit().await?;

    info!(
        room_id,
        members = members.rows_affected,
        transactions = transactions.rows_affected,
        "Deleted room"
    );
    Ok(())
}

/// Removes the user's membership from a room.
///
/// The room and its ledger stay intact, including when the creator leaves.
pub async fn leave_room(db: &DatabaseConnection, room_id: &str, user_id: &str) -> Result<()> {
    let membership = get_membership(db, room_id, user_id)
        .await?
        .ok_or_else(|| Error::NotAMember {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        })?;

    membership.delete(db).await?;
    info!(room_id, user_id, "User left room");
    Ok(())
}
