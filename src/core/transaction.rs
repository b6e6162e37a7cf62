//! Transaction business logic - Recording, listing and settling ledger entries.
//!
//! Entries are recorded by a room member against another member of the same room.
//! Settling never deletes: single and bulk settlement both move `pending` entries to
//! `settled` and stamp `settled_at`, so the ledger keeps its full history. Settling an
//! entry that is already settled leaves it untouched.

use crate::{
    core::room::{self, UNKNOWN_USER_EMAIL, UNKNOWN_USER_NAME, get_profiles_by_ids},
    entities::{Room, Transaction, TransactionKind, TransactionStatus, transaction},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Input for recording a new ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Positive amount in dollars
    pub amount: f64,
    /// `borrowed`, `lent` or `shared`
    pub kind: TransactionKind,
    /// What the money was for
    pub description: String,
    /// Counterparty of the entry
    pub target_user_id: String,
}

/// Display fields of one party of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

impl PartyInfo {
    fn unknown() -> Self {
        Self {
            name: UNKNOWN_USER_NAME.to_string(),
            email: UNKNOWN_USER_EMAIL.to_string(),
        }
    }
}

/// A ledger entry with both parties resolved for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionWithParties {
    /// The ledger row
    #[serde(flatten)]
    pub transaction: transaction::Model,
    /// Who recorded it
    pub from_user: PartyInfo,
    /// The counterparty
    pub to_user: PartyInfo,
}

/// Records a new pending transaction from `from_user_id` in `room_id`.
///
/// Validates the amount (positive and finite), the description (non-empty), that the
/// two parties differ, that the room exists and that both parties are members.
pub async fn create_transaction(
    db: &DatabaseConnection,
    room_id: &str,
    from_user_id: &str,
    input: NewTransaction,
) -> Result<transaction::Model> {
    if !input.amount.is_finite() || input.amount <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: input.amount,
        });
    }

    let description = input.description.trim();
    if description.is_empty() {
        return Err(Error::MissingField {
            field: "description",
        });
    }

    if input.target_user_id.trim().is_empty() {
        return Err(Error::MissingField {
            field: "target_user_id",
        });
    }

    if input.target_user_id == from_user_id {
        return Err(Error::SelfTransaction);
    }

    Room::find_by_id(room_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::RoomNotFound {
            room_id: room_id.to_string(),
        })?;

    for user_id in [from_user_id, input.target_user_id.as_str()] {
        if !room::is_member(db, room_id, user_id).await? {
            return Err(Error::NotAMember {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
            });
        }
    }

    let model = transaction::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        room_id: Set(room_id.to_string()),
        amount: Set(input.amount),
        kind: Set(input.kind),
        description: Set(description.to_string()),
        from_user_id: Set(from_user_id.to_string()),
        to_user_id: Set(input.target_user_id),
        status: Set(TransactionStatus::Pending),
        settled_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    info!(
        transaction_id = %model.id,
        room_id,
        kind = model.kind.as_str(),
        amount = model.amount,
        "Recorded transaction"
    );
    Ok(model)
}

/// Retrieves a transaction by id.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: &str,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all transactions of a room, newest first.
pub async fn get_transactions_for_room(
    db: &DatabaseConnection,
    room_id: &str,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::RoomId.eq(room_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all transactions of a room, newest first, with party display fields.
pub async fn get_transactions_with_parties(
    db: &DatabaseConnection,
    room_id: &str,
) -> Result<Vec<TransactionWithParties>> {
    let transactions = get_transactions_for_room(db, room_id).await?;

    let mut user_ids: Vec<String> = transactions
        .iter()
        .flat_map(|t| [t.from_user_id.clone(), t.to_user_id.clone()])
        .collect();
    user_ids.sort();
    user_ids.dedup();
    let profiles = get_profiles_by_ids(db, user_ids).await?;

    let party = |user_id: &str| {
        profiles
            .get(user_id)
            .map_or_else(PartyInfo::unknown, |p| PartyInfo {
                name: room::display_name(p),
                email: p.email.clone(),
            })
    };

    Ok(transactions
        .into_iter()
        .map(|transaction| TransactionWithParties {
            from_user: party(&transaction.from_user_id),
            to_user: party(&transaction.to_user_id),
            transaction,
        })
        .collect())
}

fn pending_involving(room_id: &str, user_id: &str) -> Condition {
    Condition::all()
        .add(transaction::Column::RoomId.eq(room_id))
        .add(transaction::Column::Status.eq(TransactionStatus::Pending))
        .add(
            Condition::any()
                .add(transaction::Column::FromUserId.eq(user_id))
                .add(transaction::Column::ToUserId.eq(user_id)),
        )
}

/// Retrieves pending transactions of a room in which `user_id` is source or target.
pub async fn get_pending_for_user(
    db: &DatabaseConnection,
    room_id: &str,
    user_id: &str,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(pending_involving(room_id, user_id))
        .order_by_asc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks one transaction as paid on behalf of `user_id`.
///
/// Sets `status = settled` and `settled_at = now`. An already settled entry is returned
/// unchanged, keeping its original settlement time. Only members of the transaction's
/// room may settle it.
pub async fn mark_as_paid(
    db: &DatabaseConnection,
    transaction_id: &str,
    user_id: &str,
) -> Result<transaction::Model> {
    let existing = get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::TransactionNotFound {
            transaction_id: transaction_id.to_string(),
        })?;

    if !room::is_member(db, &existing.room_id, user_id).await? {
        return Err(Error::NotAMember {
            room_id: existing.room_id,
            user_id: user_id.to_string(),
        });
    }

    if existing.status == TransactionStatus::Settled {
        return Ok(existing);
    }

    let mut active: transaction::ActiveModel = existing.into();
    active.status = Set(TransactionStatus::Settled);
    active.settled_at = Set(Some(Utc::now()));
    let updated = active.update(db).await?;

    info!(transaction_id, "Transaction marked as paid");
    Ok(updated)
}

/// Settles every pending transaction of `user_id` in a room.
///
/// With a `counterparty`, only entries between the two users are settled. Uses the
/// same status transition as [`mark_as_paid`]. Returns the settled rows.
pub async fn settle_all(
    db: &DatabaseConnection,
    room_id: &str,
    user_id: &str,
    counterparty: Option<&str>,
) -> Result<Vec<transaction::Model>> {
    let mut condition = pending_involving(room_id, user_id);
    if let Some(other) = counterparty {
        condition = condition.add(
            Condition::any()
                .add(transaction::Column::FromUserId.eq(other))
                .add(transaction::Column::ToUserId.eq(other)),
        );
    }

    let txn = db.begin().await?;

    let pending = Transaction::find().filter(condition).all(&txn).await?;
    let now = Utc::now();
    let mut settled = Vec::with_capacity(pending.len());
    for row in pending {
        let mut active: transaction::ActiveModel = row.into();
        active.status = Set(TransactionStatus::Settled);
        active.settled_at = Set(Some(now));
        settled.push(active.update(&txn).await?);
    }

    txn.commit().await?;

    info!(
        room_id,
        user_id,
        counterparty,
        count = settled.len(),
        "Settled pending transactions"
    );
    Ok(settled)
}
