//! Balance aggregation - Net balances between the acting user and every other member.
//!
//! [`compute_summary`] is a pure function over a member list and a set of ledger entries;
//! [`room_summary`] loads both from the database and calls it. Nothing here is persisted.
//!
//! A `shared` entry is always split in two: the payer absorbs one half and the
//! counterparty owes the other, whatever the size of the room.

use crate::{
    core::{room, room::MemberProfile, transaction as ledger},
    entities::{TransactionKind, TransactionStatus, transaction},
    errors::Result,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

/// Divisor applied to `shared` amounts.
pub const SHARED_SPLIT_DIVISOR: f64 = 2.0;

/// What the acting user and one counterparty owe each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Counterparty profile id
    pub user_id: String,
    /// Counterparty display name
    pub user_name: String,
    /// Counterparty email
    pub user_email: String,
    /// Amount the acting user owes the counterparty
    pub you_owe: f64,
    /// Amount the counterparty owes the acting user
    pub owes_you: f64,
    /// `owes_you - you_owe`
    pub net_balance: f64,
}

impl Balance {
    fn zeroed(member: &MemberProfile) -> Self {
        Self {
            user_id: member.user_id.clone(),
            user_name: member.name.clone(),
            user_email: member.email.clone(),
            you_owe: 0.0,
            owes_you: 0.0,
            net_balance: 0.0,
        }
    }
}

/// Room-wide sums over all counterparties.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of `you_owe`
    pub total_you_owe: f64,
    /// Sum of `owes_you`
    pub total_owed_to_you: f64,
    /// Sum of `net_balance`
    pub net_balance: f64,
}

/// Per-member balances plus totals, from one user's perspective.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// One entry per other member, in member order
    pub balances: Vec<Balance>,
    /// Sums across `balances`
    pub totals: Totals,
}

impl Summary {
    /// Balance against a specific counterparty.
    #[must_use]
    pub fn balance_with(&self, user_id: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.user_id == user_id)
    }
}

/// Which side of an entry the acting user is on.
#[derive(Clone, Copy)]
enum Side {
    Source,
    Target,
}

/// Returns `(you_owe, owes_you)` contributed by one entry.
fn contribution(kind: TransactionKind, amount: f64, side: Side) -> (f64, f64) {
    match (side, kind) {
        (Side::Source, TransactionKind::Lent) | (Side::Target, TransactionKind::Borrowed) => {
            (0.0, amount)
        }
        (Side::Source, TransactionKind::Borrowed) | (Side::Target, TransactionKind::Lent) => {
            (amount, 0.0)
        }
        (Side::Source, TransactionKind::Shared) => (0.0, amount / SHARED_SPLIT_DIVISOR),
        (Side::Target, TransactionKind::Shared) => (amount / SHARED_SPLIT_DIVISOR, 0.0),
    }
}

/// Computes balances of `acting_user_id` against every other member.
///
/// Only pending entries in which the acting user is source or target count. Entries whose
/// counterparty is not in `members` are ignored. Members without entries get a zeroed
/// balance. The acting user is skipped if present in `members`.
#[must_use]
pub fn compute_summary(
    acting_user_id: &str,
    members: &[MemberProfile],
    transactions: &[transaction::Model],
) -> Summary {
    let mut balances: Vec<Balance> = Vec::with_capacity(members.len());
    for member in members {
        if member.user_id != acting_user_id && !balances.iter().any(|b| b.user_id == member.user_id)
        {
            balances.push(Balance::zeroed(member));
        }
    }

    for entry in transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Pending)
    {
        let (counterparty, side) = if entry.from_user_id == acting_user_id {
            (&entry.to_user_id, Side::Source)
        } else if entry.to_user_id == acting_user_id {
            (&entry.from_user_id, Side::Target)
        } else {
            continue;
        };

        let Some(balance) = balances.iter_mut().find(|b| b.user_id == *counterparty) else {
            continue;
        };

        let (you_owe, owes_you) = contribution(entry.kind, entry.amount, side);
        balance.you_owe += you_owe;
        balance.owes_you += owes_you;
    }

    let mut totals = Totals::default();
    for balance in &mut balances {
        balance.net_balance = balance.owes_you - balance.you_owe;
        totals.total_you_owe += balance.you_owe;
        totals.total_owed_to_you += balance.owes_you;
        totals.net_balance += balance.net_balance;
    }

    Summary { balances, totals }
}

/// Loads members and pending entries of a room and computes the summary for a user.
///
/// Returns `Ok(None)` without touching the database when either the room or the user is
/// absent.
pub async fn room_summary(
    db: &DatabaseConnection,
    room_id: Option<&str>,
    acting_user_id: Option<&str>,
) -> Result<Option<Summary>> {
    let (Some(room_id), Some(user_id)) = (room_id, acting_user_id) else {
        return Ok(None);
    };

    let members = room::get_room_members(db, room_id).await?;
    let pending = ledger::get_pending_for_user(db, room_id, user_id).await?;
    Ok(Some(compute_summary(user_id, &members, &pending)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Utc;

    fn member(user_id: &str) -> MemberProfile {
        MemberProfile {
            membership_id: format!("m-{user_id}"),
            user_id: user_id.to_string(),
            name: user_id.to_uppercase(),
            email: format!("{user_id}@example.com"),
            joined_at: Utc::now(),
        }
    }

    fn entry(from: &str, to: &str, amount: f64, kind: TransactionKind) -> transaction::Model {
        transaction::Model {
            id: format!("{from}-{to}-{amount}"),
            room_id: "apt-4b".to_string(),
            amount,
            kind,
            description: "test".to_string(),
            from_user_id: from.to_string(),
            to_user_id: to.to_string(),
            status: TransactionStatus::Pending,
            settled_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_other_party_lent_means_you_owe() {
        // B lent $40 to A: A owes B $40
        let members = [member("a"), member("b")];
        let ledger = [entry("b", "a", 40.0, TransactionKind::Lent)];

        let summary = compute_summary("a", &members, &ledger);
        let b = summary.balance_with("b").unwrap();
        assert_eq!(b.you_owe, 40.0);
        assert_eq!(b.owes_you, 0.0);
        assert_eq!(b.net_balance, -40.0);
        assert_eq!(summary.totals.net_balance, -40.0);
    }

    #[test]
    fn test_shared_is_halved_for_both_sides() {
        let members = [member("a"), member("b")];
        let ledger = [entry("a", "b", 50.0, TransactionKind::Shared)];

        let for_a = compute_summary("a", &members, &ledger);
        assert_eq!(for_a.balance_with("b").unwrap().owes_you, 25.0);

        let for_b = compute_summary("b", &members, &ledger);
        assert_eq!(for_b.balance_with("a").unwrap().you_owe, 25.0);
        assert_eq!(for_b.balance_with("a").unwrap().net_balance, -25.0);
    }

    #[test]
    fn test_every_kind_and_side() {
        let members = [member("a"), member("b")];
        let ledger = [
            entry("a", "b", 10.0, TransactionKind::Lent),     // owes_you 10
            entry("a", "b", 20.0, TransactionKind::Borrowed), // you_owe 20
            entry("a", "b", 30.0, TransactionKind::Shared),   // owes_you 15
            entry("b", "a", 40.0, TransactionKind::Lent),     // you_owe 40
            entry("b", "a", 50.0, TransactionKind::Borrowed), // owes_you 50
            entry("b", "a", 60.0, TransactionKind::Shared),   // you_owe 30
        ];

        let b = compute_summary("a", &members, &ledger).balances.remove(0);
        assert_eq!(b.owes_you, 75.0);
        assert_eq!(b.you_owe, 90.0);
        assert_eq!(b.net_balance, -15.0);
    }

    #[test]
    fn test_member_without_transactions_is_zeroed_not_omitted() {
        let members = [member("a"), member("b"), member("c")];
        let ledger = [entry("a", "b", 12.5, TransactionKind::Lent)];

        let summary = compute_summary("a", &members, &ledger);
        assert_eq!(summary.balances.len(), 2);
        let c = summary.balance_with("c").unwrap();
        assert_eq!(c.you_owe, 0.0);
        assert_eq!(c.owes_you, 0.0);
        assert_eq!(c.net_balance, 0.0);
        assert_eq!(c.user_name, "C");
    }

    #[test]
    fn test_ignores_settled_unrelated_and_unknown_counterparties() {
        let members = [member("a"), member("b"), member("c")];
        let mut settled = entry("a", "b", 99.0, TransactionKind::Lent);
        settled.status = TransactionStatus::Settled;
        let ledger = [
            settled,
            entry("b", "c", 7.0, TransactionKind::Lent),
            entry("a", "former-member", 5.0, TransactionKind::Lent),
            entry("a", "a", 3.0, TransactionKind::Lent),
        ];

        let summary = compute_summary("a", &members, &ledger);
        assert_eq!(summary.totals, Totals::default());
    }

    #[test]
    fn test_totals_equal_direct_sums() {
        let members = [member("a"), member("b"), member("c"), member("d")];
        let ledger = [
            entry("a", "b", 10.0, TransactionKind::Lent),
            entry("a", "c", 31.0, TransactionKind::Shared),
            entry("c", "a", 8.25, TransactionKind::Borrowed),
            entry("d", "a", 100.0, TransactionKind::Lent),
            entry("a", "d", 14.0, TransactionKind::Borrowed),
            entry("b", "a", 9.0, TransactionKind::Shared),
            entry("b", "c", 500.0, TransactionKind::Lent),
        ];

        // Direct sums, independent of the per-member bookkeeping
        let mut owed_to_you = 0.0;
        let mut you_owe = 0.0;
        for t in &ledger {
            if t.from_user_id == "a" && t.to_user_id != "a" {
                match t.kind {
                    TransactionKind::Lent => owed_to_you += t.amount,
                    TransactionKind::Shared => owed_to_you += t.amount / 2.0,
                    TransactionKind::Borrowed => you_owe += t.amount,
                }
            } else if t.to_user_id == "a" {
                match t.kind {
                    TransactionKind::Borrowed => owed_to_you += t.amount,
                    TransactionKind::Shared => you_owe += t.amount / 2.0,
                    TransactionKind::Lent => you_owe += t.amount,
                }
            }
        }

        let summary = compute_summary("a", &members, &ledger);
        assert_eq!(summary.totals.total_owed_to_you, owed_to_you);
        assert_eq!(summary.totals.total_you_owe, you_owe);
        assert_eq!(summary.totals.net_balance, owed_to_you - you_owe);

        for balance in &summary.balances {
            assert_eq!(balance.net_balance, balance.owes_you - balance.you_owe);
        }
    }

    #[test]
    fn test_compute_summary_is_pure() {
        let members = vec![member("a"), member("b")];
        let ledger = vec![
            entry("a", "b", 10.0, TransactionKind::Lent),
            entry("b", "a", 4.0, TransactionKind::Shared),
        ];
        let members_before = members.clone();
        let ledger_before = ledger.clone();

        let first = compute_summary("a", &members, &ledger);
        let second = compute_summary("a", &members, &ledger);
        assert_eq!(first, second);
        assert_eq!(members, members_before);
        assert_eq!(ledger, ledger_before);
    }

    #[test]
    fn test_duplicate_members_collapse() {
        let members = [member("a"), member("b"), member("b")];
        let summary = compute_summary("a", &members, &[]);
        assert_eq!(summary.balances.len(), 1);
    }

    #[tokio::test]
    async fn test_room_summary_missing_inputs_is_noop() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(room_summary(&db, None, Some("a")).await?.is_none());
        assert!(room_summary(&db, Some("room"), None).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_room_summary_apt_4b() -> Result<()> {
        let (db, room_model, users) = setup_room_with_members(&["Alice", "Bob"]).await?;
        let (alice, bob) = (&users[0], &users[1]);

        create_custom_transaction(
            &db,
            &room_model.id,
            &bob.id,
            &alice.id,
            40.0,
            TransactionKind::Lent,
        )
        .await?;

        let summary = room_summary(&db, Some(&room_model.id), Some(&alice.id))
            .await?
            .unwrap();
        let with_bob = summary.balance_with(&bob.id).unwrap();
        assert_eq!(with_bob.user_name, "Bob");
        assert_eq!(with_bob.you_owe, 40.0);
        assert_eq!(with_bob.owes_you, 0.0);
        assert_eq!(with_bob.net_balance, -40.0);

        // Settled entries drop out of the summary
        crate::core::transaction::settle_all(&db, &room_model.id, &alice.id, None).await?;
        let summary = room_summary(&db, Some(&room_model.id), Some(&alice.id))
            .await?
            .unwrap();
        assert_eq!(summary.balance_with(&bob.id).unwrap().net_balance, 0.0);
        Ok(())
    }
}
