//! Report generation business logic.
//!
//! This module provides amount formatting, one-line transaction summaries and the CSV
//! export of a room's ledger. All functions are framework-agnostic and return plain
//! strings that any front end can display or save.

use crate::{
    core::transaction::{TransactionWithParties, get_transactions_with_parties},
    entities::transaction,
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Header row of the CSV export.
pub const CSV_HEADER: &str = "Date,Type,Amount,Description,From,To,Status";

/// Formats an unsigned amount as dollars, e.g. `"$12.50"`.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Formats a net balance with its sign.
///
/// # Returns
/// Formatted string like "+$50.00" (owed to you) or "-$25.50" (you owe)
#[must_use]
pub fn format_net_balance(amount: f64) -> String {
    if amount >= 0.0 {
        format!("+${amount:.2}")
    } else {
        format!("-${:.2}", amount.abs())
    }
}

/// Generates a summary line for a transaction.
///
/// # Returns
/// Formatted summary string like `"$40.00 | lent | Groceries | pending"`
#[must_use]
pub fn format_transaction_summary(transaction: &transaction::Model) -> String {
    let amount_str = format_amount(transaction.amount);
    let kind = transaction.kind.as_str();
    let desc = &transaction.description;
    let status = transaction.status.as_str();

    format!("{amount_str} | {kind} | {desc} | {status}")
}

/// Quotes a CSV field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Renders one CSV row for a transaction.
#[must_use]
pub fn csv_row(entry: &TransactionWithParties) -> String {
    let t = &entry.transaction;
    [
        t.created_at.format("%Y-%m-%d").to_string(),
        t.kind.as_str().to_string(),
        format_amount(t.amount),
        t.description.clone(),
        entry.from_user.email.clone(),
        entry.to_user.email.clone(),
        t.status.as_str().to_string(),
    ]
    .iter()
    .map(|field| csv_field(field))
    .collect::<Vec<_>>()
    .join(",")
}

/// Renders transactions as CSV text, header first, rows in the given order.
#[must_use]
pub fn transactions_to_csv(entries: &[TransactionWithParties]) -> String {
    std::iter::once(CSV_HEADER.to_string())
        .chain(entries.iter().map(csv_row))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Exports every transaction of a room (newest first) as CSV text.
pub async fn export_transactions_csv(db: &DatabaseConnection, room_id: &str) -> Result<String> {
    let entries = get_transactions_with_parties(db, room_id).await?;
    Ok(transactions_to_csv(&entries))
}

/// Suggested file name for an export made today, e.g. `transactions_2024-05-01.csv`.
#[must_use]
pub fn export_file_name() -> String {
    format!(
        "transactions_{}.csv",
        chrono::Utc::now().format("%Y-%m-%d")
    )
}
