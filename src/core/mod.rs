//! Core business logic - framework-agnostic room, ledger, balance, auth and report
//! operations. Every function takes the database connection explicitly.

/// Accounts, sign-in, sessions
pub mod auth;
/// Net balances between members
pub mod balance;
/// Amount formatting and CSV export
pub mod report;
/// Rooms and memberships
pub mod room;
/// Ledger entries and settlement
pub mod transaction;
