//! Profile entity - Account and display data for a user.
//!
//! Password hashes are Argon2id PHC strings. OAuth-only accounts have no hash.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    /// UUID of the user
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Login email, unique
    #[sea_orm(unique)]
    pub email: String,
    /// Short display name
    pub name: String,
    /// Full name as entered at sign-up or provided by the OAuth provider
    pub full_name: String,
    /// Argon2id hash, `None` for OAuth-only accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Whether the email address has been confirmed
    pub email_confirmed: bool,
    /// Expo push token registered by the user's device
    pub push_token: Option<String>,
    /// When the profile was created
    pub created_at: DateTimeUtc,
    /// When the profile was last modified
    pub updated_at: DateTimeUtc,
}

/// `Profile` has no relations mapped; joins are done by id in the core layer
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
