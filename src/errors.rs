//! Unified error type for the roommate tracker.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants are grouped by
//! the way callers are expected to react to them, see [`ErrorKind`].

use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Email/password pair did not match a known account
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Account exists but its email address was never confirmed
    #[error("Please check {email} and click the confirmation link to complete signup")]
    EmailNotConfirmed {
        /// Address awaiting confirmation
        email: String,
    },

    /// Too many failed sign-in attempts inside the lockout window
    #[error("Too many sign-in attempts, try again in {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until the oldest failure leaves the window
        retry_after_secs: u64,
    },

    /// Sign-up attempted with an address that already has an account
    #[error("An account already exists for {email}")]
    EmailTaken {
        /// Address that is already registered
        email: String,
    },

    /// Operation requires a signed-in user
    #[error("User not authenticated")]
    NotAuthenticated,

    /// Amount is zero, negative, NaN or infinite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Rejected amount
        amount: f64,
    },

    /// A required input was empty
    #[error("Missing required field: {field}")]
    MissingField {
        /// Name of the empty field
        field: &'static str,
    },

    /// No room matches the invite code
    #[error("Invalid invite code: {code}")]
    InvalidInviteCode {
        /// Normalized code that was looked up
        code: String,
    },

    /// User already belongs to the room they tried to join
    #[error("You are already a member of this room")]
    AlreadyMember {
        /// Room that was being joined
        room_id: String,
    },

    /// User is not a member of the room
    #[error("User {user_id} is not a member of room {room_id}")]
    NotAMember {
        /// Room that was checked
        room_id: String,
        /// User that was checked
        user_id: String,
    },

    /// Room does not exist
    #[error("Room not found: {room_id}")]
    RoomNotFound {
        /// Missing room id
        room_id: String,
    },

    /// Transaction does not exist
    #[error("Transaction not found: {transaction_id}")]
    TransactionNotFound {
        /// Missing transaction id
        transaction_id: String,
    },

    /// Only the creator of a room may delete it
    #[error("Only the room creator can delete room {room_id}")]
    NotRoomCreator {
        /// Room the caller tried to delete
        room_id: String,
    },

    /// Source and target of a transaction are the same user
    #[error("Cannot record a transaction with yourself")]
    SelfTransaction,

    /// Backend storage failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Cached or wire value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport failure talking to an HTTP service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Push service accepted the request but reported a failure
    #[error("Push notification failed: {message}")]
    Notification {
        /// Service response or reason
        message: String,
    },

    /// Password hashing or verification could not run
    #[error("Password hashing error: {message}")]
    PasswordHash {
        /// Underlying hasher message
        message: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad credentials, unconfirmed email, rate limiting. Shown with actionable text.
    Authentication,
    /// Bad input or conflicting state. Shown immediately, never retried.
    Validation,
    /// Network or backend failure. Reads fall back to cache, writes surface it.
    Transport,
    /// Best-effort side channel (push delivery). Logged only.
    SideChannel,
    /// Local misconfiguration or programming error.
    Internal,
}

impl Error {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials
            | Self::EmailNotConfirmed { .. }
            | Self::RateLimited { .. }
            | Self::EmailTaken { .. }
            | Self::NotAuthenticated => ErrorKind::Authentication,
            Self::InvalidAmount { .. }
            | Self::MissingField { .. }
            | Self::InvalidInviteCode { .. }
            | Self::AlreadyMember { .. }
            | Self::NotAMember { .. }
            | Self::RoomNotFound { .. }
            | Self::TransactionNotFound { .. }
            | Self::NotRoomCreator { .. }
            | Self::SelfTransaction => ErrorKind::Validation,
            Self::Database(_) | Self::Http(_) => ErrorKind::Transport,
            Self::Notification { .. } => ErrorKind::SideChannel,
            Self::Serialization(_)
            | Self::PasswordHash { .. }
            | Self::Config { .. }
            | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
