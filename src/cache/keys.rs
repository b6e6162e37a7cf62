//! Key conventions for the shared local store.
//!
//! Every feature writes into the same store, so keys are namespaced by prefix here and
//! nowhere else.

/// Last signed-in user.
pub const CURRENT_USER: &str = "current_user";

/// Access token of the current session.
pub const SESSION_TOKEN: &str = "session_token";

/// Rooms of the signed-in user.
pub const USER_ROOMS: &str = "user_rooms";

/// Transactions of a room.
#[must_use]
pub fn transactions(room_id: &str) -> String {
    format!("transactions_{room_id}")
}

/// Balance summary of a room for the signed-in user.
#[must_use]
pub fn summary(room_id: &str) -> String {
    format!("summary_{room_id}")
}
