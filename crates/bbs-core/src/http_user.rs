//! The `HttpUser` entity — separate login identity for the HTTP façade.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A login identity for the HTTP façade, distinct from the radio [`crate::user::User`]
/// though conventionally sharing the same callsign as its username.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HttpUser {
    /// Uppercase username.
    pub username: String,
    /// Argon2 password hash (the argon2 crate itself is a consumed
    /// dependency, not reimplemented here).
    pub password_hash: String,
    /// Whether this login may reach the HTTP façade at all.
    pub http_enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last successful login, if any.
    pub last_login: Option<DateTime<Utc>>,
    /// Consecutive failed login attempts since the last success.
    pub failed_attempts: u32,
}

impl HttpUser {
    /// Whether this user may still reach the radio dispatcher's handlers.
    ///
    /// Derived, not stored: true iff the username is absent from
    /// `config.blacklist` (the "default safe" reading of the open question
    /// in §9 — see DESIGN.md).
    pub fn rf_enabled(&self, blacklist: &[String]) -> bool {
        !blacklist.iter().any(|b| b == &self.username)
    }
}
