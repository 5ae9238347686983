//! The `Bulletin` entity — a dense, monotonically increasing public post.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A public bulletin-board post.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Bulletin {
    /// Dense integer id, assigned from `bulletin_counter`. Never reused.
    pub id: u64,
    /// Uppercase callsign of the poster.
    pub author: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-edit timestamp; listings sort newest-first by this field.
    pub updated_at: DateTime<Utc>,
}

impl Bulletin {
    /// Construct a new bulletin with `created_at == updated_at == now`.
    pub fn new(id: u64, author: impl Into<String>, subject: String, body: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            author: author.into(),
            subject,
            body,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bulletin_timestamps_match() {
        let now = Utc::now();
        let b = Bulletin::new(0, "W1AW", "Hi".into(), "World".into(), now);
        assert_eq!(b.created_at, b.updated_at);
        assert_eq!(b.id, 0);
    }
}
