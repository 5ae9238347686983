//! The `User` entity — keyed by base callsign in the store's `users` table.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of [`User::bio`]; longer input is truncated on write.
pub const BIO_MAX: usize = 4000;
/// Maximum length of [`User::status`]; longer input is truncated on write.
pub const STATUS_MAX: usize = 300;
/// Maximum length of [`User::location`]; longer input is truncated on write.
pub const LOCATION_MAX: usize = 1000;
/// Maximum length of each entry in [`User::socials`]; longer entries are
/// truncated on write.
pub const SOCIAL_MAX: usize = 300;

/// A registered BBS user, keyed in the store by uppercase base callsign.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct User {
    /// Stable identifier, assigned once at creation and never changed.
    pub uuid: Uuid,
    /// Uppercase base callsign; duplicates the store's map key.
    pub callsign: String,
    /// Whether the user may use the dispatcher's handlers.
    pub enabled: bool,
    /// Whether the user is omitted from public listings (`GET /user`).
    pub hidden: bool,
    /// When this record was first created.
    pub created_at: DateTime<Utc>,
    /// Updated on every accepted connection from this callsign.
    pub last_seen: DateTime<Utc>,
    /// Free-text biography, capped at [`BIO_MAX`].
    pub bio: String,
    /// Free-text status line, capped at [`STATUS_MAX`].
    pub status: String,
    /// Validated email address, or empty if unset.
    pub email: String,
    /// Free-text location, capped at [`LOCATION_MAX`].
    pub location: String,
    /// Social handles/links, each capped at [`SOCIAL_MAX`].
    pub socials: Vec<String>,
    /// Uuids of objects this user owns; the authoritative owning side is the
    /// [`crate::object::Object::owner`] field, this is an index.
    pub object_uuids: Vec<Uuid>,
}

impl User {
    /// Construct a new enabled, non-hidden user for `callsign`.
    pub fn new(callsign: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            callsign: callsign.into(),
            enabled: true,
            hidden: false,
            created_at: now,
            last_seen: now,
            bio: String::new(),
            status: String::new(),
            email: String::new(),
            location: String::new(),
            socials: Vec::new(),
            object_uuids: Vec::new(),
        }
    }

    /// Construct the reserved `SYSTEM` user: hidden, disabled, blacklisted.
    pub fn system(now: DateTime<Utc>) -> Self {
        let mut u = Self::new(crate::callsign::SYSTEM_USER, now);
        u.enabled = false;
        u.hidden = true;
        u
    }

    /// Apply a patch from `UPDATE /user`, truncating fields that exceed
    /// their bound rather than rejecting the request.
    pub fn apply_patch(&mut self, patch: UserPatch) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(bio) = patch.bio {
            self.bio = truncate(&bio, BIO_MAX);
        }
        if let Some(status) = patch.status {
            self.status = truncate(&status, STATUS_MAX);
        }
        if let Some(location) = patch.location {
            self.location = truncate(&location, LOCATION_MAX);
        }
        if let Some(socials) = patch.socials {
            self.socials = socials.iter().map(|s| truncate(s, SOCIAL_MAX)).collect();
        }
    }

    /// Safe-dict view returned by user handlers; omits nothing sensitive
    /// since no secrets live on `User` (unlike [`crate::http_user::HttpUser`]).
    pub fn to_safe_dict(&self) -> UserSafeDict {
        UserSafeDict {
            uuid: self.uuid,
            callsign: self.callsign.clone(),
            enabled: self.enabled,
            hidden: self.hidden,
            created_at: self.created_at,
            last_seen: self.last_seen,
            bio: self.bio.clone(),
            status: self.status.clone(),
            email: self.email.clone(),
            location: self.location.clone(),
            socials: self.socials.clone(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Partial patch payload for `UPDATE /user`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct UserPatch {
    /// New email address, already validated by the handler.
    pub email: Option<String>,
    /// New biography text.
    pub bio: Option<String>,
    /// New status line.
    pub status: Option<String>,
    /// New location text.
    pub location: Option<String>,
    /// New social handles list.
    pub socials: Option<Vec<String>>,
}

/// Public projection of [`User`] returned by `GET /user` and friends.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct UserSafeDict {
    /// Stable identifier.
    pub uuid: Uuid,
    /// Uppercase base callsign.
    pub callsign: String,
    /// Whether the user is enabled.
    pub enabled: bool,
    /// Whether the user is hidden from listings.
    pub hidden: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-seen timestamp.
    pub last_seen: DateTime<Utc>,
    /// Biography text.
    pub bio: String,
    /// Status line.
    pub status: String,
    /// Email address.
    pub email: String,
    /// Location text.
    pub location: String,
    /// Social handles.
    pub socials: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_enabled_and_visible() {
        let u = User::new("W1AW", Utc::now());
        assert!(u.enabled);
        assert!(!u.hidden);
        assert_eq!(u.callsign, "W1AW");
    }

    #[test]
    fn system_user_is_hidden_and_disabled() {
        let u = User::system(Utc::now());
        assert!(!u.enabled);
        assert!(u.hidden);
        assert_eq!(u.callsign, crate::callsign::SYSTEM_USER);
    }

    #[test]
    fn patch_truncates_oversized_fields() {
        let mut u = User::new("W1AW", Utc::now());
        let long_bio = "x".repeat(BIO_MAX + 500);
        u.apply_patch(UserPatch {
            bio: Some(long_bio),
            ..Default::default()
        });
        assert_eq!(u.bio.chars().count(), BIO_MAX);
    }

    #[test]
    fn patch_truncates_each_social_independently() {
        let mut u = User::new("W1AW", Utc::now());
        let overlong = "y".repeat(SOCIAL_MAX + 10);
        u.apply_patch(UserPatch {
            socials: Some(vec!["short".into(), overlong]),
            ..Default::default()
        });
        assert_eq!(u.socials[0], "short");
        assert_eq!(u.socials[1].chars().count(), SOCIAL_MAX);
    }

    #[test]
    fn uuid_is_stable_across_patches() {
        let mut u = User::new("W1AW", Utc::now());
        let id = u.uuid;
        u.apply_patch(UserPatch {
            status: Some("qrv".into()),
            ..Default::default()
        });
        assert_eq!(u.uuid, id);
    }
}
