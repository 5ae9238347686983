//! The `Object` entity — user-owned content, optionally private.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of [`Object::name`]; names longer than this are rejected.
pub const OBJECT_NAME_MAX: usize = 300;

/// A piece of user-owned content addressed by a stable uuid.
///
/// Ownership is a two-sided relation: the owner's [`crate::user::User`]
/// carries a set of object uuids (an index), and this struct back-references
/// the owner by uuid. Both sides are maintained together inside one
/// transaction by the store layer — neither side alone is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Object {
    /// Stable identifier, assigned once at creation.
    pub uuid: Uuid,
    /// Display name, at most [`OBJECT_NAME_MAX`] bytes.
    pub name: String,
    /// Payload bytes.
    pub data: Vec<u8>,
    /// Whether `data` is opaque binary, recomputed on every write to `data`.
    pub binary: bool,
    /// Whether only the owner may read this object.
    pub private: bool,
    /// Uuid of the owning [`crate::user::User`].
    pub owner: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-write timestamp; touched whenever `data` is reassigned.
    pub modified_at: DateTime<Utc>,
}

impl Object {
    /// Construct a new object owned by `owner`.
    pub fn new(
        name: String,
        data: Vec<u8>,
        binary: bool,
        private: bool,
        owner: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            data,
            binary,
            private,
            owner,
            created_at: now,
            modified_at: now,
        }
    }

    /// Reassign `data`, recomputing `binary` and touching `modified_at`.
    pub fn set_data(&mut self, data: Vec<u8>, binary: bool, now: DateTime<Utc>) {
        self.data = data;
        self.binary = binary;
        self.modified_at = now;
    }

    /// Whether `caller` may read this object per §4.D's object handler rule:
    /// private objects are 403 for everyone but the owner.
    pub fn readable_by(&self, caller: Uuid) -> bool {
        !self.private || self.owner == caller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_object_only_readable_by_owner() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let obj = Object::new("x.txt".into(), b"hi".to_vec(), false, true, owner, Utc::now());
        assert!(obj.readable_by(owner));
        assert!(!obj.readable_by(other));
    }

    #[test]
    fn public_object_readable_by_anyone() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let obj = Object::new("x.txt".into(), b"hi".to_vec(), false, false, owner, Utc::now());
        assert!(obj.readable_by(other));
    }

    #[test]
    fn set_data_touches_modified_at_and_binary_flag() {
        let owner = Uuid::new_v4();
        let created = Utc::now();
        let mut obj = Object::new("x.txt".into(), b"hi".to_vec(), false, false, owner, created);
        let later = created + chrono::Duration::seconds(5);
        obj.set_data(vec![0xff, 0x00], true, later);
        assert!(obj.binary);
        assert_eq!(obj.modified_at, later);
        assert_eq!(obj.created_at, created);
    }
}
