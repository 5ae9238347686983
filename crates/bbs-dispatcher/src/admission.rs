//! Per-connection admission (§4.D `onConnected`).
//!
//! The blacklist wait-then-force-close itself is a transport-level concern
//! (it depends on the connection's live state, which this crate doesn't
//! own) — [`admit_connection`] only makes the store-side decision. The
//! caller that owns the transport connection applies the "wait up to 5
//! seconds for a CONNECTED state, then force-close" policy described in the
//! original system's `server_connection_bouncer`, acting on whichever
//! [`Admission`] variant comes back.

use bbs_core::{base_callsign, User};
use bbs_error::BbsError;
use bbs_store::Store;
use chrono::Utc;

/// Outcome of admitting a freshly connected callsign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The callsign is not blacklisted; its user record exists (freshly
    /// created if this was its first connection) with `last_seen` touched.
    Admitted {
        /// The normalised base callsign used as the store key.
        base_callsign: String,
    },
    /// The callsign is on `config.blacklist`. No user record was touched.
    Blacklisted {
        /// The normalised base callsign that was rejected.
        base_callsign: String,
    },
}

/// Derive `raw_callsign`'s base form and, in one transaction, either note it
/// as blacklisted or touch/create its user record.
pub fn admit_connection(store: &Store, raw_callsign: &str) -> Result<Admission, BbsError> {
    let base = base_callsign(raw_callsign);
    store.transaction(|root| {
        if root.config.is_blacklisted(&base) {
            return Ok(Admission::Blacklisted {
                base_callsign: base.clone(),
            });
        }
        let now = Utc::now();
        match root.users.get_mut(&base) {
            Some(user) => user.last_seen = now,
            None => {
                root.users.insert(base.clone(), User::new(base.clone(), now));
            }
        }
        Ok(Admission::Admitted {
            base_callsign: base.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbs_store::{FileBackend, StoreRoot};

    fn opened_store(dir: &std::path::Path) -> Store {
        let store = Store::new(FileBackend::new(dir.join("store.json")));
        store.open().unwrap();
        store
    }

    #[test]
    fn first_connection_creates_an_enabled_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let outcome = admit_connection(&store, "w1aw-7").unwrap();
        assert_eq!(
            outcome,
            Admission::Admitted {
                base_callsign: "W1AW".to_string()
            }
        );
        let snapshot = store.snapshot();
        let user = snapshot.users.get("W1AW").unwrap();
        assert!(user.enabled);
    }

    #[test]
    fn reconnection_touches_last_seen_without_duplicating_the_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        admit_connection(&store, "W1AW").unwrap();
        let first_seen = store.snapshot().users.get("W1AW").unwrap().last_seen;
        std::thread::sleep(std::time::Duration::from_millis(5));
        admit_connection(&store, "W1AW-3").unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.users.len(), 2); // SYSTEM + W1AW
        assert!(snapshot.users.get("W1AW").unwrap().last_seen >= first_seen);
    }

    #[test]
    fn blacklisted_callsign_is_rejected_without_creating_a_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        store
            .transaction(|root: &mut StoreRoot| {
                root.config.blacklist.push("BADOP".to_string());
                Ok(())
            })
            .unwrap();
        let outcome = admit_connection(&store, "badop").unwrap();
        assert_eq!(
            outcome,
            Admission::Blacklisted {
                base_callsign: "BADOP".to_string()
            }
        );
        assert!(!store.snapshot().users.contains_key("BADOP"));
    }
}
