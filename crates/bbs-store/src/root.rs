//! The store's root object graph (§3): every well-known collection plus the
//! counters and uuid set that allocate identity inside a transaction.

use bbs_core::{Bulletin, HttpUser, Job, Message, Object, StoreConfig, User};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// The whole persistent object graph, keyed exactly as §3 names it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRoot {
    /// Mutable server configuration.
    pub config: StoreConfig,
    /// Registered users, keyed by uppercase base callsign.
    pub users: BTreeMap<String, User>,
    /// Per-mailbox message copies, keyed by the mailbox owner's callsign.
    /// Each entry holds every copy — sent and received — addressed to that
    /// mailbox; handlers distinguish the two by comparing `sender` to the
    /// mailbox owner.
    pub messages: BTreeMap<String, Vec<Message>>,
    /// Every message uuid ever allocated, across every mailbox, so a fresh
    /// allocation can never collide with one already in use.
    pub message_uuids: HashSet<Uuid>,
    /// Public bulletins, keyed by dense id.
    pub bulletins: BTreeMap<u64, Bulletin>,
    /// Next id [`allocate_bulletin_id`](StoreRoot::allocate_bulletin_id) will hand out.
    pub bulletin_counter: u64,
    /// User-owned content objects, keyed by uuid.
    pub objects: HashMap<Uuid, Object>,
    /// Jobs, keyed by dense id.
    pub jobs: BTreeMap<u64, Job>,
    /// Ids of jobs waiting for a runner slot, in submission order.
    pub job_queue: bbs_queue::JobQueue,
    /// Job ids submitted by each owner callsign, newest last.
    pub user_jobs: BTreeMap<String, Vec<u64>>,
    /// Next id [`allocate_job_id`](StoreRoot::allocate_job_id) will hand out.
    pub job_counter: u64,
    /// HTTP façade login identities, keyed by uppercase username.
    pub http_users: BTreeMap<String, HttpUser>,
}

impl StoreRoot {
    /// A fresh root with the reserved `SYSTEM` user already seeded, per the
    /// §3 `User` invariant that it always exists, hidden and disabled.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut users = BTreeMap::new();
        let system = User::system(now);
        users.insert(system.callsign.clone(), system);
        Self {
            config: StoreConfig::default(),
            users,
            messages: BTreeMap::new(),
            message_uuids: HashSet::new(),
            bulletins: BTreeMap::new(),
            bulletin_counter: 0,
            objects: HashMap::new(),
            jobs: BTreeMap::new(),
            job_queue: bbs_queue::JobQueue::new(0),
            user_jobs: BTreeMap::new(),
            job_counter: 0,
            http_users: BTreeMap::new(),
        }
    }

    /// Allocate the next dense bulletin id. Callers must invoke this inside
    /// the same transaction that inserts the bulletin (§4.C concurrency
    /// contract).
    pub fn allocate_bulletin_id(&mut self) -> u64 {
        let id = self.bulletin_counter;
        self.bulletin_counter += 1;
        id
    }

    /// Allocate the next dense job id, same discipline as bulletins.
    pub fn allocate_job_id(&mut self) -> u64 {
        let id = self.job_counter;
        self.job_counter += 1;
        id
    }

    /// Draw a message uuid guaranteed not to collide with any uuid ever
    /// allocated before, across every mailbox.
    pub fn allocate_message_uuid(&mut self) -> Uuid {
        loop {
            let candidate = Uuid::new_v4();
            if self.message_uuids.insert(candidate) {
                return candidate;
            }
        }
    }

    /// Append `message` to `owner`'s mailbox, creating the mailbox if this
    /// is its first entry.
    pub fn deliver_message(&mut self, owner: &str, message: Message) {
        self.messages.entry(owner.to_string()).or_default().push(message);
    }

    /// Record `job_id` as one of `owner`'s submissions.
    pub fn record_user_job(&mut self, owner: &str, job_id: u64) {
        self.user_jobs.entry(owner.to_string()).or_default().push(job_id);
    }
}

impl Default for StoreRoot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_root_seeds_the_system_user() {
        let root = StoreRoot::new();
        let system = root.users.get("SYSTEM").expect("SYSTEM user present");
        assert!(!system.enabled);
        assert!(system.hidden);
    }

    #[test]
    fn bulletin_ids_are_dense_and_monotonic() {
        let mut root = StoreRoot::new();
        assert_eq!(root.allocate_bulletin_id(), 0);
        assert_eq!(root.allocate_bulletin_id(), 1);
        assert_eq!(root.allocate_bulletin_id(), 2);
    }

    #[test]
    fn job_ids_are_dense_and_monotonic() {
        let mut root = StoreRoot::new();
        assert_eq!(root.allocate_job_id(), 0);
        assert_eq!(root.allocate_job_id(), 1);
    }

    #[test]
    fn message_uuids_are_never_reused() {
        let mut root = StoreRoot::new();
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let uuid = root.allocate_message_uuid();
            assert!(seen.insert(uuid), "uuid {uuid} was allocated twice");
        }
        assert_eq!(root.message_uuids.len(), 100);
    }

    #[test]
    fn deliver_message_appends_to_the_named_mailbox() {
        let mut root = StoreRoot::new();
        let uuid = root.allocate_message_uuid();
        let msg = Message {
            uuid,
            sent_at: Utc::now(),
            text: "hi".into(),
            recipients: vec!["W1AW".into()],
            sender: "KQ4PEC".into(),
            retrieved: false,
            delivered: true,
            attachments: vec![],
        };
        root.deliver_message("W1AW", msg);
        assert_eq!(root.messages["W1AW"].len(), 1);
    }
}
