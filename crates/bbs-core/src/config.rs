//! The persisted, mutable `config` root key.
//!
//! Distinct from `bbs_config::BbsConfig` (process-startup configuration read
//! once from a TOML file before the store opens). This `StoreConfig` lives
//! inside the store itself and is mutated under the same transactional
//! discipline as every other root key.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Runner selection and pool sizing, mirrored from the orchestrator's
/// `PolicyOptions` (§4.G) so the persisted config can drive construction of
/// a fresh orchestrator at startup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobsConfig {
    /// Which orchestrator backend to construct (currently only `"podman"`).
    pub runner: String,
    /// Base image used for new per-user containers.
    pub image: String,
    /// Maximum number of concurrently in-process runners.
    pub max_active_jobs: usize,
    /// Seconds of inactivity after which an idle container is evicted.
    pub container_keepalive_secs: u64,
    /// Prefix applied to every container name this server manages.
    pub name_prefix: String,
    /// Default per-job timeout in seconds.
    pub default_timeout_secs: u64,
    /// Hard upper bound on any job's timeout in seconds.
    pub max_timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            runner: "podman".to_string(),
            image: "debian".to_string(),
            max_active_jobs: 5,
            container_keepalive_secs: 300,
            name_prefix: "packetserver_".to_string(),
            default_timeout_secs: 300,
            max_timeout_secs: 3600,
        }
    }
}

/// The persisted, mutable configuration root key.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreConfig {
    /// Message of the day shown by the root handler.
    pub motd: String,
    /// Operator's name or callsign, shown by the root handler.
    pub operator: String,
    /// Ordered list of blacklisted callsigns; `SYSTEM` must always be
    /// present (§8 quantified invariants).
    pub blacklist: Vec<String>,
    /// Whether the job subsystem accepts new submissions.
    pub jobs_enabled: bool,
    /// Runner selection and sizing for the orchestrator.
    pub jobs_config: JobsConfig,
    /// This server's own callsign.
    pub server_callsign: String,
    /// Human-readable server name.
    pub server_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            motd: String::new(),
            operator: String::new(),
            blacklist: vec![crate::callsign::SYSTEM_USER.to_string()],
            jobs_enabled: false,
            jobs_config: JobsConfig::default(),
            server_callsign: String::new(),
            server_name: String::new(),
        }
    }
}

impl StoreConfig {
    /// Whether `callsign` (already normalised to base form) is blacklisted.
    pub fn is_blacklisted(&self, callsign: &str) -> bool {
        self.blacklist.iter().any(|b| b == callsign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blacklist_always_contains_system() {
        let cfg = StoreConfig::default();
        assert!(cfg.is_blacklisted(crate::callsign::SYSTEM_USER));
    }

    #[test]
    fn jobs_disabled_by_default() {
        assert!(!StoreConfig::default().jobs_enabled);
    }
}
