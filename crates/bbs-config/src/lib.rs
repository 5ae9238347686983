// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and env overrides for the packet-radio
//! BBS daemon.
//!
//! This crate provides [`BbsConfig`] — the settings read once at process
//! startup, before the store opens — together with helpers for loading from
//! a TOML file and applying `PS_APP_*` environment variable overrides.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or validating [`BbsConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent startup but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// The default container keepalive is below a sane floor, causing
    /// excessive container churn.
    LowContainerKeepalive {
        /// Configured value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LowContainerKeepalive { secs } => {
                write!(f, "default container keepalive ({secs}s) is unusually low")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config type
// ---------------------------------------------------------------------------

/// Floor below which [`BbsConfig::default_container_keepalive_secs`]
/// generates a [`ConfigWarning::LowContainerKeepalive`].
const LOW_KEEPALIVE_THRESHOLD_SECS: u64 = 10;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Process-startup configuration for the BBS daemon.
///
/// Distinct from `bbs_core::StoreConfig`: this struct is read once from disk
/// (and the environment) before the store opens, and never mutated again for
/// the lifetime of the process.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct BbsConfig {
    /// Path to the embedded store file, or the client-server store's
    /// `zeo-address.txt` when `store_mode = "client-server"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,

    /// Path to `zeo-address.txt` when operating in client-server store mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zeo_address_file: Option<String>,

    /// TCP bind address for the HTTP façade, e.g. `"0.0.0.0:8080"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_bind: Option<String>,

    /// Root directory for the directory-rendezvous transport, if enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_transport_root: Option<String>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Operator's name, used to seed a fresh store's `StoreConfig.operator`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    /// Enables verbose diagnostic output beyond `log_level`.
    #[serde(default)]
    pub debug: bool,

    /// Default container keepalive (seconds) used to seed a fresh store's
    /// `StoreConfig.jobs_config.container_keepalive_secs`.
    #[serde(default = "default_container_keepalive_secs")]
    pub default_container_keepalive_secs: u64,

    /// Default runner image used to seed a fresh store's
    /// `StoreConfig.jobs_config.image`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_runner_image: Option<String>,
}

fn default_container_keepalive_secs() -> u64 {
    300
}

impl Default for BbsConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            zeo_address_file: None,
            http_bind: None,
            directory_transport_root: None,
            log_level: Some("info".into()),
            operator: None,
            debug: false,
            default_container_keepalive_secs: default_container_keepalive_secs(),
            default_runner_image: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`BbsConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`BbsConfig::default()`].
///
/// `PS_APP_*` environment variable overrides are applied on top in both
/// cases.
pub fn load_config(path: Option<&Path>) -> Result<BbsConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => BbsConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`BbsConfig`].
pub fn parse_toml(content: &str) -> Result<BbsConfig, ConfigError> {
    toml::from_str::<BbsConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply `PS_APP_*` environment variable overrides, per §6.
///
/// Recognised variables:
/// - `PS_APP_ZEO_ADDRESS_FILE`
/// - `PS_APP_LOG_LEVEL`
/// - `PS_APP_OPERATOR`
/// - `PS_APP_DEBUG` (parsed as a bool; unparseable values are ignored)
pub fn apply_env_overrides(config: &mut BbsConfig) {
    if let Ok(val) = std::env::var("PS_APP_ZEO_ADDRESS_FILE") {
        config.zeo_address_file = Some(val);
    }
    if let Ok(val) = std::env::var("PS_APP_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Ok(val) = std::env::var("PS_APP_OPERATOR") {
        config.operator = Some(val);
    }
    if let Ok(val) = std::env::var("PS_APP_DEBUG") {
        if let Ok(parsed) = val.trim().parse::<bool>() {
            config.debug = parsed;
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (invalid `log_level`) come back as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &BbsConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    if config.default_container_keepalive_secs < LOW_KEEPALIVE_THRESHOLD_SECS {
        warnings.push(ConfigWarning::LowContainerKeepalive {
            secs: config.default_container_keepalive_secs,
        });
    }

    if config.store_path.is_none() && config.zeo_address_file.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "store_path".into(),
            hint: "neither an embedded store path nor a zeo address file is configured; \
                   the daemon will refuse to start a store"
                .into(),
        });
    }
    if config.http_bind.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "http_bind".into(),
            hint: "HTTP façade will not be started".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_sensible_defaults() {
        let cfg = BbsConfig::default();
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
        assert_eq!(cfg.default_container_keepalive_secs, 300);
        assert!(!cfg.debug);
    }

    #[test]
    fn default_config_is_valid_but_warns() {
        let cfg = BbsConfig::default();
        let warnings = validate_config(&cfg).expect("default config should be valid");
        assert!(warnings.iter().any(|w| matches!(
            w,
            ConfigWarning::MissingOptionalField { field, .. } if field == "store_path"
        )));
    }

    #[test]
    fn parse_valid_toml_string() {
        let toml = r#"
            store_path = "/var/lib/bbs/store.db"
            log_level = "debug"
            operator = "W1AW"
        "#;
        let cfg = parse_toml(toml).unwrap();
        assert_eq!(cfg.store_path.as_deref(), Some("/var/lib/bbs/store.db"));
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.operator.as_deref(), Some("W1AW"));
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let bad = "this is [not valid toml =";
        let err = parse_toml(bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn validation_catches_invalid_log_level() {
        let cfg = BbsConfig {
            log_level: Some("verbose".into()),
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn validation_warns_on_low_keepalive() {
        let cfg = BbsConfig {
            store_path: Some("/tmp/store.db".into()),
            http_bind: Some("0.0.0.0:8080".into()),
            default_container_keepalive_secs: 2,
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::LowContainerKeepalive { secs: 2 })));
    }

    #[test]
    fn fully_specified_config_has_no_missing_field_warnings() {
        let cfg = BbsConfig {
            store_path: Some("/tmp/store.db".into()),
            http_bind: Some("0.0.0.0:8080".into()),
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(!warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::MissingOptionalField { .. })));
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = BbsConfig {
            store_path: Some("/tmp/s.db".into()),
            http_bind: Some("127.0.0.1:9000".into()),
            log_level: Some("trace".into()),
            operator: Some("N0CALL".into()),
            debug: true,
            ..Default::default()
        };
        let serialized = toml::to_string(&cfg).unwrap();
        let deserialized: BbsConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bbs.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "store_path = \"/data/store.db\"\nlog_level = \"warn\"").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.store_path.as_deref(), Some("/data/store.db"));
        assert_eq!(cfg.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/bbs.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_none_returns_default() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
    }

    #[test]
    #[allow(unsafe_code)]
    fn env_overrides_apply_on_top_of_file() {
        // SAFETY: this test owns the env vars it sets/removes and runs
        // single-threaded within its own process for this assertion window.
        unsafe {
            std::env::set_var("PS_APP_LOG_LEVEL", "trace");
            std::env::set_var("PS_APP_DEBUG", "true");
        }
        let mut cfg = BbsConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.log_level.as_deref(), Some("trace"));
        assert!(cfg.debug);
        unsafe {
            std::env::remove_var("PS_APP_LOG_LEVEL");
            std::env::remove_var("PS_APP_DEBUG");
        }
    }

    #[test]
    fn config_error_display() {
        let e = ConfigError::FileNotFound {
            path: "/foo".into(),
        };
        assert!(e.to_string().contains("/foo"));
    }

    #[test]
    fn config_warning_display() {
        let w = ConfigWarning::LowContainerKeepalive { secs: 5 };
        assert!(w.to_string().contains('5'));
    }
}
