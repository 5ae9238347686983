//! Unified error taxonomy with stable error codes for the BBS core.
//!
//! Every error raised inside the core carries an [`ErrorCode`] (a
//! machine-readable, stable string tag), a human-readable message, an
//! optional cause chain, and arbitrary key-value context. Handlers never let
//! these cross a connection boundary as anything but the response statuses
//! the dispatcher maps them to — see the [`ErrorCode::status`] method.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Wire codec framing errors.
    Protocol,
    /// Request routing / admission errors.
    Dispatch,
    /// Domain handler errors (validation, authorization).
    Handler,
    /// Transactional store errors.
    Store,
    /// Job queue and lifecycle errors.
    Queue,
    /// Container orchestrator / runner errors.
    Runner,
    /// Configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Protocol => "protocol",
            Self::Dispatch => "dispatch",
            Self::Handler => "handler",
            Self::Store => "store",
            Self::Queue => "queue",
            Self::Runner => "runner",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code, taken from the error handling table.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Envelope failed to decode or violated the codec's framing rules.
    BadFrame,
    /// No handler is registered for the request's root path segment.
    UnknownPath,
    /// The path matched but not for this request method.
    UnknownMethod,
    /// Caller is a disabled (or otherwise non-authenticated) user.
    Unauthorized,
    /// Caller is authenticated but not the resource's owner.
    Forbidden,
    /// The referenced resource does not exist.
    NotFound,
    /// Payload or field failed validation (bad callsign, bad email, ...).
    Validation,
    /// The store aborted the transaction due to a conflicting writer.
    TransientStoreConflict,
    /// The orchestrator failed to create a runner for a queued job.
    RunnerCreateFailed,
    /// A runner's exec step failed or the process crashed.
    RunnerExecFailed,
    /// The connecting callsign is on the blacklist.
    Blacklisted,
    /// A "quick" job request did not reach a terminal state in time.
    QuickTimeout,
    /// Catch-all for unexpected internal errors.
    Fatal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BadFrame => ErrorCategory::Protocol,
            Self::UnknownPath | Self::UnknownMethod | Self::Blacklisted => ErrorCategory::Dispatch,
            Self::Unauthorized | Self::Forbidden | Self::NotFound | Self::Validation => {
                ErrorCategory::Handler
            }
            Self::TransientStoreConflict => ErrorCategory::Store,
            Self::QuickTimeout => ErrorCategory::Queue,
            Self::RunnerCreateFailed | Self::RunnerExecFailed => ErrorCategory::Runner,
            Self::Fatal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g. `"BAD_FRAME"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadFrame => "BAD_FRAME",
            Self::UnknownPath => "UNKNOWN_PATH",
            Self::UnknownMethod => "UNKNOWN_METHOD",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::TransientStoreConflict => "TRANSIENT_STORE_CONFLICT",
            Self::RunnerCreateFailed => "RUNNER_CREATE_FAILED",
            Self::RunnerExecFailed => "RUNNER_EXEC_FAILED",
            Self::Blacklisted => "BLACKLISTED",
            Self::QuickTimeout => "QUICK_TIMEOUT",
            Self::Fatal => "FATAL",
        }
    }

    /// The wire/HTTP status this code collapses to, per the error handling
    /// table. `TransientStoreConflict` maps to 500 only after its one retry
    /// is exhausted; callers that retry internally never observe that status.
    pub fn status(&self) -> u16 {
        match self {
            Self::BadFrame => 0, // no response is sent; stream continues
            Self::UnknownPath | Self::UnknownMethod | Self::NotFound => 404,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Validation => 400,
            Self::QuickTimeout => 202,
            Self::TransientStoreConflict | Self::RunnerCreateFailed | Self::RunnerExecFailed => {
                500
            }
            Self::Blacklisted => 0, // connection is closed, not answered
            Self::Fatal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BbsError
// ---------------------------------------------------------------------------

/// Unified BBS core error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use bbs_error::{BbsError, ErrorCode};
///
/// let err = BbsError::new(ErrorCode::Validation, "email is not valid")
///     .with_context("field", "email")
///     .with_context("callsign", "W1AW");
/// ```
pub struct BbsError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl BbsError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.status()`.
    pub fn status(&self) -> u16 {
        self.code.status()
    }
}

impl fmt::Debug for BbsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("BbsError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for BbsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for BbsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`BbsError`] (without the opaque source),
/// suitable for the HTTP façade's JSON error bodies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BbsErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&BbsError> for BbsErrorDto {
    fn from(err: &BbsError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<BbsErrorDto> for BbsError {
    fn from(dto: BbsErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}
