// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! bbs-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Stable domain types shared by every other crate in this workspace: the
//! persistent entities of §3 (`User`, `Bulletin`, `Message`, `Object`,
//! `Job`, `HttpUser`, the persisted `StoreConfig`), AX.25 callsign handling,
//! and the dynamic `Value` payload type used by requests and responses.

/// Recent bulletin posts.
pub mod bulletin;
/// AX.25 callsign normalisation and validation.
pub mod callsign;
/// Persisted, mutable server configuration.
pub mod config;
/// HTTP façade login identities.
pub mod http_user;
/// Queued and executed jobs.
pub mod job;
/// Private mail and attachments.
pub mod message;
/// User-owned content objects.
pub mod object;
/// Registered BBS users.
pub mod user;
/// Dynamic tagged value payloads.
pub mod value;

pub use bulletin::Bulletin;
pub use callsign::{base_callsign, is_valid_base_callsign, is_valid_full_callsign};
pub use config::{JobsConfig, StoreConfig};
pub use http_user::HttpUser;
pub use job::{Command, InputFile, Job, JobStatus};
pub use message::{Attachment, AttachmentSource, Message};
pub use object::Object;
pub use user::{User, UserPatch, UserSafeDict};
pub use value::Value;

/// Default MTU (bytes) for transport `sendData` chunking, per §4.B.
pub const DEFAULT_MTU: usize = 2000;

/// Seconds a quick job request waits before falling back to a 202 response.
pub const QUICK_JOB_TIMEOUT_SECS: u64 = 30;

/// Minimum uncompressed payload size (bytes) before compression is even
/// attempted; below this, the codec always emits `c=NONE`.
pub const MIN_COMPRESSIBLE_SIZE: usize = 30;
