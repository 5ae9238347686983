// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! bbs-dispatcher
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Synchronous request dispatch for the BBS core (§4.D): connection
//! admission, routing a decoded [`bbs_wire::WireRequest`] to its domain
//! handler, and turning handler errors into wire-level responses. Every
//! function here is plain synchronous code over a [`bbs_store::Store`] — the
//! thread-per-connection model (§5) means no handler needs to be async.

mod admission;
mod handlers;
mod router;
mod util;

pub use admission::{admit_connection, Admission};
pub use router::dispatch;
