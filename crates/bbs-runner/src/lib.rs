// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Per-user container orchestrator for the job subsystem (§4.G).
//!
//! [`engine::ContainerEngine`] is the consumed container-engine interface;
//! [`engine::PodmanEngine`] implements it over the `podman` CLI.
//! [`orchestrator::Orchestrator`] tracks one container per user, runs each
//! job's exec on its own thread (§5: "one runner thread per active job"),
//! and evicts containers idle past `container_keepalive_secs`.

mod engine;
mod orchestrator;

pub use engine::{ContainerEngine, ExecOutput, PodmanEngine};
pub use orchestrator::{Orchestrator, PolicyOptions, RunnerOutcome, RunnerRequest};
