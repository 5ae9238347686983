//! Threading and lifecycle glue tying `bbs-store`, `bbs-runner`,
//! `bbs-dispatcher`, `bbs-transport`, and `bbs-http` into one running
//! server. See `main.rs` for how the pieces are wired together.

pub mod cadence;
pub mod connection;
pub mod manager;
pub mod worker;

pub use cadence::Cadence;
pub use manager::OrchestratorManager;
pub use worker::JobWorker;
