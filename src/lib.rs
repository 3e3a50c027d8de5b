//! `embodied-agent-runtime`: a per-agent action runtime sitting between an
//! external controller and a simulation process (spec.md §1).
//!
//! The crate exposes synchronous queries/mutations and long-running
//! asynchronous activities (walk, mine, craft) per agent, multiplexed
//! across agents by a tick-driven [`runtime::Runtime`].

pub mod activities;
pub mod agent;
pub mod config;
pub mod error;
pub mod geometry;
pub mod notify;
pub mod placement;
pub mod prototypes;
pub mod queue;
pub mod reachability;
pub mod research;
pub mod runtime;
pub mod simulation;

pub use agent::Agent;
pub use config::RuntimeConfig;
pub use error::{ErrorKind, RuntimeError};
pub use runtime::Runtime;
