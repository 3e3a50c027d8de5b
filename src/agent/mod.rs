//! Per-agent state and the declarative RPC surface (spec.md §3, §4.1).

pub mod dispatch;
pub mod state;

pub use dispatch::{action_table, validate_params, ActionCategory, ActionDescriptor, ActionKind, ParamKind, ParamSpec, QueuedEnvelope};
pub use state::Agent;
