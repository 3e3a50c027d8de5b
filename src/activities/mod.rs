//! The three long-running per-agent activities (spec.md §4.2-§4.4):
//! walking, mining, crafting. Each is an explicit state machine advanced by
//! an agent's tick loop via `process()` rather than a held-open Rust
//! future, per the design note in spec.md §9.

pub mod crafting;
pub mod mining;
pub mod walking;

pub use crafting::{CraftOutcome, CraftingActivity};
pub use mining::{MiningActivity, MiningActivityMode, MiningOutcome};
pub use walking::{WalkOutcome, WalkingActivity};
