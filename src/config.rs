//! Runtime configuration.
//!
//! Users construct this manually — no TOML/YAML/env-var parsing dependency
//! is introduced here, matching the teacher's `CloudLLMConfig` philosophy
//! (`src/cloudllm/config.rs`): the crate itself is config-format agnostic,
//! a host process is free to build one from whatever source it wants.

use std::path::PathBuf;

/// Global configuration for the action runtime.
///
/// # Example
///
/// ```rust
/// use embodied_agent_runtime::config::RuntimeConfig;
///
/// let config = RuntimeConfig::default();
/// assert_eq!(config.reach_distance, 3.0);
///
/// let config = RuntimeConfig {
///     reach_distance: 4.5,
///     ..RuntimeConfig::default()
/// };
/// assert_eq!(config.reach_distance, 4.5);
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Default interaction reach distance for non-resource entities.
    pub reach_distance: f64,
    /// Separate, typically larger, reach distance for ores/trees/rocks.
    pub resource_reach_distance: f64,
    /// UDP port completion messages are sent to (spec.md §4.8).
    pub completion_udp_port: u16,
    /// Path the action queue's persisted blob is written to on every
    /// mutation (spec.md §6 "Persisted state").
    pub queue_persistence_path: PathBuf,
    /// Default cap on the number of entries `ActionQueue::enqueue` accepts
    /// before refusing new work; overridable at runtime via
    /// `set_max_queue_size`.
    pub default_max_queue_size: usize,
    /// Distance an agent must move before its reachability cache is marked
    /// dirty (spec.md §4.6).
    pub reachability_move_threshold: f64,
    /// Radius, in chunks, swept when searching for placement cues
    /// (spec.md §4.5: "5x5 surrounding chunks").
    pub placement_cue_chunk_radius: i32,
}

impl Default for RuntimeConfig {
    /// Sane defaults matching the values used throughout spec.md's §8
    /// scenarios: `reach_distance = 3.0`, `resource_reach_distance = 4.0`.
    fn default() -> Self {
        Self {
            reach_distance: 3.0,
            resource_reach_distance: 4.0,
            completion_udp_port: 34197,
            queue_persistence_path: PathBuf::from("action_queue.json"),
            default_max_queue_size: 1000,
            reachability_move_threshold: 1.0,
            placement_cue_chunk_radius: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_reach_distances() {
        let config = RuntimeConfig::default();
        assert_eq!(config.reach_distance, 3.0);
        assert_eq!(config.resource_reach_distance, 4.0);
    }
}
