//! Error taxonomy for the action runtime (spec.md §7).
//!
//! Follows the teacher's `ToolError` convention: a plain enum with a manual
//! `Display` + `std::error::Error` impl rather than a derive-macro crate.
//! Pre-condition failures (validation, reach, inventory) surface as `Err`
//! from a sync method call or as an immediate failed completion for an
//! async one — never a `queued` message followed by a failure.

use std::fmt;

/// Structured error returned to the controller: `{kind, message, details?}`.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    pub fn unreachable(distance: f64, limit: f64) -> Self {
        Self::new(
            ErrorKind::Unreachable,
            format!("target is {:.2} away, reach limit is {:.2}", distance, limit),
        )
        .with_details(serde_json::json!({ "distance": distance, "limit": limit }))
    }

    pub fn entity_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EntityInvalid, message)
    }

    pub fn insufficient_inventory(item: impl Into<String>, needed: u32, have: u32) -> Self {
        let item = item.into();
        Self::new(
            ErrorKind::InsufficientInventory,
            format!("need {} {}, have {}", needed, item, have),
        )
        .with_details(serde_json::json!({ "item": item, "needed": needed, "have": have }))
    }

    pub fn exclusivity_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExclusivityConflict, message)
    }

    pub fn recipe_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RecipeUnavailable, message)
    }

    pub fn path_unreachable() -> Self {
        Self::new(ErrorKind::PathUnreachable, "pathfinder returned no path")
    }

    pub fn path_stuck() -> Self {
        Self::new(
            ErrorKind::PathStuck,
            "progress stalled beyond tolerance without triggering anti-stuck safety",
        )
    }

    pub fn entity_at_goal() -> Self {
        Self::new(
            ErrorKind::EntityAtGoal,
            "goal tile is occupied and strict_goal was requested",
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// The taxonomy of synchronously (or immediate-failure) reportable errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A field missing, wrong type, or out of enumerated range.
    InvalidParameter,
    /// Target outside `reach_distance` / `resource_reach_distance`.
    Unreachable,
    /// Named entity not found at the resolved position, or already destroyed.
    EntityInvalid,
    /// Item count too low for placement or crafting.
    InsufficientInventory,
    /// e.g. craft while huge-rock mining, or walk while already walking.
    ExclusivityConflict,
    /// Recipe disabled for the team, or ingredients require fluid.
    RecipeUnavailable,
    /// Pathfinder returned an empty path; surfaces as a failed async completion.
    PathUnreachable,
    /// Progress stalled beyond tolerance without the anti-stuck safety firing.
    PathStuck,
    /// Strict-goal walk requested into an occupied tile.
    EntityAtGoal,
    /// Anything else (handle invalidated mid-tick, simulation desync, ...).
    Internal,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
