//! Pathfinding request/response types (spec.md §4.2).
//!
//! The pathfinder is asynchronous from the simulation's point of view (one
//! request now, a waypoint list later). The walking state machine polls
//! for the result on each tick rather than awaiting it directly, keeping
//! with the "coroutine-like async (source) -> explicit state machines
//! (target)" design note in spec.md §9.

use crate::geometry::{CollisionBox, Position};

/// Opaque handle to an in-flight pathfinding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathRequestId(pub u64);

/// Parameters of a single pathfinding request.
#[derive(Debug, Clone)]
pub struct PathRequest {
    pub from: Position,
    pub to: Position,
    pub collision_box: CollisionBox,
    pub team: String,
    /// The requesting character itself, excluded from collision checks
    /// (spec.md §4.2: `entity_to_ignore = self`).
    pub entity_to_ignore: u64,
}

/// Outcome of a previously issued [`PathRequest`], once the pathfinder has
/// resolved it.
#[derive(Debug, Clone)]
pub enum PathOutcome {
    /// A non-empty sequence of waypoints to follow in order.
    Found(Vec<Position>),
    /// The pathfinder could not find a route (spec.md §7: `PathUnreachable`).
    Unreachable,
}
