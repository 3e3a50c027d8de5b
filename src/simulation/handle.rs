//! The seam between an [`Agent`](crate::agent::state::Agent) and the
//! simulation process it controls.
//!
//! Per the design note in spec.md §9 ("cyclic references"), the character
//! is owned by the simulation; the agent only ever holds an opaque,
//! revalidatable [`CharacterHandle`]. `SimulationWorld` plays the same role
//! the teacher's `ClientWrapper` trait (`src/cloudllm/client_wrapper.rs`)
//! plays for the LLM backend: an `async_trait` seam an agent is generic
//! over, so production code and tests can swap implementations freely.

use crate::error::RuntimeError;
use crate::geometry::{CollisionBox, Position};
use crate::simulation::pathfinder::{PathOutcome, PathRequest, PathRequestId};
use async_trait::async_trait;

/// Opaque, revalidatable reference to the embodied character backing one
/// agent. Cheap to copy; holds no simulation state itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacterHandle(pub u64);

/// Opaque reference to a world entity (resource, machine, tree, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef(pub u64);

/// Snapshot of a character's mining-related state, as exposed by the
/// simulation (spec.md §4.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct MiningState {
    pub mining: bool,
    /// A value in `[0, 1]` that resets to 0 on each completed cycle.
    pub progress: f64,
}

/// The operations the walking/mining/crafting state machines and the
/// placement/reachability services need from the live simulation.
///
/// Implemented once against the real RCON/UDP channel; mocked in tests by
/// an in-memory world (see `tests/` integration tests).
#[async_trait]
pub trait SimulationWorld: Send + Sync {
    async fn character_position(&self, character: CharacterHandle) -> Result<Position, RuntimeError>;
    async fn character_team(&self, character: CharacterHandle) -> Result<String, RuntimeError>;
    async fn character_reach_distance(&self, character: CharacterHandle) -> Result<f64, RuntimeError>;
    async fn character_resource_reach_distance(
        &self,
        character: CharacterHandle,
    ) -> Result<f64, RuntimeError>;
    async fn character_collision_box(&self, character: CharacterHandle) -> Result<CollisionBox, RuntimeError>;

    async fn inventory_count(&self, character: CharacterHandle, item: &str) -> Result<u32, RuntimeError>;
    async fn inventory_add(&self, character: CharacterHandle, item: &str, amount: u32) -> Result<(), RuntimeError>;
    async fn inventory_remove(&self, character: CharacterHandle, item: &str, amount: u32)
        -> Result<(), RuntimeError>;

    /// Issue a single pathfinding request; returns an id that must later be
    /// polled via [`poll_path`](SimulationWorld::poll_path).
    async fn request_path(&self, request: PathRequest) -> Result<PathRequestId, RuntimeError>;
    /// Non-blocking poll; `None` means the request is still in flight.
    async fn poll_path(&self, request_id: PathRequestId) -> Option<PathOutcome>;
    async fn set_walking_direction(
        &self,
        character: CharacterHandle,
        direction: Option<crate::geometry::Direction>,
    ) -> Result<(), RuntimeError>;
    /// Chart the chunk containing `position` (spec.md §3: "set of charted
    /// chunk coordinates"). Best-effort; failures are non-fatal.
    async fn chart_chunk_at(&self, character: CharacterHandle, position: Position);

    async fn entity_at(&self, position: Position, name_hint: Option<&str>) -> Result<Option<EntityRef>, RuntimeError>;
    async fn entity_valid(&self, entity: EntityRef) -> Result<bool, RuntimeError>;
    async fn entity_name(&self, entity: EntityRef) -> Result<String, RuntimeError>;
    async fn entity_position(&self, entity: EntityRef) -> Result<Position, RuntimeError>;
    async fn entity_collision_box(&self, entity: EntityRef) -> Result<CollisionBox, RuntimeError>;

    async fn set_mining_target(
        &self,
        character: CharacterHandle,
        target: Option<EntityRef>,
    ) -> Result<(), RuntimeError>;
    async fn mining_state(&self, character: CharacterHandle) -> Result<MiningState, RuntimeError>;
    async fn set_selected_entity(
        &self,
        character: CharacterHandle,
        entity: Option<EntityRef>,
    ) -> Result<(), RuntimeError>;
    async fn selected_entity_valid(&self, character: CharacterHandle) -> Result<bool, RuntimeError>;

    async fn crafting_queue_size(&self, character: CharacterHandle) -> Result<u32, RuntimeError>;
    async fn crafting_queue_progress(&self, character: CharacterHandle) -> Result<f64, RuntimeError>;
    /// Begin crafting up to `count` repetitions of `recipe`; returns the
    /// number actually queued (spec.md §4.4: `min(count, craftable)`).
    async fn craft_begin(&self, character: CharacterHandle, recipe: &str, count: u32) -> Result<u32, RuntimeError>;
    /// Cancel up to `count` queued repetitions of `recipe` (the first
    /// non-prerequisite matching entry, spec.md §4.4); returns the number
    /// actually cancelled.
    async fn craft_cancel(
        &self,
        character: CharacterHandle,
        recipe: &str,
        count: Option<u32>,
    ) -> Result<u32, RuntimeError>;

    async fn create_entity(
        &self,
        character: CharacterHandle,
        name: &str,
        position: Position,
        is_ghost: bool,
    ) -> Result<EntityRef, RuntimeError>;
    async fn destroy_entity(&self, entity: EntityRef) -> Result<(), RuntimeError>;

    /// Items currently held by an entity's own inventory (e.g. a furnace's
    /// fuel slot), distinct from the character's inventory.
    async fn entity_inventory_count(&self, entity: EntityRef, item: &str) -> Result<u32, RuntimeError>;
    /// Insert up to `amount` of `item` into `entity`'s inventory; returns
    /// the amount actually accepted (spec.md §4.5 "transfer primitive").
    async fn entity_inventory_insert(&self, entity: EntityRef, item: &str, amount: u32) -> Result<u32, RuntimeError>;
    /// Remove up to `amount` of `item` from `entity`'s inventory; returns
    /// the amount actually removed.
    async fn entity_inventory_remove(&self, entity: EntityRef, item: &str, amount: u32) -> Result<u32, RuntimeError>;

    /// Emit an entity-configuration-changed event to the out-of-scope
    /// snapshot layer (spec.md §4.5). Fire-and-forget.
    async fn notify_entity_changed(&self, entity: EntityRef);
}
