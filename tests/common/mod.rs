//! Shared test double for the integration suite: a `SimulationWorld` that
//! actually moves, mines, and crafts in response to calls, so tests can
//! drive whole `Runtime` scenarios tick-by-tick (spec.md §8) instead of
//! re-deriving each state machine's per-tick arithmetic inline.
//!
//! Movement model: `set_walking_direction(Some(dir))` nudges the character
//! `STEP` tiles along `dir`'s unit vector — standing in for "the simulation
//! moved the character this tick in response to the walking state". Mining
//! and crafting progress are driven explicitly by tests via the `Mutex`
//! fields below, the same way the unit tests in `src/activities/*` do.

use embodied_agent_runtime::error::RuntimeError;
use embodied_agent_runtime::geometry::{CollisionBox, Direction, Position};
use embodied_agent_runtime::simulation::handle::MiningState;
use embodied_agent_runtime::simulation::{CharacterHandle, EntityRef, PathOutcome, PathRequest, PathRequestId, SimulationWorld};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// One tile moved per tick while a walking direction is asserted.
pub const STEP: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct FakeEntity {
    pub name: String,
    pub position: Position,
    pub collision_box: CollisionBox,
    pub valid: bool,
    pub inventory: HashMap<String, u32>,
}

pub struct FakeWorld {
    pub position: Mutex<Position>,
    pub team: Mutex<String>,
    pub reach: Mutex<f64>,
    pub resource_reach: Mutex<f64>,
    pub collision_box: Mutex<CollisionBox>,
    pub inventory: Mutex<HashMap<String, u32>>,
    pub entities: Mutex<HashMap<u64, FakeEntity>>,
    pub next_entity_id: Mutex<u64>,
    pub mining: Mutex<MiningState>,
    pub selected_valid: Mutex<bool>,
    pub queue_size: Mutex<u32>,
    pub queue_progress: Mutex<f64>,
    pub create_should_fail: Mutex<bool>,
    pub pending_path: Mutex<Option<Position>>,
}

impl FakeWorld {
    pub fn new(start: Position) -> Self {
        Self {
            position: Mutex::new(start),
            team: Mutex::new("player".to_string()),
            reach: Mutex::new(3.0),
            resource_reach: Mutex::new(4.0),
            collision_box: Mutex::new(CollisionBox::new(1.0, 1.0)),
            inventory: Mutex::new(HashMap::new()),
            entities: Mutex::new(HashMap::new()),
            next_entity_id: Mutex::new(1),
            mining: Mutex::new(MiningState::default()),
            selected_valid: Mutex::new(true),
            queue_size: Mutex::new(0),
            queue_progress: Mutex::new(0.0),
            create_should_fail: Mutex::new(false),
            pending_path: Mutex::new(None),
        }
    }

    pub fn with_inventory(self, item: &str, amount: u32) -> Self {
        self.inventory.lock().unwrap().insert(item.to_string(), amount);
        self
    }

    /// Register a standing entity (furnace, ore patch, rock, ...) and
    /// return its handle.
    pub fn spawn_entity(&self, name: &str, position: Position, collision_box: CollisionBox) -> EntityRef {
        let mut next_id = self.next_entity_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.entities.lock().unwrap().insert(
            id,
            FakeEntity {
                name: name.to_string(),
                position,
                collision_box,
                valid: true,
                inventory: HashMap::new(),
            },
        );
        EntityRef(id)
    }

    pub fn invalidate(&self, entity: EntityRef) {
        if let Some(e) = self.entities.lock().unwrap().get_mut(&entity.0) {
            e.valid = false;
        }
        *self.selected_valid.lock().unwrap() = false;
    }

    pub fn position(&self) -> Position {
        *self.position.lock().unwrap()
    }

    pub fn inventory_of(&self, item: &str) -> u32 {
        *self.inventory.lock().unwrap().get(item).unwrap_or(&0)
    }
}

fn direction_unit(direction: Direction) -> (f64, f64) {
    use std::f64::consts::FRAC_1_SQRT_2;
    match direction {
        Direction::East => (1.0, 0.0),
        Direction::NorthEast => (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
        Direction::North => (0.0, 1.0),
        Direction::NorthWest => (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
        Direction::West => (-1.0, 0.0),
        Direction::SouthWest => (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
        Direction::South => (0.0, -1.0),
        Direction::SouthEast => (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    }
}

#[async_trait]
impl SimulationWorld for FakeWorld {
    async fn character_position(&self, _c: CharacterHandle) -> Result<Position, RuntimeError> {
        Ok(*self.position.lock().unwrap())
    }
    async fn character_team(&self, _c: CharacterHandle) -> Result<String, RuntimeError> {
        Ok(self.team.lock().unwrap().clone())
    }
    async fn character_reach_distance(&self, _c: CharacterHandle) -> Result<f64, RuntimeError> {
        Ok(*self.reach.lock().unwrap())
    }
    async fn character_resource_reach_distance(&self, _c: CharacterHandle) -> Result<f64, RuntimeError> {
        Ok(*self.resource_reach.lock().unwrap())
    }
    async fn character_collision_box(&self, _c: CharacterHandle) -> Result<CollisionBox, RuntimeError> {
        Ok(*self.collision_box.lock().unwrap())
    }
    async fn inventory_count(&self, _c: CharacterHandle, item: &str) -> Result<u32, RuntimeError> {
        Ok(*self.inventory.lock().unwrap().get(item).unwrap_or(&0))
    }
    async fn inventory_add(&self, _c: CharacterHandle, item: &str, amount: u32) -> Result<(), RuntimeError> {
        *self.inventory.lock().unwrap().entry(item.to_string()).or_insert(0) += amount;
        Ok(())
    }
    async fn inventory_remove(&self, _c: CharacterHandle, item: &str, amount: u32) -> Result<(), RuntimeError> {
        let mut inv = self.inventory.lock().unwrap();
        let entry = inv.entry(item.to_string()).or_insert(0);
        *entry = entry.saturating_sub(amount);
        Ok(())
    }
    async fn request_path(&self, request: PathRequest) -> Result<PathRequestId, RuntimeError> {
        // The mock pathfinder is an obstacle-free surface: it always finds
        // a direct single-waypoint route to the goal, resolved on the
        // first `poll_path` call after the request.
        *self.pending_path.lock().unwrap() = Some(request.to);
        Ok(PathRequestId(1))
    }
    async fn poll_path(&self, _id: PathRequestId) -> Option<PathOutcome> {
        self.pending_path.lock().unwrap().take().map(|to| PathOutcome::Found(vec![to]))
    }
    async fn set_walking_direction(&self, _c: CharacterHandle, direction: Option<Direction>) -> Result<(), RuntimeError> {
        if let Some(direction) = direction {
            let (ux, uy) = direction_unit(direction);
            let mut pos = self.position.lock().unwrap();
            *pos = pos.translate(ux * STEP, uy * STEP);
        }
        Ok(())
    }
    async fn chart_chunk_at(&self, _c: CharacterHandle, _p: Position) {}
    async fn entity_at(&self, position: Position, name_hint: Option<&str>) -> Result<Option<EntityRef>, RuntimeError> {
        let entities = self.entities.lock().unwrap();
        for (id, e) in entities.iter() {
            if !e.valid {
                continue;
            }
            if let Some(name) = name_hint {
                if e.name != name {
                    continue;
                }
            }
            if e.collision_box.contains(&e.position, &position) {
                return Ok(Some(EntityRef(*id)));
            }
        }
        Ok(None)
    }
    async fn entity_valid(&self, entity: EntityRef) -> Result<bool, RuntimeError> {
        Ok(self.entities.lock().unwrap().get(&entity.0).map(|e| e.valid).unwrap_or(false))
    }
    async fn entity_name(&self, entity: EntityRef) -> Result<String, RuntimeError> {
        self.entities
            .lock()
            .unwrap()
            .get(&entity.0)
            .map(|e| e.name.clone())
            .ok_or_else(|| RuntimeError::entity_invalid("no such entity"))
    }
    async fn entity_position(&self, entity: EntityRef) -> Result<Position, RuntimeError> {
        self.entities
            .lock()
            .unwrap()
            .get(&entity.0)
            .map(|e| e.position)
            .ok_or_else(|| RuntimeError::entity_invalid("no such entity"))
    }
    async fn entity_collision_box(&self, entity: EntityRef) -> Result<CollisionBox, RuntimeError> {
        self.entities
            .lock()
            .unwrap()
            .get(&entity.0)
            .map(|e| e.collision_box)
            .ok_or_else(|| RuntimeError::entity_invalid("no such entity"))
    }
    async fn set_mining_target(&self, _c: CharacterHandle, target: Option<EntityRef>) -> Result<(), RuntimeError> {
        let mut state = self.mining.lock().unwrap();
        state.mining = target.is_some();
        if target.is_none() {
            state.progress = 0.0;
        }
        Ok(())
    }
    async fn mining_state(&self, _c: CharacterHandle) -> Result<MiningState, RuntimeError> {
        Ok(*self.mining.lock().unwrap())
    }
    async fn set_selected_entity(&self, _c: CharacterHandle, entity: Option<EntityRef>) -> Result<(), RuntimeError> {
        *self.selected_valid.lock().unwrap() = entity.is_some();
        Ok(())
    }
    async fn selected_entity_valid(&self, _c: CharacterHandle) -> Result<bool, RuntimeError> {
        Ok(*self.selected_valid.lock().unwrap())
    }
    async fn crafting_queue_size(&self, _c: CharacterHandle) -> Result<u32, RuntimeError> {
        Ok(*self.queue_size.lock().unwrap())
    }
    async fn crafting_queue_progress(&self, _c: CharacterHandle) -> Result<f64, RuntimeError> {
        Ok(*self.queue_progress.lock().unwrap())
    }
    async fn craft_begin(&self, _c: CharacterHandle, _recipe: &str, count: u32) -> Result<u32, RuntimeError> {
        *self.queue_size.lock().unwrap() += count;
        Ok(count)
    }
    async fn craft_cancel(&self, _c: CharacterHandle, _recipe: &str, count: Option<u32>) -> Result<u32, RuntimeError> {
        let mut size = self.queue_size.lock().unwrap();
        let cancelled = count.unwrap_or(*size).min(*size);
        *size -= cancelled;
        Ok(cancelled)
    }
    async fn create_entity(&self, _c: CharacterHandle, name: &str, position: Position, _is_ghost: bool) -> Result<EntityRef, RuntimeError> {
        if *self.create_should_fail.lock().unwrap() {
            return Err(RuntimeError::internal("simulation refused create"));
        }
        Ok(self.spawn_entity(name, position, CollisionBox::new(1.0, 1.0)))
    }
    async fn destroy_entity(&self, entity: EntityRef) -> Result<(), RuntimeError> {
        self.entities.lock().unwrap().remove(&entity.0);
        Ok(())
    }
    async fn entity_inventory_count(&self, entity: EntityRef, item: &str) -> Result<u32, RuntimeError> {
        Ok(self
            .entities
            .lock()
            .unwrap()
            .get(&entity.0)
            .and_then(|e| e.inventory.get(item).copied())
            .unwrap_or(0))
    }
    async fn entity_inventory_insert(&self, entity: EntityRef, item: &str, amount: u32) -> Result<u32, RuntimeError> {
        let mut entities = self.entities.lock().unwrap();
        if let Some(e) = entities.get_mut(&entity.0) {
            *e.inventory.entry(item.to_string()).or_insert(0) += amount;
        }
        Ok(amount)
    }
    async fn entity_inventory_remove(&self, entity: EntityRef, item: &str, amount: u32) -> Result<u32, RuntimeError> {
        let mut entities = self.entities.lock().unwrap();
        if let Some(e) = entities.get_mut(&entity.0) {
            let entry = e.inventory.entry(item.to_string()).or_insert(0);
            let removed = amount.min(*entry);
            *entry -= removed;
            return Ok(removed);
        }
        Ok(0)
    }
    async fn notify_entity_changed(&self, _entity: EntityRef) {}
}
