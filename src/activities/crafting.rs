//! Crafting state machine (spec.md §4.4).
//!
//! Unlike walking/mining, the simulation's crafting queue is a FIFO shared
//! across everything the character has queued, so detecting *this
//! activity's* completion means watching the queue size shrink rather than
//! any per-item signal. Cancellation races against completion on the same
//! tick: both book-keep against `start_queue_size` so exactly one of them
//! fires per queued repetition.

use crate::error::RuntimeError;
use crate::prototypes::{ItemStack, PrototypeTable};
use crate::simulation::{CharacterHandle, SimulationWorld};
use std::collections::HashMap;

/// One in-flight crafting activity (spec.md §3 Activity Records).
#[derive(Debug, Clone)]
pub struct CraftingActivity {
    pub action_id: String,
    pub start_tick: u64,
    pub recipe: String,
    /// Per-craft product line, snapshotted at start so completion can scale
    /// by `count_crafted` without a prototype lookup (spec.md §4.4 "Product
    /// accounting").
    products: Vec<ItemStack>,
    pub count_queued: u32,
    pub start_queue_size: u32,
    pub count_cancelled: u32,
    pub completed_this_tick: bool,
}

#[derive(Debug, Clone)]
pub struct CraftOutcome {
    pub success: bool,
    pub reason: &'static str,
    pub count_crafted: u32,
    pub actual_products: HashMap<String, u32>,
}

impl CraftingActivity {
    /// spec.md §4.4 "Start": `count_queued = min(count, craftable)`, where
    /// `craftable` is bounded by ingredients on hand and recipe availability.
    pub async fn start(
        world: &dyn SimulationWorld,
        prototypes: &PrototypeTable,
        character: CharacterHandle,
        action_id: String,
        tick: u64,
        recipe: &str,
        count: u32,
    ) -> Result<CraftingActivity, RuntimeError> {
        let proto = prototypes
            .recipe(recipe)
            .ok_or_else(|| RuntimeError::recipe_unavailable(format!("unknown recipe: {}", recipe)))?;
        if !proto.hand_craftable {
            return Err(RuntimeError::recipe_unavailable(format!(
                "{} requires a crafting machine and cannot be hand-crafted",
                recipe
            )));
        }

        for ingredient in &proto.ingredients {
            let have = world.inventory_count(character, &ingredient.item).await?;
            let needed = ingredient.amount.saturating_mul(count);
            if have < needed {
                return Err(RuntimeError::insufficient_inventory(ingredient.item.clone(), needed, have));
            }
        }

        let start_queue_size = world.crafting_queue_size(character).await?;
        let count_queued = world.craft_begin(character, recipe, count).await?;

        Ok(CraftingActivity {
            action_id,
            start_tick: tick,
            recipe: recipe.to_string(),
            products: proto.products.clone(),
            count_queued,
            start_queue_size,
            count_cancelled: 0,
            completed_this_tick: false,
        })
    }

    /// spec.md §4.4 "Product accounting": scale the recipe's per-craft
    /// outputs by `count_crafted = count_queued - count_cancelled`.
    fn actual_products(&self) -> HashMap<String, u32> {
        let count_crafted = self.count_queued.saturating_sub(self.count_cancelled);
        self.products
            .iter()
            .map(|p| (p.item.clone(), p.amount.saturating_mul(count_crafted)))
            .collect()
    }

    /// Advance by one tick. Completion is detected by queue-size delta
    /// (spec.md §4.4 "Completion detection"): either the queue shrank below
    /// `start_queue_size`, or it's empty with zero progress and we started
    /// with a non-empty queue (covers the single-repetition case where the
    /// queue entry is consumed entirely within one tick).
    pub async fn process(
        &mut self,
        world: &dyn SimulationWorld,
        character: CharacterHandle,
    ) -> Result<Option<CraftOutcome>, RuntimeError> {
        self.completed_this_tick = false;

        let current_size = world.crafting_queue_size(character).await?;
        let progress = world.crafting_queue_progress(character).await?;

        let finished = current_size < self.start_queue_size
            || (current_size == 0 && progress == 0.0 && self.start_queue_size > 0);

        if finished {
            self.completed_this_tick = true;
            let count_crafted = self.count_queued.saturating_sub(self.count_cancelled);
            return Ok(Some(CraftOutcome {
                success: true,
                reason: "completed",
                count_crafted,
                actual_products: self.actual_products(),
            }));
        }
        Ok(None)
    }

    /// `stop_crafting` (spec.md §4.4, §5 "Cancellation"): cancel up to the
    /// remaining queued repetitions. `count_crafted` is reconciled against
    /// however many repetitions the simulation reports as actually
    /// cancelled, so a cancellation racing a natural completion can never
    /// double-count or under-count.
    pub async fn cancel(
        &mut self,
        world: &dyn SimulationWorld,
        character: CharacterHandle,
        count: Option<u32>,
    ) -> Result<CraftOutcome, RuntimeError> {
        let cancelled = world.craft_cancel(character, &self.recipe, count).await?;
        self.count_cancelled = self.count_cancelled.saturating_add(cancelled);
        self.completed_this_tick = true;
        let count_crafted = self.count_queued.saturating_sub(self.count_cancelled);
        Ok(CraftOutcome {
            success: true,
            reason: "cancelled",
            count_crafted,
            actual_products: self.actual_products(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CollisionBox, Position};
    use crate::prototypes::PrototypeTable;
    use crate::simulation::handle::MiningState;
    use crate::simulation::{EntityRef, PathOutcome, PathRequest, PathRequestId};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeWorld {
        inventory: Mutex<HashMap<String, u32>>,
        queue_size: Mutex<u32>,
        progress: Mutex<f64>,
    }

    #[async_trait]
    impl SimulationWorld for FakeWorld {
        async fn character_position(&self, _c: CharacterHandle) -> Result<Position, RuntimeError> {
            Ok(Position::new(0.0, 0.0))
        }
        async fn character_team(&self, _c: CharacterHandle) -> Result<String, RuntimeError> {
            Ok("player".to_string())
        }
        async fn character_reach_distance(&self, _c: CharacterHandle) -> Result<f64, RuntimeError> {
            Ok(3.0)
        }
        async fn character_resource_reach_distance(&self, _c: CharacterHandle) -> Result<f64, RuntimeError> {
            Ok(4.0)
        }
        async fn character_collision_box(&self, _c: CharacterHandle) -> Result<CollisionBox, RuntimeError> {
            Ok(CollisionBox::new(1.0, 1.0))
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
        async fn request_path(&self, _r: PathRequest) -> Result<PathRequestId, RuntimeError> {
            Ok(PathRequestId(1))
        }
        async fn poll_path(&self, _id: PathRequestId) -> Option<PathOutcome> {
            None
        }
        async fn set_walking_direction(
            &self,
            _c: CharacterHandle,
            _d: Option<crate::geometry::Direction>,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn chart_chunk_at(&self, _c: CharacterHandle, _p: Position) {}
        async fn entity_at(&self, _p: Position, _n: Option<&str>) -> Result<Option<EntityRef>, RuntimeError> {
            Ok(None)
        }
        async fn entity_valid(&self, _e: EntityRef) -> Result<bool, RuntimeError> {
            Ok(true)
        }
        async fn entity_name(&self, _e: EntityRef) -> Result<String, RuntimeError> {
            Ok("iron-ore".to_string())
        }
        async fn entity_position(&self, _e: EntityRef) -> Result<Position, RuntimeError> {
            Ok(Position::new(1.0, 0.0))
        }
        async fn entity_collision_box(&self, _e: EntityRef) -> Result<CollisionBox, RuntimeError> {
            Ok(CollisionBox::new(1.0, 1.0))
        }
        async fn set_mining_target(&self, _c: CharacterHandle, _e: Option<EntityRef>) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn mining_state(&self, _c: CharacterHandle) -> Result<MiningState, RuntimeError> {
            Ok(MiningState::default())
        }
        async fn set_selected_entity(&self, _c: CharacterHandle, _e: Option<EntityRef>) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn selected_entity_valid(&self, _c: CharacterHandle) -> Result<bool, RuntimeError> {
            Ok(true)
        }
        async fn crafting_queue_size(&self, _c: CharacterHandle) -> Result<u32, RuntimeError> {
            Ok(*self.queue_size.lock().unwrap())
        }
        async fn crafting_queue_progress(&self, _c: CharacterHandle) -> Result<f64, RuntimeError> {
            Ok(*self.progress.lock().unwrap())
        }
        async fn craft_begin(&self, _c: CharacterHandle, _r: &str, count: u32) -> Result<u32, RuntimeError> {
            *self.queue_size.lock().unwrap() += count;
            Ok(count)
        }
        async fn craft_cancel(&self, _c: CharacterHandle, _r: &str, count: Option<u32>) -> Result<u32, RuntimeError> {
            let mut size = self.queue_size.lock().unwrap();
            let cancelled = count.unwrap_or(*size).min(*size);
            *size -= cancelled;
            Ok(cancelled)
        }
        async fn create_entity(
            &self,
            _c: CharacterHandle,
            _n: &str,
            _p: Position,
            _g: bool,
        ) -> Result<EntityRef, RuntimeError> {
            Ok(EntityRef(1))
        }
        async fn destroy_entity(&self, _e: EntityRef) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn entity_inventory_count(&self, _e: EntityRef, _i: &str) -> Result<u32, RuntimeError> {
            Ok(0)
        }
        async fn entity_inventory_insert(&self, _e: EntityRef, _i: &str, _a: u32) -> Result<u32, RuntimeError> {
            Ok(0)
        }
        async fn entity_inventory_remove(&self, _e: EntityRef, _i: &str, _a: u32) -> Result<u32, RuntimeError> {
            Ok(0)
        }
        async fn notify_entity_changed(&self, _e: EntityRef) {}
    }

    fn world_with_plates(count: u32) -> FakeWorld {
        let mut inventory = HashMap::new();
        inventory.insert("iron-plate".to_string(), count);
        FakeWorld {
            inventory: Mutex::new(inventory),
            queue_size: Mutex::new(0),
            progress: Mutex::new(0.0),
        }
    }

    #[tokio::test]
    async fn craft_two_gears_completes_when_queue_drains() {
        let world = world_with_plates(4);
        let prototypes = PrototypeTable::builtin();
        let character = CharacterHandle(1);
        let mut activity = CraftingActivity::start(
            &world,
            &prototypes,
            character,
            "c1".to_string(),
            0,
            "iron-gear-wheel",
            2,
        )
        .await
        .unwrap();
        assert_eq!(activity.count_queued, 2);

        assert!(activity.process(&world, character).await.unwrap().is_none());

        *world.queue_size.lock().unwrap() = 0;
        *world.progress.lock().unwrap() = 0.0;
        let outcome = activity.process(&world, character).await.unwrap().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.count_crafted, 2);
        assert_eq!(outcome.actual_products["iron-gear-wheel"], 2);
    }

    #[tokio::test]
    async fn insufficient_ingredients_refuses_to_start() {
        let world = world_with_plates(1);
        let prototypes = PrototypeTable::builtin();
        let character = CharacterHandle(1);
        let err = CraftingActivity::start(&world, &prototypes, character, "c2".to_string(), 0, "iron-gear-wheel", 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InsufficientInventory);
    }

    #[tokio::test]
    async fn cancel_reconciles_count_crafted() {
        let world = world_with_plates(10);
        let prototypes = PrototypeTable::builtin();
        let character = CharacterHandle(1);
        let mut activity = CraftingActivity::start(
            &world,
            &prototypes,
            character,
            "c3".to_string(),
            0,
            "iron-gear-wheel",
            5,
        )
        .await
        .unwrap();

        let outcome = activity.cancel(&world, character, Some(3)).await.unwrap();
        assert_eq!(outcome.count_crafted, 2);
    }
}
