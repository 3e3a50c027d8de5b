//! Mining state machine (spec.md §4.3).
//!
//! Two modes selected from the target entity's prototype: `Incremental`
//! (ore patches, counted by progress-edge cycle detection) and `Deplete`
//! (trees/rocks/huge-rock, terminated when the entity becomes invalid).
//! Stochastic products (currently only `huge-rock`) are resolved by an
//! inventory-delta snapshot rather than trusting the mining progress
//! signal, since their yield is randomized per cycle.

use crate::error::RuntimeError;
use crate::geometry::Position;
use crate::prototypes::{MineableKind, PrototypeTable};
use crate::simulation::{CharacterHandle, EntityRef, SimulationWorld};
use std::collections::HashMap;

const COMPLETION_THRESHOLD_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningActivityMode {
    Incremental,
    Deplete,
}

/// One in-flight mining activity (spec.md §3 Activity Records).
#[derive(Debug, Clone)]
pub struct MiningActivity {
    pub action_id: String,
    pub mode: MiningActivityMode,
    pub start_tick: u64,
    pub entity_name: String,
    pub entity: EntityRef,
    pub entity_position: Position,
    pub target_count: Option<u32>,
    pub count_progress: u32,
    pub completion_threshold: Option<f64>,
    pub last_progress: f64,
    pub is_stochastic: bool,
    pub start_inventory_snapshot: Option<HashMap<String, u32>>,
    pub expected_products: Option<HashMap<String, u32>>,
    pub completed_this_tick: bool,
}

#[derive(Debug, Clone)]
pub struct MiningOutcome {
    pub success: bool,
    pub reason: &'static str,
    pub actual_products: HashMap<String, u32>,
}

impl MiningActivity {
    /// spec.md §4.3 "Start".
    pub async fn start(
        world: &dyn SimulationWorld,
        prototypes: &PrototypeTable,
        character: CharacterHandle,
        action_id: String,
        tick: u64,
        target: EntityRef,
        target_count: Option<u32>,
        effective_mining_speed: f64,
    ) -> Result<MiningActivity, RuntimeError> {
        let entity_name = world.entity_name(target).await?;
        let proto = prototypes
            .entity(&entity_name)
            .ok_or_else(|| RuntimeError::entity_invalid(format!("unknown entity prototype: {}", entity_name)))?;

        let Some(mineable_kind) = proto.mineable_kind else {
            return Err(RuntimeError::entity_invalid(format!("{} is not mineable", entity_name)));
        };
        if proto.requires_fluid {
            return Err(RuntimeError::invalid_parameter(format!(
                "{}'s product requires fluid and cannot be hand-mined",
                entity_name
            )));
        }

        let entity_position = world.entity_position(target).await?;
        let char_pos = world.character_position(character).await?;
        let reach = world.character_resource_reach_distance(character).await?;
        let distance = char_pos.distance(&entity_position);
        if distance > reach {
            return Err(RuntimeError::unreachable(distance, reach));
        }

        let is_stochastic = proto.is_stochastic();
        let mode = match mineable_kind {
            MineableKind::Resource => MiningActivityMode::Incremental,
            MineableKind::Depletable => MiningActivityMode::Deplete,
        };

        let completion_threshold = proto
            .mining_time
            .map(|mt| 1.0 - (effective_mining_speed / (mt * 60.0)) - COMPLETION_THRESHOLD_EPSILON);

        let mut start_inventory_snapshot = None;
        let mut expected_products = None;
        if is_stochastic {
            let mut snapshot = HashMap::new();
            for product in &proto.mineable_products {
                let count = world.inventory_count(character, &product.item).await?;
                snapshot.insert(product.item.clone(), count);
            }
            start_inventory_snapshot = Some(snapshot);
        } else if mode == MiningActivityMode::Deplete {
            let mut products = HashMap::new();
            for product in &proto.mineable_products {
                if product.probability >= 1.0 {
                    *products.entry(product.item.clone()).or_insert(0) += 1;
                }
            }
            expected_products = Some(products);
        }

        world.set_mining_target(character, Some(target)).await?;
        world.set_selected_entity(character, Some(target)).await?;

        Ok(MiningActivity {
            action_id,
            mode,
            start_tick: tick,
            entity_name,
            entity: target,
            entity_position,
            target_count,
            count_progress: 0,
            completion_threshold,
            last_progress: 0.0,
            is_stochastic,
            start_inventory_snapshot,
            expected_products,
            completed_this_tick: false,
        })
    }

    /// Advance by one tick. Returns `Some(outcome)` the tick the mining
    /// activity terminates (spec.md §4.3 "Cycle detection" / "Depletion
    /// detection").
    pub async fn process(
        &mut self,
        world: &dyn SimulationWorld,
        character: CharacterHandle,
    ) -> Result<Option<MiningOutcome>, RuntimeError> {
        self.completed_this_tick = false;

        let state = world.mining_state(character).await?;
        let entity_valid = world.entity_valid(self.entity).await?;
        let selected_valid = world.selected_entity_valid(character).await?;

        match self.mode {
            MiningActivityMode::Incremental => {
                if !state.mining || !entity_valid {
                    let outcome = self.finalize(world, character, "completed").await?;
                    return Ok(Some(outcome));
                }

                if let Some(threshold) = self.completion_threshold {
                    if self.last_progress > threshold && state.progress < self.last_progress {
                        self.count_progress += 1;
                        if let Some(target) = self.target_count {
                            if self.count_progress >= target {
                                let outcome = self.finalize(world, character, "completed").await?;
                                return Ok(Some(outcome));
                            }
                        }
                    }
                }
                self.last_progress = state.progress;
                Ok(None)
            }
            MiningActivityMode::Deplete => {
                if !state.mining || !selected_valid || !entity_valid {
                    let outcome = self.finalize(world, character, "depleted").await?;
                    return Ok(Some(outcome));
                }
                Ok(None)
            }
        }
    }

    async fn finalize(
        &mut self,
        world: &dyn SimulationWorld,
        character: CharacterHandle,
        reason: &'static str,
    ) -> Result<MiningOutcome, RuntimeError> {
        self.completed_this_tick = true;
        let actual_products = match self.mode {
            MiningActivityMode::Incremental => {
                let mut map = HashMap::new();
                if self.count_progress > 0 {
                    map.insert(self.entity_name.clone(), self.count_progress);
                }
                map
            }
            MiningActivityMode::Deplete if self.is_stochastic => {
                let mut deltas = HashMap::new();
                if let Some(snapshot) = &self.start_inventory_snapshot {
                    for (item, before) in snapshot {
                        let after = world.inventory_count(character, item).await?;
                        let delta = after.saturating_sub(*before);
                        if delta > 0 {
                            deltas.insert(item.clone(), delta);
                        }
                    }
                }
                deltas
            }
            MiningActivityMode::Deplete => self.expected_products.clone().unwrap_or_default(),
        };

        world.set_mining_target(character, None).await?;
        world.set_selected_entity(character, None).await?;

        Ok(MiningOutcome {
            success: true,
            reason,
            actual_products,
        })
    }

    /// `stop_mining` (spec.md §4.3, §5 "Cancellation"). Actual products are
    /// whatever has been counted so far, per spec.md §4.3 "Finalization":
    /// "Incremental: {entity_name: count_progress} (works also for
    /// cancellation)".
    pub async fn cancel(
        &mut self,
        world: &dyn SimulationWorld,
        character: CharacterHandle,
    ) -> Result<MiningOutcome, RuntimeError> {
        self.completed_this_tick = true;
        let mut actual_products = HashMap::new();
        if self.count_progress > 0 {
            actual_products.insert(self.entity_name.clone(), self.count_progress);
        }
        world.set_mining_target(character, None).await?;
        world.set_selected_entity(character, None).await?;
        Ok(MiningOutcome {
            success: true,
            reason: "cancelled",
            actual_products,
        })
    }
}
