//! Per-agent state record (spec.md §3 "Agent"): the embodied character
//! handle, the three mutually-exclusive activity slots, the outbound
//! message buffer, the reachability cache, and the set of charted chunks.
//!
//! `Agent` owns the exclusivity rules between walking/mining/crafting
//! (spec.md §3 Invariants 1-2) and the queued-vs-completion message split
//! (spec.md §4.8): every start method installs an activity record and
//! buffers a `queued` message; every per-tick `process_*` call drains a
//! terminated activity into a buffered `completed`/`cancelled`/`failed`/
//! `depleted` message.

use crate::activities::{CraftOutcome, CraftingActivity, MiningActivity, MiningOutcome, WalkOutcome, WalkingActivity};
use crate::error::RuntimeError;
use crate::geometry::Position;
use crate::notify::{CompletionMessage, CompletionStatus, MessageBuffer};
use crate::reachability::ReachabilityCache;
use crate::simulation::{CharacterHandle, EntityRef, SimulationWorld};
use std::collections::HashSet;

/// One embodied agent under this runtime's control (spec.md §3).
pub struct Agent {
    pub agent_id: u64,
    pub character: CharacterHandle,
    pub team: String,
    pub walking: Option<WalkingActivity>,
    pub mining: Option<MiningActivity>,
    pub crafting: Option<CraftingActivity>,
    pub messages: MessageBuffer,
    pub reachability: ReachabilityCache,
    /// Chunk coordinates this agent has charted, per spec.md §3: "a set of
    /// charted chunk coordinates".
    pub charted_chunks: HashSet<(i32, i32)>,
}

impl Agent {
    pub fn new(agent_id: u64, character: CharacterHandle, team: impl Into<String>) -> Self {
        Self {
            agent_id,
            character,
            team: team.into(),
            walking: None,
            mining: None,
            crafting: None,
            messages: MessageBuffer::new(),
            reachability: ReachabilityCache::new(),
            charted_chunks: HashSet::new(),
        }
    }

    pub fn note_charted_chunk(&mut self, position: Position, chunk_size: f64) {
        let cx = (position.x / chunk_size).floor() as i32;
        let cy = (position.y / chunk_size).floor() as i32;
        self.charted_chunks.insert((cx, cy));
    }

    fn push(&mut self, action_type: &str, start_tick: u64, completion_tick: u64, status: CompletionStatus, success: bool, result: serde_json::Value) -> String {
        let action_id = uuid::Uuid::new_v4().to_string();
        self.messages.enqueue(CompletionMessage {
            action_id: action_id.clone(),
            agent_id: self.agent_id,
            action_type: action_type.to_string(),
            start_tick,
            completion_tick,
            success,
            status,
            result,
        });
        action_id
    }

    fn push_with_id(&mut self, action_id: &str, action_type: &str, start_tick: u64, completion_tick: u64, status: CompletionStatus, success: bool, result: serde_json::Value) {
        self.messages.enqueue(CompletionMessage {
            action_id: action_id.to_string(),
            agent_id: self.agent_id,
            action_type: action_type.to_string(),
            start_tick,
            completion_tick,
            success,
            status,
            result,
        });
    }

    /// `walk_to` (spec.md §4.1, §4.2). Mutually exclusive with mining
    /// (Invariant 1): an in-flight mine is cancelled first, with its own
    /// completion message buffered.
    pub async fn start_walking(
        &mut self,
        world: &dyn SimulationWorld,
        tick: u64,
        goal: Position,
        goal_entity: Option<EntityRef>,
        strict_goal: bool,
    ) -> Result<String, RuntimeError> {
        if let Some(mut mining) = self.mining.take() {
            let outcome = mining.cancel(world, self.character).await?;
            self.push_with_id(
                &mining.action_id,
                "mine",
                mining.start_tick,
                tick,
                CompletionStatus::Cancelled,
                outcome.success,
                mining_result(&outcome),
            );
        }
        if let Some(walking) = self.walking.take() {
            crate::activities::walking::cancel(world, self.character).await.ok();
            let _ = walking;
        }

        let action_id = uuid::Uuid::new_v4().to_string();
        let activity = WalkingActivity::start(world, self.character, action_id.clone(), tick, goal, goal_entity, strict_goal).await?;
        self.walking = Some(activity);
        self.push_with_id(
            &action_id,
            "walk_to",
            tick,
            tick,
            CompletionStatus::Queued,
            true,
            serde_json::json!({ "goal": goal }),
        );
        Ok(action_id)
    }

    /// `stop_walking` (spec.md §4.2 "Cancellation"): no completion message
    /// is emitted, matching the walking-specific suppression spec.md calls
    /// out by name.
    pub async fn stop_walking(&mut self, world: &dyn SimulationWorld) -> Result<(), RuntimeError> {
        if self.walking.take().is_some() {
            crate::activities::walking::cancel(world, self.character).await?;
        }
        Ok(())
    }

    /// Advance the in-flight walk by one tick, buffering its completion
    /// message if it terminates this tick.
    pub async fn process_walking(&mut self, world: &dyn SimulationWorld, tick: u64) -> Result<(), RuntimeError> {
        let Some(activity) = self.walking.as_mut() else {
            return Ok(());
        };
        let start_tick = activity.start_tick;
        let action_id = activity.action_id.clone();
        if let Some(outcome) = activity.process(world, self.character, tick).await? {
            self.walking = None;
            let status = if outcome.success { CompletionStatus::Completed } else { CompletionStatus::Failed };
            self.push_with_id(&action_id, "walk_to", start_tick, tick, status, outcome.success, walk_result(&outcome));
        }
        Ok(())
    }

    /// `mine` (spec.md §4.1, §4.3). Mutually exclusive with walking
    /// (Invariant 1).
    pub async fn start_mining(
        &mut self,
        world: &dyn SimulationWorld,
        prototypes: &crate::prototypes::PrototypeTable,
        tick: u64,
        target: EntityRef,
        target_count: Option<u32>,
        effective_mining_speed: f64,
    ) -> Result<String, RuntimeError> {
        if let Some(walking) = self.walking.take() {
            crate::activities::walking::cancel(world, self.character).await.ok();
            let _ = walking;
        }
        if let Some(mut mining) = self.mining.take() {
            let outcome = mining.cancel(world, self.character).await?;
            self.push_with_id(
                &mining.action_id,
                "mine",
                mining.start_tick,
                tick,
                CompletionStatus::Cancelled,
                outcome.success,
                mining_result(&outcome),
            );
        }

        let action_id = uuid::Uuid::new_v4().to_string();
        let activity = MiningActivity::start(world, prototypes, self.character, action_id.clone(), tick, target, target_count, effective_mining_speed).await?;
        self.mining = Some(activity);
        self.push_with_id(&action_id, "mine", tick, tick, CompletionStatus::Queued, true, serde_json::json!({ "target_count": target_count }));
        Ok(action_id)
    }

    pub async fn stop_mining(&mut self, world: &dyn SimulationWorld, tick: u64) -> Result<(), RuntimeError> {
        if let Some(mut mining) = self.mining.take() {
            let outcome = mining.cancel(world, self.character).await?;
            self.push_with_id(
                &mining.action_id,
                "mine",
                mining.start_tick,
                tick,
                CompletionStatus::Cancelled,
                outcome.success,
                mining_result(&outcome),
            );
        }
        Ok(())
    }

    pub async fn process_mining(&mut self, world: &dyn SimulationWorld, tick: u64) -> Result<(), RuntimeError> {
        let Some(activity) = self.mining.as_mut() else {
            return Ok(());
        };
        let start_tick = activity.start_tick;
        let action_id = activity.action_id.clone();
        if let Some(outcome) = activity.process(world, self.character).await? {
            self.mining = None;
            let status = if outcome.reason == "depleted" { CompletionStatus::Depleted } else { CompletionStatus::Completed };
            self.push_with_id(&action_id, "mine", start_tick, tick, status, outcome.success, mining_result(&outcome));
        }
        Ok(())
    }

    /// `craft` (spec.md §4.1, §4.4). Only a stochastic mining activity
    /// conflicts with crafting (Invariant 2); walking and non-stochastic
    /// mining coexist freely.
    pub async fn start_crafting(
        &mut self,
        world: &dyn SimulationWorld,
        prototypes: &crate::prototypes::PrototypeTable,
        tick: u64,
        recipe: &str,
        count: u32,
    ) -> Result<String, RuntimeError> {
        if let Some(mining) = &self.mining {
            if mining.is_stochastic {
                return Err(RuntimeError::exclusivity_conflict(format!(
                    "cannot craft while mining stochastic entity {}",
                    mining.entity_name
                )));
            }
        }
        if self.crafting.is_some() {
            return Err(RuntimeError::exclusivity_conflict("a crafting activity is already in progress"));
        }

        let action_id = uuid::Uuid::new_v4().to_string();
        let activity = CraftingActivity::start(world, prototypes, self.character, action_id.clone(), tick, recipe, count).await?;
        self.crafting = Some(activity);
        self.push_with_id(
            &action_id,
            "craft",
            tick,
            tick,
            CompletionStatus::Queued,
            true,
            serde_json::json!({ "recipe": recipe, "count": count }),
        );
        Ok(action_id)
    }

    pub async fn stop_crafting(&mut self, world: &dyn SimulationWorld, tick: u64, count: Option<u32>) -> Result<(), RuntimeError> {
        if let Some(mut crafting) = self.crafting.take() {
            let outcome = crafting.cancel(world, self.character, count).await?;
            self.push_with_id(
                &crafting.action_id,
                "craft",
                crafting.start_tick,
                tick,
                CompletionStatus::Cancelled,
                outcome.success,
                craft_result(&outcome),
            );
        }
        Ok(())
    }

    pub async fn process_crafting(&mut self, world: &dyn SimulationWorld, tick: u64) -> Result<(), RuntimeError> {
        let Some(activity) = self.crafting.as_mut() else {
            return Ok(());
        };
        let start_tick = activity.start_tick;
        let action_id = activity.action_id.clone();
        if let Some(outcome) = activity.process(world, self.character).await? {
            self.crafting = None;
            self.push_with_id(&action_id, "craft", start_tick, tick, CompletionStatus::Completed, outcome.success, craft_result(&outcome));
        }
        Ok(())
    }

    /// Advance every in-flight activity by one tick, in the fixed order
    /// walking, then mining, then crafting (spec.md §5 "Per-tick
    /// processing order").
    pub async fn process_tick(&mut self, world: &dyn SimulationWorld, tick: u64) -> Result<(), RuntimeError> {
        self.process_walking(world, tick).await?;
        self.process_mining(world, tick).await?;
        self.process_crafting(world, tick).await?;
        Ok(())
    }
}

fn walk_result(outcome: &WalkOutcome) -> serde_json::Value {
    serde_json::json!({
        "final_position": outcome.final_position,
        "goal": outcome.goal,
        "reason": outcome.reason,
    })
}

fn mining_result(outcome: &MiningOutcome) -> serde_json::Value {
    serde_json::json!({
        "reason": outcome.reason,
        "actual_products": outcome.actual_products,
    })
}

fn craft_result(outcome: &CraftOutcome) -> serde_json::Value {
    serde_json::json!({
        "reason": outcome.reason,
        "count_crafted": outcome.count_crafted,
        "actual_products": outcome.actual_products,
    })
}
