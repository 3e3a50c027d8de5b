//! Runtime: agent registry, per-agent action queues, the tick loop, and
//! completion delivery (spec.md §2 "Control flow", §5 "Concurrency &
//! Resource Model").
//!
//! Per-agent state is wrapped in a single `tokio::sync::Mutex` acquired for
//! the duration of one `tick()` call or one queue RPC call (SPEC_FULL.md
//! §5.1), mirroring the teacher's `Arc<RwLock<ToolRegistry>>` sharing
//! pattern (`cloudllm/mcp_server_builder.rs`).

use crate::agent::Agent;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::geometry::Position;
use crate::notify::{CompletionMessage, UdpNotifier};
use crate::placement;
use crate::prototypes::PrototypeTable;
use crate::queue::{ActionDispatcher, ActionQueue, CompletionRecord, EnqueueOutcome, QueueStatus};
use crate::reachability::ReachabilityService;
use crate::research::{self, ResearchState};
use crate::simulation::{CharacterHandle, EntityRef, SimulationWorld, SpatialQuery};
use async_trait::async_trait;
use log::info;
use std::collections::{BTreeMap, HashMap};

struct AgentSlot {
    agent: tokio::sync::Mutex<Agent>,
    queue: ActionQueue,
}

struct RuntimeState {
    agents: BTreeMap<u64, AgentSlot>,
    tick: u64,
    /// Per-team research queues (spec.md §9), keyed by team name. Team-
    /// scoped rather than agent-scoped, so it lives alongside the agent
    /// registry instead of inside any one `Agent`.
    research: tokio::sync::Mutex<HashMap<String, ResearchState>>,
}

/// Top-level handle wiring agents, the simulation seam, the spatial query
/// seam, and an optional UDP completion notifier (spec.md §2).
pub struct Runtime {
    world: Box<dyn SimulationWorld>,
    spatial: Box<dyn SpatialQuery>,
    prototypes: PrototypeTable,
    config: RuntimeConfig,
    notifier: Option<UdpNotifier>,
    state: tokio::sync::Mutex<RuntimeState>,
}

impl Runtime {
    pub fn new(world: Box<dyn SimulationWorld>, spatial: Box<dyn SpatialQuery>, prototypes: PrototypeTable, config: RuntimeConfig) -> Self {
        Self {
            world,
            spatial,
            prototypes,
            config,
            notifier: None,
            state: tokio::sync::Mutex::new(RuntimeState {
                agents: BTreeMap::new(),
                tick: 0,
                research: tokio::sync::Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn with_notifier(mut self, notifier: UdpNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Register a new agent (spec.md §3 "Lifecycles": "created with a seed
    /// position and team").
    pub async fn register_agent(&self, agent_id: u64, character: CharacterHandle, team: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.agents.insert(
            agent_id,
            AgentSlot {
                agent: tokio::sync::Mutex::new(Agent::new(agent_id, character, team)),
                queue: ActionQueue::new(self.config.default_max_queue_size),
            },
        );
        info!("registered agent {}", agent_id);
    }

    /// Tear down an agent: its activity records and pending queue entries
    /// are simply dropped (spec.md §3 "destroyed ... by explicit destroy").
    pub async fn remove_agent(&self, agent_id: u64) {
        let mut state = self.state.lock().await;
        state.agents.remove(&agent_id);
        info!("removed agent {}", agent_id);
    }

    fn missing_agent(agent_id: u64) -> RuntimeError {
        RuntimeError::invalid_parameter(format!("unknown agent {}", agent_id))
    }

    /// Single-action immediate dispatch (SPEC_FULL.md §6.1
    /// `Runtime::dispatch`), bypassing the queue entirely.
    pub async fn dispatch(&self, agent_id: u64, action_name: &str, params: &serde_json::Value) -> Result<serde_json::Value, RuntimeError> {
        let state = self.state.lock().await;
        let slot = state.agents.get(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        let dispatcher = AgentDispatcher {
            agent: &slot.agent,
            world: self.world.as_ref(),
            spatial: self.spatial.as_ref(),
            prototypes: &self.prototypes,
            research: &state.research,
            reachability_move_threshold: self.config.reachability_move_threshold,
            placement_cue_chunk_radius: self.config.placement_cue_chunk_radius,
            tick: state.tick,
        };
        dispatcher.dispatch(action_name, params).await
    }

    /// `enqueue` (spec.md §4.7, §6 "Queue RPC surface").
    #[allow(clippy::too_many_arguments)]
    pub async fn enqueue(
        &self,
        agent_id: u64,
        action_name: impl Into<String>,
        params: serde_json::Value,
        key: Option<String>,
        priority: i32,
        idempotency_key: Option<String>,
        correlation_id: Option<String>,
    ) -> Result<EnqueueOutcome, RuntimeError> {
        let mut state = self.state.lock().await;
        let tick = state.tick;
        let slot = state.agents.get_mut(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        let AgentSlot { agent, queue } = slot;
        let dispatcher = AgentDispatcher {
            agent,
            world: self.world.as_ref(),
            spatial: self.spatial.as_ref(),
            prototypes: &self.prototypes,
            research: &state.research,
            reachability_move_threshold: self.config.reachability_move_threshold,
            placement_cue_chunk_radius: self.config.placement_cue_chunk_radius,
            tick,
        };
        let outcome = queue
            .enqueue(&dispatcher, tick, action_name, params, key, priority, idempotency_key, correlation_id)
            .await;
        crate::queue::persistence::save(queue, &self.config.queue_persistence_path).await;
        Ok(outcome)
    }

    pub async fn process_all(&self, agent_id: u64) -> Result<u32, RuntimeError> {
        let mut state = self.state.lock().await;
        let tick = state.tick;
        let slot = state.agents.get_mut(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        let AgentSlot { agent, queue } = slot;
        let dispatcher = AgentDispatcher {
            agent,
            world: self.world.as_ref(),
            spatial: self.spatial.as_ref(),
            prototypes: &self.prototypes,
            research: &state.research,
            reachability_move_threshold: self.config.reachability_move_threshold,
            placement_cue_chunk_radius: self.config.placement_cue_chunk_radius,
            tick,
        };
        let count = queue.process_all(&dispatcher, tick).await;
        crate::queue::persistence::save(queue, &self.config.queue_persistence_path).await;
        Ok(count)
    }

    pub async fn process_some(&self, agent_id: u64, n: usize) -> Result<u32, RuntimeError> {
        let mut state = self.state.lock().await;
        let tick = state.tick;
        let slot = state.agents.get_mut(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        let AgentSlot { agent, queue } = slot;
        let dispatcher = AgentDispatcher {
            agent,
            world: self.world.as_ref(),
            spatial: self.spatial.as_ref(),
            prototypes: &self.prototypes,
            research: &state.research,
            reachability_move_threshold: self.config.reachability_move_threshold,
            placement_cue_chunk_radius: self.config.placement_cue_chunk_radius,
            tick,
        };
        let count = queue.process_some(n, &dispatcher, tick).await;
        crate::queue::persistence::save(queue, &self.config.queue_persistence_path).await;
        Ok(count)
    }

    pub async fn process_key(&self, agent_id: u64, key: &str) -> Result<u32, RuntimeError> {
        let mut state = self.state.lock().await;
        let tick = state.tick;
        let slot = state.agents.get_mut(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        let AgentSlot { agent, queue } = slot;
        let dispatcher = AgentDispatcher {
            agent,
            world: self.world.as_ref(),
            spatial: self.spatial.as_ref(),
            prototypes: &self.prototypes,
            research: &state.research,
            reachability_move_threshold: self.config.reachability_move_threshold,
            placement_cue_chunk_radius: self.config.placement_cue_chunk_radius,
            tick,
        };
        let count = queue.process_key(key, &dispatcher, tick).await;
        crate::queue::persistence::save(queue, &self.config.queue_persistence_path).await;
        Ok(count)
    }

    pub async fn get_result(&self, agent_id: u64, correlation_id: &str) -> Result<Option<CompletionRecord>, RuntimeError> {
        let state = self.state.lock().await;
        let slot = state.agents.get(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        Ok(slot.queue.get_result(correlation_id).cloned())
    }

    pub async fn get_and_clear_result(&self, agent_id: u64, correlation_id: &str) -> Result<Option<CompletionRecord>, RuntimeError> {
        let mut state = self.state.lock().await;
        let slot = state.agents.get_mut(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        let record = slot.queue.get_and_clear_result(correlation_id);
        crate::queue::persistence::save(&slot.queue, &self.config.queue_persistence_path).await;
        Ok(record)
    }

    pub async fn clear(&self, agent_id: u64, key: Option<&str>) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().await;
        let slot = state.agents.get_mut(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        slot.queue.clear(key);
        crate::queue::persistence::save(&slot.queue, &self.config.queue_persistence_path).await;
        Ok(())
    }

    pub async fn status(&self, agent_id: u64) -> Result<QueueStatus, RuntimeError> {
        let state = self.state.lock().await;
        let slot = state.agents.get(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        Ok(slot.queue.status())
    }

    pub async fn set_immediate_mode(&self, agent_id: u64, immediate: bool) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().await;
        let slot = state.agents.get_mut(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        slot.queue.set_immediate_mode(immediate);
        Ok(())
    }

    pub async fn set_max_queue_size(&self, agent_id: u64, size: usize) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().await;
        let slot = state.agents.get_mut(&agent_id).ok_or_else(|| Self::missing_agent(agent_id))?;
        slot.queue.set_max_queue_size(size);
        Ok(())
    }

    /// Advance every agent's activities by one tick, in ascending
    /// `agent_id` order (spec.md §5 "Ordering guarantees"), then flush
    /// completion messages over UDP (spec.md §4.8). Returns every message
    /// flushed this tick, so hosts without a notifier can still observe
    /// completions directly.
    pub async fn tick(&self) -> Result<Vec<CompletionMessage>, RuntimeError> {
        let mut state = self.state.lock().await;
        state.tick += 1;
        let tick = state.tick;
        let mut messages = Vec::new();
        for slot in state.agents.values_mut() {
            let mut agent = slot.agent.lock().await;
            agent.process_tick(self.world.as_ref(), tick).await?;
            messages.extend(agent.messages.drain());
        }
        if let Some(notifier) = &self.notifier {
            notifier.send_all(&messages).await;
        }
        Ok(messages)
    }
}

/// Executes one named action against one agent's locked state. The adapter
/// `ActionDispatcher` the action queue dispatches through (spec.md §6.1).
struct AgentDispatcher<'a> {
    agent: &'a tokio::sync::Mutex<Agent>,
    world: &'a dyn SimulationWorld,
    spatial: &'a dyn SpatialQuery,
    prototypes: &'a PrototypeTable,
    research: &'a tokio::sync::Mutex<HashMap<String, ResearchState>>,
    reachability_move_threshold: f64,
    placement_cue_chunk_radius: i32,
    tick: u64,
}

fn req_f64(params: &serde_json::Value, field: &str) -> Result<f64, RuntimeError> {
    params
        .get(field)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RuntimeError::invalid_parameter(format!("missing required parameter `{}`", field)))
}

fn req_u64(params: &serde_json::Value, field: &str) -> Result<u64, RuntimeError> {
    params
        .get(field)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RuntimeError::invalid_parameter(format!("missing required parameter `{}`", field)))
}

fn req_str<'a>(params: &'a serde_json::Value, field: &str) -> Result<&'a str, RuntimeError> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RuntimeError::invalid_parameter(format!("missing required parameter `{}`", field)))
}

#[async_trait]
impl<'a> ActionDispatcher for AgentDispatcher<'a> {
    async fn dispatch(&self, action_name: &str, params: &serde_json::Value) -> Result<serde_json::Value, RuntimeError> {
        let mut agent = self.agent.lock().await;

        match action_name {
            "walk_to" => {
                let goal = Position::new(req_f64(params, "x")?, req_f64(params, "y")?);
                let strict_goal = params.get("strict_goal").and_then(|v| v.as_bool()).unwrap_or(false);
                let action_id = agent.start_walking(self.world, self.tick, goal, None, strict_goal).await?;
                Ok(serde_json::json!({ "queued": true, "action_id": action_id, "tick": self.tick }))
            }
            "stop_walking" => {
                agent.stop_walking(self.world).await?;
                Ok(serde_json::json!({ "stopped": true }))
            }
            "mine" => {
                let entity = EntityRef(req_u64(params, "entity_id")?);
                let target_count = params.get("count").and_then(|v| v.as_u64()).map(|n| n as u32);
                let action_id = agent
                    .start_mining(self.world, self.prototypes, self.tick, entity, target_count, 1.0)
                    .await?;
                Ok(serde_json::json!({ "queued": true, "action_id": action_id, "tick": self.tick }))
            }
            "stop_mining" => {
                agent.stop_mining(self.world, self.tick).await?;
                Ok(serde_json::json!({ "stopped": true }))
            }
            "craft" => {
                let recipe = req_str(params, "recipe")?;
                let count = params.get("count").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
                let action_id = agent.start_crafting(self.world, self.prototypes, self.tick, recipe, count).await?;
                Ok(serde_json::json!({ "queued": true, "action_id": action_id, "tick": self.tick }))
            }
            "stop_crafting" => {
                let count = params.get("count").and_then(|v| v.as_u64()).map(|n| n as u32);
                agent.stop_crafting(self.world, self.tick, count).await?;
                Ok(serde_json::json!({ "stopped": true }))
            }
            "place_entity" => {
                let name = req_str(params, "name")?;
                let position = Position::new(req_f64(params, "x")?, req_f64(params, "y")?);
                let is_ghost = params.get("is_ghost").and_then(|v| v.as_bool()).unwrap_or(false);
                let result = placement::place_entity(self.world, self.prototypes, agent.character, name, position, is_ghost).await?;
                Ok(serde_json::json!({ "entity_id": result.entity.0, "position": result.position }))
            }
            "destroy_entity" => {
                let entity = EntityRef(req_u64(params, "entity_id")?);
                placement::destroy_entity(self.world, agent.character, entity).await?;
                Ok(serde_json::json!({ "destroyed": true }))
            }
            "transfer_to_entity" => {
                let entity = EntityRef(req_u64(params, "entity_id")?);
                let item = req_str(params, "item")?;
                let amount = req_u64(params, "amount")? as u32;
                let result = placement::transfer_to_entity(self.world, agent.character, entity, item, amount).await?;
                Ok(serde_json::json!({ "item": result.item, "amount": result.amount }))
            }
            "transfer_from_entity" => {
                let entity = EntityRef(req_u64(params, "entity_id")?);
                let item = req_str(params, "item")?;
                let amount = req_u64(params, "amount")? as u32;
                let result = placement::transfer_from_entity(self.world, agent.character, entity, item, amount).await?;
                Ok(serde_json::json!({ "item": result.item, "amount": result.amount }))
            }
            "placement_cues" => {
                let entity_name = req_str(params, "entity_name")?;
                let tile_step = params.get("tile_step").and_then(|v| v.as_f64()).unwrap_or(1.0);
                let center = self.world.character_position(agent.character).await?;
                let cues = placement::placement_cues(self.world, self.spatial, self.prototypes, agent.character, entity_name, center, tile_step, self.placement_cue_chunk_radius).await?;
                serde_json::to_value(cues).map_err(|e| RuntimeError::internal(e.to_string()))
            }
            "get_reachable" => {
                let include_ghosts = params.get("include_ghosts").and_then(|v| v.as_bool()).unwrap_or(true);
                let position = self.world.character_position(agent.character).await?;
                let reach = self.world.character_reach_distance(agent.character).await?;
                let resource_reach = self.world.character_resource_reach_distance(agent.character).await?;
                agent.reachability.note_position(position, self.reachability_move_threshold);
                let service = ReachabilityService::new(self.spatial);
                service.ensure_fresh(&mut agent.reachability, position, reach, resource_reach, self.tick).await;
                let snapshot = service.snapshot(position, reach, resource_reach, include_ghosts).await;
                serde_json::to_value(snapshot).map_err(|e| RuntimeError::internal(e.to_string()))
            }
            "enqueue_research" => {
                let technology = req_str(params, "technology")?;
                let team = self.world.character_team(agent.character).await?;
                let mut registry = self.research.lock().await;
                research::enqueue_research(&mut registry, self.prototypes, &team, technology)?;
                let state = research::status(&registry, &team);
                Ok(serde_json::json!({ "current": state.current, "queue": state.queue }))
            }
            "research_status" => {
                let team = self.world.character_team(agent.character).await?;
                let registry = self.research.lock().await;
                let state = research::status(&registry, &team);
                Ok(serde_json::json!({ "current": state.current, "queue": state.queue }))
            }
            other => Err(RuntimeError::invalid_parameter(format!("unknown action `{}`", other))),
        }
    }
}
