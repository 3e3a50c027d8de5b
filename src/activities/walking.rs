//! Walking state machine (spec.md §4.2).
//!
//! Drives the embodied character from its current position to a target,
//! with an optional target entity whose collision box the stopping point
//! must clear. Modeled as an explicit state + transition function rather
//! than a language-level future, per the design note in spec.md §9.

use crate::error::{ErrorKind, RuntimeError};
use crate::geometry::{Direction, Position};
use crate::simulation::{CharacterHandle, EntityRef, PathOutcome, PathRequest, PathRequestId, SimulationWorld};

/// Squared distance under which a waypoint counts as reached (spec.md
/// §4.2 step 2: "≈ 0.25 tiles").
const WAYPOINT_EPSILON_SQ: f64 = 0.0625;

/// One in-flight walking activity (spec.md §3 Activity Records).
#[derive(Debug, Clone)]
pub struct WalkingActivity {
    pub action_id: String,
    pub start_tick: u64,
    /// The goal actually being pathfound to — may be a perimeter goal.
    pub goal: Position,
    /// The caller's original goal, preserved for the completion payload
    /// even when `goal` has been replaced by a perimeter goal.
    pub original_goal: Position,
    pub goal_entity: Option<EntityRef>,
    pub strict_goal: bool,
    pub path: Vec<Position>,
    pub progress_index: usize,
    pub last_distance_to_entity: Option<f64>,
    path_request: Option<PathRequestId>,
    /// Set by `process()` the tick a natural completion edge is detected,
    /// so a same-tick cancellation call can tell it lost the race (spec.md
    /// §9 open question).
    pub completed_this_tick: bool,
}

/// Outcome handed back to the runtime when a walking activity terminates,
/// naturally or by cancellation.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub success: bool,
    pub final_position: Position,
    pub goal: Position,
    pub elapsed_ticks: u64,
    pub reason: &'static str,
}

impl WalkingActivity {
    /// Begin walking toward `goal`, issuing the perimeter-goal adjustment
    /// (spec.md §4.2) and the single pathfinding request.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        world: &dyn SimulationWorld,
        character: CharacterHandle,
        action_id: String,
        tick: u64,
        goal: Position,
        goal_entity: Option<EntityRef>,
        strict_goal: bool,
    ) -> Result<WalkingActivity, RuntimeError> {
        let start_pos = world.character_position(character).await?;
        let team = world.character_team(character).await?;
        let collision_box = world.character_collision_box(character).await?;

        let mut effective_goal = goal;
        if let Some(occupant) = world.entity_at(goal, None).await? {
            if strict_goal {
                return Err(RuntimeError::entity_at_goal());
            }
            let target_box = world.entity_collision_box(occupant).await?;
            let target_center = world.entity_position(occupant).await?;
            let (ux, uy) = start_pos.unit_vector_to(&target_center);
            let offset = target_box.goal_radius() + collision_box.tile_width / 2.0 + 0.5;
            effective_goal = target_center.translate(-ux * offset, -uy * offset);
        }

        let request_id = world
            .request_path(PathRequest {
                from: start_pos,
                to: effective_goal,
                collision_box,
                team,
                entity_to_ignore: character.0,
            })
            .await?;

        Ok(WalkingActivity {
            action_id,
            start_tick: tick,
            goal: effective_goal,
            original_goal: goal,
            goal_entity,
            strict_goal,
            path: Vec::new(),
            progress_index: 0,
            last_distance_to_entity: None,
            path_request: Some(request_id),
            completed_this_tick: false,
        })
    }

    /// Advance the state machine by one tick (spec.md §4.2 "Following").
    /// Returns `Some(outcome)` the tick the walk terminates.
    pub async fn process(
        &mut self,
        world: &dyn SimulationWorld,
        character: CharacterHandle,
        tick: u64,
    ) -> Result<Option<WalkOutcome>, RuntimeError> {
        self.completed_this_tick = false;

        if let Some(request_id) = self.path_request {
            match world.poll_path(request_id).await {
                None => return Ok(None),
                Some(PathOutcome::Unreachable) => {
                    self.completed_this_tick = true;
                    return Ok(Some(self.finish(world, character, tick, false, "path_unreachable").await?));
                }
                Some(PathOutcome::Found(path)) => {
                    self.path = path;
                    self.progress_index = 0;
                    self.path_request = None;
                }
            }
        }

        let p = world.character_position(character).await?;

        if self.progress_index < self.path.len() {
            let w = self.path[self.progress_index];
            if p.distance_squared(&w) < WAYPOINT_EPSILON_SQ {
                self.progress_index += 1;
            }
        }

        if self.progress_index >= self.path.len() {
            if let Some(outcome) = self.evaluate_completion(world, character, p).await? {
                self.completed_this_tick = true;
                world.set_walking_direction(character, None).await?;
                return Ok(Some(outcome));
            }
            return Ok(None);
        }

        let w = self.path[self.progress_index];
        let bearing = (w.y - p.y).atan2(-(w.x - p.x));
        let direction = Direction::from_bearing(bearing);
        world.set_walking_direction(character, Some(direction)).await?;
        world.chart_chunk_at(character, w).await;

        let _ = tick;
        Ok(None)
    }

    /// spec.md §4.2 "Completion test".
    async fn evaluate_completion(
        &mut self,
        world: &dyn SimulationWorld,
        character: CharacterHandle,
        character_pos: Position,
    ) -> Result<Option<WalkOutcome>, RuntimeError> {
        let Some(entity) = self.goal_entity else {
            return Ok(Some(WalkResult::success(character_pos, self.original_goal)));
        };

        if !world.entity_valid(entity).await? {
            return Ok(Some(WalkResult::success(character_pos, self.original_goal)));
        }

        let entity_pos = world.entity_position(entity).await?;
        let reach = world.character_reach_distance(character).await?;
        let d = entity_pos.distance(&character_pos);

        if d <= reach {
            return Ok(Some(WalkResult::success(character_pos, self.original_goal)));
        }

        let decreasing = match self.last_distance_to_entity {
            Some(last) => d < last,
            None => true,
        };

        if !decreasing && d <= 2.0 * reach {
            // Anti-stuck safety: close enough and no longer approaching.
            return Ok(Some(WalkResult::success(character_pos, self.original_goal)));
        }

        if decreasing {
            self.last_distance_to_entity = Some(d);
            self.progress_index = self.progress_index.saturating_sub(1);
            return Ok(None);
        }

        // Not decreasing and still farther than 2x reach: force-complete to
        // avoid an infinite loop (spec.md §4.2).
        Ok(Some(WalkResult::failure(character_pos, self.original_goal)))
    }

    async fn finish(
        &self,
        world: &dyn SimulationWorld,
        character: CharacterHandle,
        _tick: u64,
        success: bool,
        reason: &'static str,
    ) -> Result<WalkOutcome, RuntimeError> {
        let position = world.character_position(character).await?;
        world.set_walking_direction(character, None).await?;
        Ok(WalkOutcome {
            success,
            final_position: position,
            goal: self.original_goal,
            elapsed_ticks: 0,
            reason,
        })
    }
}

/// Internal helper constructing the two common completion shapes; kept
/// private so `evaluate_completion` reads declaratively.
struct WalkResult;
impl WalkResult {
    fn success(position: Position, goal: Position) -> WalkOutcome {
        WalkOutcome {
            success: true,
            final_position: position,
            goal,
            elapsed_ticks: 0,
            reason: "completed",
        }
    }
    fn failure(position: Position, goal: Position) -> WalkOutcome {
        WalkOutcome {
            success: false,
            final_position: position,
            goal,
            elapsed_ticks: 0,
            reason: "path_stuck",
        }
    }
}

/// `stop_walking` (spec.md §4.2 "Cancellation"): clears the record and
/// halts the walking state without emitting a completion message — the
/// caller gets a synchronous result instead.
pub async fn cancel(world: &dyn SimulationWorld, character: CharacterHandle) -> Result<(), RuntimeError> {
    world.set_walking_direction(character, None).await
}

/// Convert a `PathUnreachable`/stuck outcome into the structured error
/// carried by a failed completion payload, per spec.md §7.
pub fn outcome_error(outcome: &WalkOutcome) -> Option<RuntimeError> {
    if outcome.success {
        return None;
    }
    Some(match outcome.reason {
        "path_unreachable" => RuntimeError::path_unreachable(),
        _ => RuntimeError::path_stuck(),
    })
}

#[allow(dead_code)]
fn _kind_check(_k: ErrorKind) {}
