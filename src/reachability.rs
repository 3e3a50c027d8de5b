//! Reachability cache and snapshot service (spec.md §4.6).
//!
//! Every mutating action that targets a position or entity consults this
//! cache to validate reach before mutating anything (spec.md §4.1
//! "Pre-conditions"). The cache-with-explicit-dirty-flag shape follows the
//! teacher's `http_client_pool.rs` lazily-rebuilt connection pool: build on
//! first use or explicit invalidation, never a passive background TTL.

use crate::geometry::{Position, PositionKey};
use crate::simulation::{MapEntityRow, ResourceRow, SpatialQuery};
use std::collections::HashSet;

/// `{entities, resources}` sets of position keys within the agent's reach,
/// plus the bookkeeping needed to decide when a recompute is due (spec.md
/// §3 Agent data model).
#[derive(Debug, Clone, Default)]
pub struct ReachabilityCache {
    pub entities: HashSet<PositionKey>,
    pub resources: HashSet<PositionKey>,
    pub last_tick: u64,
    pub dirty: bool,
    last_position: Option<Position>,
}

impl ReachabilityCache {
    pub fn new() -> Self {
        Self {
            dirty: true,
            ..Default::default()
        }
    }

    /// Mark the cache stale. Invariant 5 (spec.md §3): a dirty cache must
    /// be recomputed before the next read.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Invalidate if the agent moved across `threshold` since the last
    /// recompute (spec.md §4.6).
    pub fn note_position(&mut self, position: Position, threshold: f64) {
        match self.last_position {
            Some(prev) if prev.distance(&position) < threshold => {}
            _ => self.mark_dirty(),
        }
        self.last_position = Some(position);
    }

    pub fn contains_entity(&self, key: &PositionKey) -> bool {
        self.entities.contains(key)
    }

    pub fn contains_resource(&self, key: &PositionKey) -> bool {
        self.resources.contains(key)
    }
}

/// Rich, per-entity serialization returned by a full snapshot query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EntitySnapshot {
    pub name: String,
    pub position: Position,
    pub status: Option<String>,
    pub recipe: Option<String>,
    pub is_ghost: bool,
}

/// Rich, per-resource serialization returned by a full snapshot query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResourceSnapshot {
    pub name: String,
    pub position: Position,
    pub amount: u32,
}

/// Full reachability snapshot: entities plus resources, as handed back to
/// a planner asking "what can I touch from here" (spec.md §4.6 "Full
/// snapshot").
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReachabilitySnapshot {
    pub entities: Vec<EntitySnapshot>,
    pub resources: Vec<ResourceSnapshot>,
}

/// Stateless service performing the recompute sweep and rich serialization
/// against an injected [`SpatialQuery`]. Holds no per-agent state itself —
/// callers own the [`ReachabilityCache`] and pass it in.
pub struct ReachabilityService<'a> {
    spatial: &'a dyn SpatialQuery,
}

impl<'a> ReachabilityService<'a> {
    pub fn new(spatial: &'a dyn SpatialQuery) -> Self {
        Self { spatial }
    }

    /// Recompute the keys-only cache using two concentric disks: resources
    /// within `resource_reach_distance`, everything else within
    /// `reach_distance` (spec.md §4.6 "Recomputation sweep"). Excludes the
    /// agent's own entity and names matching tree/stump naming conventions.
    pub async fn recompute(
        &self,
        cache: &mut ReachabilityCache,
        center: Position,
        reach_distance: f64,
        resource_reach_distance: f64,
        tick: u64,
    ) {
        let resources = self.spatial.resources_within(center, resource_reach_distance).await;
        let entities = self.spatial.entities_within(center, reach_distance, true).await;

        cache.resources = resources.iter().map(|r| r.position.key()).collect();
        cache.entities = entities
            .iter()
            .filter(|e| !is_tree_stump(&e.name))
            .map(|e| e.position.key())
            .collect();
        cache.last_tick = tick;
        cache.dirty = false;
    }

    /// Ensure the cache is fresh, recomputing if `dirty` (Invariant 5).
    pub async fn ensure_fresh(
        &self,
        cache: &mut ReachabilityCache,
        center: Position,
        reach_distance: f64,
        resource_reach_distance: f64,
        tick: u64,
    ) {
        if cache.dirty {
            self.recompute(cache, center, reach_distance, resource_reach_distance, tick)
                .await;
        }
    }

    /// Rich serialization of every reachable entity/resource (spec.md
    /// §4.6 "Full snapshot"). `include_ghosts` controls whether ghost
    /// entities are present (default is to include them).
    pub async fn snapshot(
        &self,
        center: Position,
        reach_distance: f64,
        resource_reach_distance: f64,
        include_ghosts: bool,
    ) -> ReachabilitySnapshot {
        let resources: Vec<ResourceRow> = self
            .spatial
            .resources_within(center, resource_reach_distance)
            .await;
        let entities: Vec<MapEntityRow> = self
            .spatial
            .entities_within(center, reach_distance, include_ghosts)
            .await;

        ReachabilitySnapshot {
            entities: entities
                .into_iter()
                .filter(|e| !is_tree_stump(&e.name))
                .map(|e| EntitySnapshot {
                    name: e.name,
                    position: e.position,
                    status: None,
                    recipe: None,
                    is_ghost: e.is_ghost,
                })
                .collect(),
            resources: resources
                .into_iter()
                .map(|r| ResourceSnapshot {
                    name: r.name,
                    position: r.position,
                    amount: r.amount,
                })
                .collect(),
        }
    }
}

/// Corpses matching tree/stump naming are excluded from the reachability
/// sweep (spec.md §4.6).
fn is_tree_stump(name: &str) -> bool {
    name.contains("tree-stump") || name.contains("dead-") && name.contains("tree")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{InMemorySpatialQuery, MapEntityRow, ResourceRow};
    use crate::geometry::CollisionBox;

    fn spatial() -> InMemorySpatialQuery {
        InMemorySpatialQuery::new()
            .with_resource(ResourceRow {
                position: Position::new(2.0, 0.0),
                name: "iron-ore".to_string(),
                amount: 500,
            })
            .with_entity(MapEntityRow {
                position: Position::new(1.0, 0.0),
                name: "stone-furnace".to_string(),
                collision_box: CollisionBox::new(2.0, 2.0),
                is_ghost: false,
            })
    }

    #[tokio::test]
    async fn recompute_populates_both_sets() {
        let spatial = spatial();
        let service = ReachabilityService::new(&spatial);
        let mut cache = ReachabilityCache::new();
        service
            .recompute(&mut cache, Position::new(0.0, 0.0), 3.0, 5.0, 10)
            .await;
        assert!(!cache.dirty);
        assert_eq!(cache.last_tick, 10);
        assert!(cache.contains_entity(&Position::new(1.0, 0.0).key()));
        assert!(cache.contains_resource(&Position::new(2.0, 0.0).key()));
    }

    #[tokio::test]
    async fn ensure_fresh_skips_recompute_when_clean() {
        let spatial = spatial();
        let service = ReachabilityService::new(&spatial);
        let mut cache = ReachabilityCache::new();
        service
            .recompute(&mut cache, Position::new(0.0, 0.0), 3.0, 5.0, 1)
            .await;
        service
            .ensure_fresh(&mut cache, Position::new(0.0, 0.0), 3.0, 5.0, 2)
            .await;
        // last_tick unchanged because the cache wasn't dirty.
        assert_eq!(cache.last_tick, 1);
    }

    #[test]
    fn note_position_marks_dirty_past_threshold() {
        let mut cache = ReachabilityCache::new();
        cache.dirty = false;
        cache.last_position = Some(Position::new(0.0, 0.0));
        cache.note_position(Position::new(0.2, 0.0), 1.0);
        assert!(!cache.dirty);
        cache.note_position(Position::new(5.0, 0.0), 1.0);
        assert!(cache.dirty);
    }
}
