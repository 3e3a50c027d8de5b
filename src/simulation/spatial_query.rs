//! The read-only analytical-store query surface (spec.md §6 "Snapshot DB
//! query surface"). The store itself (tile/resource/entity snapshots) is
//! explicitly out of scope (spec.md §1); the core only needs to query it
//! through `ST_X`/`ST_Y`/`ST_Point`/`ST_Distance`/`ST_Intersects`/
//! `ST_Within`-shaped operations, modeled here as a small trait rather than
//! a concrete SQL client dependency.

use crate::geometry::{CollisionBox, Position};
use async_trait::async_trait;
use std::collections::HashMap;

/// A row-shaped description of a resource entity as the reachability
/// recompute sweep and placement-cue search need it.
#[derive(Debug, Clone)]
pub struct ResourceRow {
    pub position: Position,
    pub name: String,
    pub amount: u32,
}

/// A row-shaped description of any other map entity.
#[derive(Debug, Clone)]
pub struct MapEntityRow {
    pub position: Position,
    pub name: String,
    pub collision_box: CollisionBox,
    pub is_ghost: bool,
}

/// A single water tile, used by the "requires water" placement-cue sweep.
#[derive(Debug, Clone, Copy)]
pub struct WaterTile {
    pub position: Position,
}

/// Injected read-only handle to the spatial analytical store (spec.md
/// §6.2). Production wiring implements this against the real store;
/// `InMemorySpatialQuery` below backs integration tests.
#[async_trait]
pub trait SpatialQuery: Send + Sync {
    /// Resources within `radius` of `center` (`ST_Distance`/`ST_Within`).
    async fn resources_within(&self, center: Position, radius: f64) -> Vec<ResourceRow>;
    /// All other entities within `radius` of `center`, optionally
    /// including ghosts.
    async fn entities_within(&self, center: Position, radius: f64, include_ghosts: bool) -> Vec<MapEntityRow>;
    /// Water tiles within `radius` of `center` (`ST_Intersects` against the
    /// `water_tile` table).
    async fn water_within(&self, center: Position, radius: f64) -> Vec<WaterTile>;
}

/// A simple in-memory `SpatialQuery` for tests: entities/resources/water
/// tiles are just vectors scanned linearly. No PostGIS-shaped spatial
/// indexing; adequate for the handful of entities exercised by a test
/// scenario.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpatialQuery {
    pub resources: Vec<ResourceRow>,
    pub entities: Vec<MapEntityRow>,
    pub water: Vec<WaterTile>,
}

impl InMemorySpatialQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, row: ResourceRow) -> Self {
        self.resources.push(row);
        self
    }

    pub fn with_entity(mut self, row: MapEntityRow) -> Self {
        self.entities.push(row);
        self
    }
}

#[async_trait]
impl SpatialQuery for InMemorySpatialQuery {
    async fn resources_within(&self, center: Position, radius: f64) -> Vec<ResourceRow> {
        self.resources
            .iter()
            .filter(|r| r.position.distance(&center) <= radius)
            .cloned()
            .collect()
    }

    async fn entities_within(&self, center: Position, radius: f64, include_ghosts: bool) -> Vec<MapEntityRow> {
        self.entities
            .iter()
            .filter(|e| (include_ghosts || !e.is_ghost) && e.position.distance(&center) <= radius)
            .cloned()
            .collect()
    }

    async fn water_within(&self, center: Position, radius: f64) -> Vec<WaterTile> {
        self.water
            .iter()
            .filter(|w| w.position.distance(&center) <= radius)
            .cloned()
            .collect()
    }
}

/// Per-entity status snapshot shape, mirroring the `entity_status_latest`
/// view named in spec.md §6.
#[derive(Debug, Clone)]
pub struct EntityStatusSnapshot {
    pub status: String,
    pub recipe: Option<String>,
    pub inventories: HashMap<String, u32>,
    pub held_item: Option<String>,
    pub fuel_count: u32,
}
