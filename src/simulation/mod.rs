//! The boundary between this crate's agent runtime and the out-of-scope
//! simulation process (spec.md §1, §6): character/world access, the
//! pathfinder, and the read-only spatial analytical store.

pub mod handle;
pub mod pathfinder;
pub mod rcon;
pub mod spatial_query;

pub use handle::{CharacterHandle, EntityRef, MiningState, SimulationWorld};
pub use pathfinder::{PathOutcome, PathRequest, PathRequestId};
pub use rcon::{RconConnection, RconSimulationWorld};
pub use spatial_query::{InMemorySpatialQuery, MapEntityRow, ResourceRow, SpatialQuery, WaterTile};
