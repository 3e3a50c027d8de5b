//! A concrete [`SimulationWorld`] backed by the simulation's RCON command
//! channel (spec.md §1: "via its RCON command channel and a UDP
//! side-channel").
//!
//! The wire protocol is the Source/Factorio RCON framing: a 4-byte
//! little-endian length prefix, a request id, a packet type, a
//! NUL-terminated body, and a trailing empty NUL-terminated string.
//! Authentication is a single `SERVERDATA_AUTH` round trip; every
//! subsequent command is a `SERVERDATA_EXECCOMMAND` whose body is a Lua
//! `/sc` snippet that calls into the companion mod's `remote.call`
//! interface and prints a JSON-encoded result via `rcon.print`, mirroring
//! the connection-reuse shape of the teacher's `http_client_pool.rs`
//! (one long-lived connection, request/response correlated by id, not
//! per-call dialing).

use crate::error::RuntimeError;
use crate::geometry::{CollisionBox, Direction, Position};
use crate::simulation::handle::{CharacterHandle, EntityRef, MiningState, SimulationWorld};
use crate::simulation::pathfinder::{PathOutcome, PathRequest, PathRequestId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

const PACKET_AUTH: i32 = 3;
const PACKET_AUTH_RESPONSE: i32 = 2;
const PACKET_EXEC_COMMAND: i32 = 2;

fn io_err(err: std::io::Error) -> RuntimeError {
    RuntimeError::internal(format!("rcon io error: {}", err))
}

struct RconPacket {
    id: i32,
    kind: i32,
    body: String,
}

async fn write_packet(stream: &mut TcpStream, id: i32, kind: i32, body: &str) -> Result<(), RuntimeError> {
    let mut payload = Vec::with_capacity(body.len() + 2);
    payload.extend_from_slice(body.as_bytes());
    payload.push(0);
    payload.push(0);
    let size = (payload.len() + 8) as i32;

    let mut frame = Vec::with_capacity(payload.len() + 12);
    frame.extend_from_slice(&size.to_le_bytes());
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(&kind.to_le_bytes());
    frame.extend_from_slice(&payload);

    stream.write_all(&frame).await.map_err(io_err)
}

async fn read_packet(stream: &mut TcpStream) -> Result<RconPacket, RuntimeError> {
    let mut size_buf = [0u8; 4];
    stream.read_exact(&mut size_buf).await.map_err(io_err)?;
    let size = i32::from_le_bytes(size_buf);
    if size < 10 {
        return Err(RuntimeError::internal("rcon packet shorter than minimum framing"));
    }

    let mut rest = vec![0u8; size as usize];
    stream.read_exact(&mut rest).await.map_err(io_err)?;

    let id = i32::from_le_bytes(rest[0..4].try_into().unwrap());
    let kind = i32::from_le_bytes(rest[4..8].try_into().unwrap());
    let body_bytes = &rest[8..rest.len() - 2];
    let body = String::from_utf8_lossy(body_bytes).into_owned();

    Ok(RconPacket { id, kind, body })
}

/// A single authenticated RCON connection plus a monotonic request-id
/// counter, guarded by a mutex so concurrent `SimulationWorld` calls from
/// different activities serialize onto one socket (spec.md §5:
/// "the simulation's world" is the one piece of shared mutable state
/// outside the tick loop's own locking).
pub struct RconConnection {
    stream: Mutex<TcpStream>,
    next_id: AtomicI32,
}

impl RconConnection {
    pub async fn connect(addr: &str, password: &str) -> Result<Self, RuntimeError> {
        let mut stream = TcpStream::connect(addr).await.map_err(io_err)?;
        write_packet(&mut stream, 1, PACKET_AUTH, password).await?;
        let response = read_packet(&mut stream).await?;
        if response.kind != PACKET_AUTH_RESPONSE || response.id == -1 {
            return Err(RuntimeError::internal("rcon authentication rejected"));
        }
        Ok(Self {
            stream: Mutex::new(stream),
            next_id: AtomicI32::new(2),
        })
    }

    /// Send one `/sc` command and return its printed body.
    pub async fn command(&self, body: &str) -> Result<String, RuntimeError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stream = self.stream.lock().await;
        write_packet(&mut stream, id, PACKET_EXEC_COMMAND, body).await?;
        let response = read_packet(&mut stream).await?;
        Ok(response.body)
    }

    /// Call into the companion mod's `remote.call("agent_runtime", fn,
    /// json_args)` interface and parse the JSON result it prints.
    async fn call(&self, function: &str, args: &serde_json::Value) -> Result<serde_json::Value, RuntimeError> {
        let lua = format!(
            "/sc rcon.print(game.table_to_json(remote.call('agent_runtime', '{}', '{}')))",
            function,
            args.to_string().replace('\'', "\\'")
        );
        let body = self.command(&lua).await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RuntimeError::internal(format!("malformed rcon response for {}: {}", function, e)))
    }
}

/// [`SimulationWorld`] implementation that forwards every call over one
/// [`RconConnection`]. The companion Lua mod exposes matching
/// `remote.call` entry points; this struct only owns wire formatting and
/// JSON (de)serialization.
pub struct RconSimulationWorld {
    connection: RconConnection,
}

impl RconSimulationWorld {
    pub async fn connect(addr: &str, password: &str) -> Result<Self, RuntimeError> {
        Ok(Self {
            connection: RconConnection::connect(addr, password).await?,
        })
    }

    fn field_f64(value: &serde_json::Value, field: &str) -> Result<f64, RuntimeError> {
        value
            .get(field)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| RuntimeError::internal(format!("rcon response missing `{}`", field)))
    }

    fn field_str(value: &serde_json::Value, field: &str) -> Result<String, RuntimeError> {
        value
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| RuntimeError::internal(format!("rcon response missing `{}`", field)))
    }

    fn field_bool(value: &serde_json::Value, field: &str) -> Result<bool, RuntimeError> {
        value
            .get(field)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| RuntimeError::internal(format!("rcon response missing `{}`", field)))
    }

    fn field_u64(value: &serde_json::Value, field: &str) -> Result<u64, RuntimeError> {
        value
            .get(field)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| RuntimeError::internal(format!("rcon response missing `{}`", field)))
    }

    fn position_of(value: &serde_json::Value) -> Result<Position, RuntimeError> {
        Ok(Position::new(Self::field_f64(value, "x")?, Self::field_f64(value, "y")?))
    }

    fn collision_box_of(value: &serde_json::Value) -> Result<CollisionBox, RuntimeError> {
        Ok(CollisionBox::new(Self::field_f64(value, "width")?, Self::field_f64(value, "height")?))
    }
}

#[async_trait]
impl SimulationWorld for RconSimulationWorld {
    async fn character_position(&self, character: CharacterHandle) -> Result<Position, RuntimeError> {
        let result = self.connection.call("character_position", &serde_json::json!({ "character": character.0 })).await?;
        Self::position_of(&result)
    }

    async fn character_team(&self, character: CharacterHandle) -> Result<String, RuntimeError> {
        let result = self.connection.call("character_team", &serde_json::json!({ "character": character.0 })).await?;
        Self::field_str(&result, "team")
    }

    async fn character_reach_distance(&self, character: CharacterHandle) -> Result<f64, RuntimeError> {
        let result = self.connection.call("character_reach_distance", &serde_json::json!({ "character": character.0 })).await?;
        Self::field_f64(&result, "reach_distance")
    }

    async fn character_resource_reach_distance(&self, character: CharacterHandle) -> Result<f64, RuntimeError> {
        let result = self
            .connection
            .call("character_resource_reach_distance", &serde_json::json!({ "character": character.0 }))
            .await?;
        Self::field_f64(&result, "resource_reach_distance")
    }

    async fn character_collision_box(&self, character: CharacterHandle) -> Result<CollisionBox, RuntimeError> {
        let result = self.connection.call("character_collision_box", &serde_json::json!({ "character": character.0 })).await?;
        Self::collision_box_of(&result)
    }

    async fn inventory_count(&self, character: CharacterHandle, item: &str) -> Result<u32, RuntimeError> {
        let result = self
            .connection
            .call("inventory_count", &serde_json::json!({ "character": character.0, "item": item }))
            .await?;
        Ok(Self::field_u64(&result, "count")? as u32)
    }

    async fn inventory_add(&self, character: CharacterHandle, item: &str, amount: u32) -> Result<(), RuntimeError> {
        self.connection
            .call("inventory_add", &serde_json::json!({ "character": character.0, "item": item, "amount": amount }))
            .await?;
        Ok(())
    }

    async fn inventory_remove(&self, character: CharacterHandle, item: &str, amount: u32) -> Result<(), RuntimeError> {
        self.connection
            .call("inventory_remove", &serde_json::json!({ "character": character.0, "item": item, "amount": amount }))
            .await?;
        Ok(())
    }

    async fn request_path(&self, request: PathRequest) -> Result<PathRequestId, RuntimeError> {
        let result = self
            .connection
            .call(
                "request_path",
                &serde_json::json!({
                    "from": { "x": request.from.x, "y": request.from.y },
                    "to": { "x": request.to.x, "y": request.to.y },
                    "width": request.collision_box.width,
                    "height": request.collision_box.height,
                    "team": request.team,
                    "entity_to_ignore": request.entity_to_ignore,
                }),
            )
            .await?;
        Ok(PathRequestId(Self::field_u64(&result, "request_id")?))
    }

    async fn poll_path(&self, request_id: PathRequestId) -> Option<PathOutcome> {
        let result = self.connection.call("poll_path", &serde_json::json!({ "request_id": request_id.0 })).await.ok()?;
        if result.is_null() {
            return None;
        }
        if Self::field_bool(&result, "found").unwrap_or(false) {
            let waypoints = result.get("waypoints")?.as_array()?;
            let positions = waypoints.iter().filter_map(Self::position_of_opt).collect();
            Some(PathOutcome::Found(positions))
        } else {
            Some(PathOutcome::Unreachable)
        }
    }

    async fn set_walking_direction(&self, character: CharacterHandle, direction: Option<Direction>) -> Result<(), RuntimeError> {
        self.connection
            .call(
                "set_walking_direction",
                &serde_json::json!({ "character": character.0, "direction": direction }),
            )
            .await?;
        Ok(())
    }

    async fn chart_chunk_at(&self, character: CharacterHandle, position: Position) {
        let _ = self
            .connection
            .call("chart_chunk_at", &serde_json::json!({ "character": character.0, "x": position.x, "y": position.y }))
            .await;
    }

    async fn entity_at(&self, position: Position, name_hint: Option<&str>) -> Result<Option<EntityRef>, RuntimeError> {
        let result = self
            .connection
            .call("entity_at", &serde_json::json!({ "x": position.x, "y": position.y, "name": name_hint }))
            .await?;
        if result.is_null() {
            Ok(None)
        } else {
            Ok(Some(EntityRef(Self::field_u64(&result, "entity_id")?)))
        }
    }

    async fn entity_valid(&self, entity: EntityRef) -> Result<bool, RuntimeError> {
        let result = self.connection.call("entity_valid", &serde_json::json!({ "entity_id": entity.0 })).await?;
        Self::field_bool(&result, "valid")
    }

    async fn entity_name(&self, entity: EntityRef) -> Result<String, RuntimeError> {
        let result = self.connection.call("entity_name", &serde_json::json!({ "entity_id": entity.0 })).await?;
        Self::field_str(&result, "name")
    }

    async fn entity_position(&self, entity: EntityRef) -> Result<Position, RuntimeError> {
        let result = self.connection.call("entity_position", &serde_json::json!({ "entity_id": entity.0 })).await?;
        Self::position_of(&result)
    }

    async fn entity_collision_box(&self, entity: EntityRef) -> Result<CollisionBox, RuntimeError> {
        let result = self.connection.call("entity_collision_box", &serde_json::json!({ "entity_id": entity.0 })).await?;
        Self::collision_box_of(&result)
    }

    async fn set_mining_target(&self, character: CharacterHandle, target: Option<EntityRef>) -> Result<(), RuntimeError> {
        self.connection
            .call("set_mining_target", &serde_json::json!({ "character": character.0, "entity_id": target.map(|e| e.0) }))
            .await?;
        Ok(())
    }

    async fn mining_state(&self, character: CharacterHandle) -> Result<MiningState, RuntimeError> {
        let result = self.connection.call("mining_state", &serde_json::json!({ "character": character.0 })).await?;
        Ok(MiningState {
            mining: Self::field_bool(&result, "mining")?,
            progress: Self::field_f64(&result, "progress")?,
        })
    }

    async fn set_selected_entity(&self, character: CharacterHandle, entity: Option<EntityRef>) -> Result<(), RuntimeError> {
        self.connection
            .call("set_selected_entity", &serde_json::json!({ "character": character.0, "entity_id": entity.map(|e| e.0) }))
            .await?;
        Ok(())
    }

    async fn selected_entity_valid(&self, character: CharacterHandle) -> Result<bool, RuntimeError> {
        let result = self.connection.call("selected_entity_valid", &serde_json::json!({ "character": character.0 })).await?;
        Self::field_bool(&result, "valid")
    }

    async fn crafting_queue_size(&self, character: CharacterHandle) -> Result<u32, RuntimeError> {
        let result = self.connection.call("crafting_queue_size", &serde_json::json!({ "character": character.0 })).await?;
        Ok(Self::field_u64(&result, "size")? as u32)
    }

    async fn crafting_queue_progress(&self, character: CharacterHandle) -> Result<f64, RuntimeError> {
        let result = self.connection.call("crafting_queue_progress", &serde_json::json!({ "character": character.0 })).await?;
        Self::field_f64(&result, "progress")
    }

    async fn craft_begin(&self, character: CharacterHandle, recipe: &str, count: u32) -> Result<u32, RuntimeError> {
        let result = self
            .connection
            .call("craft_begin", &serde_json::json!({ "character": character.0, "recipe": recipe, "count": count }))
            .await?;
        Ok(Self::field_u64(&result, "queued")? as u32)
    }

    async fn craft_cancel(&self, character: CharacterHandle, recipe: &str, count: Option<u32>) -> Result<u32, RuntimeError> {
        let result = self
            .connection
            .call("craft_cancel", &serde_json::json!({ "character": character.0, "recipe": recipe, "count": count }))
            .await?;
        Ok(Self::field_u64(&result, "cancelled")? as u32)
    }

    async fn create_entity(&self, character: CharacterHandle, name: &str, position: Position, is_ghost: bool) -> Result<EntityRef, RuntimeError> {
        let result = self
            .connection
            .call(
                "create_entity",
                &serde_json::json!({ "character": character.0, "name": name, "x": position.x, "y": position.y, "ghost": is_ghost }),
            )
            .await?;
        Ok(EntityRef(Self::field_u64(&result, "entity_id")?))
    }

    async fn destroy_entity(&self, entity: EntityRef) -> Result<(), RuntimeError> {
        self.connection.call("destroy_entity", &serde_json::json!({ "entity_id": entity.0 })).await?;
        Ok(())
    }

    async fn entity_inventory_count(&self, entity: EntityRef, item: &str) -> Result<u32, RuntimeError> {
        let result = self
            .connection
            .call("entity_inventory_count", &serde_json::json!({ "entity_id": entity.0, "item": item }))
            .await?;
        Ok(Self::field_u64(&result, "count")? as u32)
    }

    async fn entity_inventory_insert(&self, entity: EntityRef, item: &str, amount: u32) -> Result<u32, RuntimeError> {
        let result = self
            .connection
            .call("entity_inventory_insert", &serde_json::json!({ "entity_id": entity.0, "item": item, "amount": amount }))
            .await?;
        Ok(Self::field_u64(&result, "accepted")? as u32)
    }

    async fn entity_inventory_remove(&self, entity: EntityRef, item: &str, amount: u32) -> Result<u32, RuntimeError> {
        let result = self
            .connection
            .call("entity_inventory_remove", &serde_json::json!({ "entity_id": entity.0, "item": item, "amount": amount }))
            .await?;
        Ok(Self::field_u64(&result, "removed")? as u32)
    }

    async fn notify_entity_changed(&self, entity: EntityRef) {
        let _ = self.connection.call("notify_entity_changed", &serde_json::json!({ "entity_id": entity.0 })).await;
    }
}

impl RconSimulationWorld {
    fn position_of_opt(value: &serde_json::Value) -> Option<Position> {
        Some(Position::new(value.get("x")?.as_f64()?, value.get("y")?.as_f64()?))
    }
}
