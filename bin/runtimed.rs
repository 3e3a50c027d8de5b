//! Thin process entry point wiring a [`Runtime`] to a live RCON-backed
//! simulation and a fixed-interval tick source. Mirrors the teacher's own
//! daemon binaries (e.g. `mentisdbd`): construct the library's top-level
//! handle, call `env_logger::init()`, and drive a loop — no behavior of
//! its own.
//!
//! The spatial analytical store (§6 "Snapshot DB query surface") is out of
//! scope for this crate (spec.md §1); this binary wires an in-memory
//! double rather than a real connection, since no database client crate
//! was carried from the teacher's dependency stack for it (see
//! DESIGN.md).

use embodied_agent_runtime::config::RuntimeConfig;
use embodied_agent_runtime::prototypes::PrototypeTable;
use embodied_agent_runtime::runtime::Runtime;
use embodied_agent_runtime::simulation::{InMemorySpatialQuery, RconSimulationWorld};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let rcon_addr = env::var("AGENT_RUNTIME_RCON_ADDR").unwrap_or_else(|_| "127.0.0.1:27015".to_string());
    let rcon_password = env::var("AGENT_RUNTIME_RCON_PASSWORD").unwrap_or_default();
    let completion_addr: SocketAddr = env::var("AGENT_RUNTIME_COMPLETION_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:34197".to_string())
        .parse()?;
    let tick_interval_ms: u64 = env::var("AGENT_RUNTIME_TICK_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(16);

    log::info!("connecting to simulation RCON channel at {}", rcon_addr);
    let world = Box::new(RconSimulationWorld::connect(&rcon_addr, &rcon_password).await?);
    let spatial = Box::new(InMemorySpatialQuery::new());

    let notifier = embodied_agent_runtime::notify::UdpNotifier::bind(completion_addr).await?;
    let runtime = Runtime::new(world, spatial, PrototypeTable::builtin(), RuntimeConfig::default()).with_notifier(notifier);

    log::info!("entering tick loop (interval {}ms)", tick_interval_ms);
    let mut interval = tokio::time::interval(Duration::from_millis(tick_interval_ms));
    loop {
        interval.tick().await;
        if let Err(err) = runtime.tick().await {
            log::error!("tick failed: {}", err);
        }
    }
}
