//! Declarative parameter specs and the `queued` envelope for the per-agent
//! RPC surface (spec.md §4.1, §6).
//!
//! `ParamSpec` mirrors the teacher's `ToolParameter` field-for-field
//! (name/type/description/required/default), generalized here to the
//! runtime's own action categories instead of LLM tool schemas.

use serde::Serialize;

/// The declarative type of one action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Float,
    Boolean,
    Position,
    EntityId,
    Array,
    Object,
}

/// One parameter of an action's declarative schema (spec.md §6 "fields
/// `{type, required, default, doc}`").
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub doc: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            doc,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, default: serde_json::Value, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
            doc,
        }
    }
}

/// Whether an action returns a full result immediately or installs an
/// activity record and returns a `queued` envelope (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Sync,
    Async,
}

/// RPC surface grouping (spec.md §6 "movement, mining, crafting, entity,
/// inventory, placement, query, research, debug").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Movement,
    Mining,
    Crafting,
    Entity,
    Inventory,
    Placement,
    Query,
    Research,
    Debug,
}

/// One named entry in the per-agent RPC surface (spec.md §4.1, §6).
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub category: ActionCategory,
    pub kind: ActionKind,
    pub params: Vec<ParamSpec>,
}

/// The envelope returned by an async action's start method (spec.md §4.1
/// "`{queued: true, action_id, tick, estimated_ticks?}`").
#[derive(Debug, Clone, Serialize)]
pub struct QueuedEnvelope {
    pub queued: bool,
    pub action_id: String,
    pub tick: u64,
    pub estimated_ticks: Option<u64>,
}

impl QueuedEnvelope {
    pub fn new(action_id: impl Into<String>, tick: u64, estimated_ticks: Option<u64>) -> Self {
        Self {
            queued: true,
            action_id: action_id.into(),
            tick,
            estimated_ticks,
        }
    }
}

/// The static table of every action this runtime exposes (spec.md §6
/// "Inbound RPC surface"). Queried by the `server` HTTP front end and by
/// the queue's `queue_<action>` alias generation; the core dispatch path
/// (`Runtime::dispatch`) does not itself consult it — it is documentation
/// and tooling metadata, not a router.
pub fn action_table() -> Vec<ActionDescriptor> {
    vec![
        ActionDescriptor {
            name: "walk_to",
            category: ActionCategory::Movement,
            kind: ActionKind::Async,
            params: vec![
                ParamSpec::required("x", ParamKind::Float, "target x coordinate"),
                ParamSpec::required("y", ParamKind::Float, "target y coordinate"),
                ParamSpec::optional("strict_goal", ParamKind::Boolean, serde_json::json!(false), "fail instead of adjusting to a perimeter goal if occupied"),
            ],
        },
        ActionDescriptor {
            name: "stop_walking",
            category: ActionCategory::Movement,
            kind: ActionKind::Sync,
            params: vec![],
        },
        ActionDescriptor {
            name: "mine",
            category: ActionCategory::Mining,
            kind: ActionKind::Async,
            params: vec![
                ParamSpec::required("entity_id", ParamKind::EntityId, "target entity to mine"),
                ParamSpec::optional("count", ParamKind::Integer, serde_json::json!(1), "how many cycles to mine before auto-stopping"),
            ],
        },
        ActionDescriptor {
            name: "stop_mining",
            category: ActionCategory::Mining,
            kind: ActionKind::Sync,
            params: vec![],
        },
        ActionDescriptor {
            name: "craft",
            category: ActionCategory::Crafting,
            kind: ActionKind::Async,
            params: vec![
                ParamSpec::required("recipe", ParamKind::String, "recipe name"),
                ParamSpec::optional("count", ParamKind::Integer, serde_json::json!(1), "repetitions to queue"),
            ],
        },
        ActionDescriptor {
            name: "stop_crafting",
            category: ActionCategory::Crafting,
            kind: ActionKind::Sync,
            params: vec![
                ParamSpec::required("recipe", ParamKind::String, "recipe name"),
                ParamSpec::optional("count", ParamKind::Integer, serde_json::Value::Null, "repetitions to cancel, defaults to all"),
            ],
        },
        ActionDescriptor {
            name: "place_entity",
            category: ActionCategory::Placement,
            kind: ActionKind::Sync,
            params: vec![
                ParamSpec::required("name", ParamKind::String, "entity prototype name"),
                ParamSpec::required("x", ParamKind::Float, "placement x coordinate"),
                ParamSpec::required("y", ParamKind::Float, "placement y coordinate"),
                ParamSpec::optional("is_ghost", ParamKind::Boolean, serde_json::json!(false), "place a blueprint ghost instead of a real entity"),
            ],
        },
        ActionDescriptor {
            name: "destroy_entity",
            category: ActionCategory::Entity,
            kind: ActionKind::Sync,
            params: vec![ParamSpec::required("entity_id", ParamKind::EntityId, "entity to destroy")],
        },
        ActionDescriptor {
            name: "get_reachable",
            category: ActionCategory::Query,
            kind: ActionKind::Sync,
            params: vec![ParamSpec::optional("include_ghosts", ParamKind::Boolean, serde_json::json!(true), "include ghost entities in the snapshot")],
        },
        ActionDescriptor {
            name: "transfer_to_entity",
            category: ActionCategory::Inventory,
            kind: ActionKind::Sync,
            params: vec![
                ParamSpec::required("entity_id", ParamKind::EntityId, "destination entity"),
                ParamSpec::required("item", ParamKind::String, "item name"),
                ParamSpec::required("amount", ParamKind::Integer, "amount to move"),
            ],
        },
        ActionDescriptor {
            name: "transfer_from_entity",
            category: ActionCategory::Inventory,
            kind: ActionKind::Sync,
            params: vec![
                ParamSpec::required("entity_id", ParamKind::EntityId, "source entity"),
                ParamSpec::required("item", ParamKind::String, "item name"),
                ParamSpec::required("amount", ParamKind::Integer, "amount to move"),
            ],
        },
        ActionDescriptor {
            name: "placement_cues",
            category: ActionCategory::Placement,
            kind: ActionKind::Sync,
            params: vec![
                ParamSpec::required("entity_name", ParamKind::String, "entity prototype to find placement cues for"),
                ParamSpec::optional("tile_step", ParamKind::Float, serde_json::json!(1.0), "sweep granularity in tiles"),
            ],
        },
        ActionDescriptor {
            name: "enqueue_research",
            category: ActionCategory::Research,
            kind: ActionKind::Sync,
            params: vec![ParamSpec::required("technology", ParamKind::String, "technology to queue behind the agent's team's current research")],
        },
        ActionDescriptor {
            name: "research_status",
            category: ActionCategory::Research,
            kind: ActionKind::Sync,
            params: vec![],
        },
    ]
}

/// Validate a JSON params object against a descriptor's required fields
/// (spec.md §4.1 "A sync method validates its parameters ... before any
/// state change"). Defaults are not injected here; callers read
/// `params.get(name).or(spec.default.as_ref())`.
pub fn validate_params(descriptor: &ActionDescriptor, params: &serde_json::Value) -> Result<(), crate::error::RuntimeError> {
    for spec in &descriptor.params {
        if spec.required && params.get(spec.name).is_none() {
            return Err(crate::error::RuntimeError::invalid_parameter(format!(
                "{}: missing required parameter `{}`",
                descriptor.name, spec.name
            )));
        }
    }
    Ok(())
}
