//! Technology research queuing (spec.md §9 open question: "Whether
//! `enqueue_research` queues behind or replaces current research").
//!
//! Research is scoped per **team**, not per agent (spec.md glossary:
//! "Team / force ... governs recipe availability and technology
//! research") — any agent belonging to a team can extend that team's
//! queue. This module only owns the bookkeeping decision (append vs.
//! replace); actually driving research progress in the simulation is out
//! of scope (spec.md §1 treats prototype/technology data as a read-only
//! lookup table, and no completion status in spec.md §4.8's enum covers
//! "research complete").

use crate::error::RuntimeError;
use crate::prototypes::PrototypeTable;
use std::collections::{HashMap, VecDeque};

/// One team's research state: at most one technology actively researching,
/// plus whatever has been queued behind it.
#[derive(Debug, Clone, Default)]
pub struct ResearchState {
    pub current: Option<String>,
    pub queue: VecDeque<String>,
}

/// `enqueue_research(technology)`: append behind the current queue if one
/// exists, else set `technology` as the team's current research (spec.md
/// §9, preserved from source behavior).
pub fn enqueue_research(
    registry: &mut HashMap<String, ResearchState>,
    prototypes: &PrototypeTable,
    team: &str,
    technology: &str,
) -> Result<(), RuntimeError> {
    prototypes
        .technology(technology)
        .ok_or_else(|| RuntimeError::invalid_parameter(format!("unknown technology: {}", technology)))?;

    let state = registry.entry(team.to_string()).or_default();
    if state.current.is_some() {
        state.queue.push_back(technology.to_string());
    } else {
        state.current = Some(technology.to_string());
    }
    Ok(())
}

/// Read-only status lookup for `research_status` (spec.md §6 "query").
pub fn status(registry: &HashMap<String, ResearchState>, team: &str) -> ResearchState {
    registry.get(team).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prototypes::TechnologyPrototype;

    fn prototypes() -> PrototypeTable {
        PrototypeTable::new().with_technology(TechnologyPrototype {
            name: "automation".to_string(),
            prerequisites: vec![],
            unit_cost: HashMap::new(),
            duration: 30.0,
            effects: vec!["unlocks-assembling-machine-1".to_string()],
        })
    }

    #[test]
    fn first_enqueue_sets_current() {
        let prototypes = prototypes();
        let mut registry = HashMap::new();
        enqueue_research(&mut registry, &prototypes, "player", "automation").unwrap();
        let state = status(&registry, "player");
        assert_eq!(state.current, Some("automation".to_string()));
        assert!(state.queue.is_empty());
    }

    #[test]
    fn second_enqueue_appends_behind_current() {
        let prototypes = PrototypeTable::new()
            .with_technology(TechnologyPrototype {
                name: "automation".to_string(),
                prerequisites: vec![],
                unit_cost: HashMap::new(),
                duration: 30.0,
                effects: vec![],
            })
            .with_technology(TechnologyPrototype {
                name: "logistics".to_string(),
                prerequisites: vec![],
                unit_cost: HashMap::new(),
                duration: 30.0,
                effects: vec![],
            });
        let mut registry = HashMap::new();
        enqueue_research(&mut registry, &prototypes, "player", "automation").unwrap();
        enqueue_research(&mut registry, &prototypes, "player", "logistics").unwrap();
        let state = status(&registry, "player");
        assert_eq!(state.current, Some("automation".to_string()));
        assert_eq!(state.queue, VecDeque::from(["logistics".to_string()]));
    }

    #[test]
    fn unknown_technology_is_rejected() {
        let prototypes = prototypes();
        let mut registry = HashMap::new();
        let err = enqueue_research(&mut registry, &prototypes, "player", "nonexistent").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidParameter);
    }
}
