//! Immutable recipe/entity/technology lookup tables (spec.md §3, §4.1).
//!
//! Populated once at startup and never mutated afterward — the runtime
//! only ever reads through a shared reference. `PrototypeTable::builtin()`
//! seeds the handful of prototypes exercised by spec.md §8's literal
//! scenarios; a real deployment would instead load the full game data dump
//! through `PrototypeTable::new` + `with_*` builders.

use crate::geometry::CollisionBox;
use std::collections::HashMap;

/// One ingredient or product line of a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStack {
    pub item: String,
    pub amount: u32,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, amount: u32) -> Self {
        Self {
            item: item.into(),
            amount,
        }
    }
}

/// Crafting recipe prototype.
#[derive(Debug, Clone)]
pub struct RecipePrototype {
    pub name: String,
    pub category: String,
    pub energy_seconds: f64,
    pub ingredients: Vec<ItemStack>,
    pub products: Vec<ItemStack>,
    pub hand_craftable: bool,
}

/// Which mineable product probability model an entity prototype uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningMode {
    /// Resource ore/tree/rock that yields a deterministic item count per
    /// cycle (the common case).
    Deterministic,
    /// Products whose identity/amount is randomized per cycle (currently
    /// only `huge-rock` per spec.md's glossary).
    Stochastic,
}

/// What kind of mining completion detection an entity prototype requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineableKind {
    /// Ore patches: counted by progress-edge cycle detection, never
    /// depleted from a single mining record's point of view.
    Resource,
    /// Trees, rocks, huge-rock: terminates when the entity becomes invalid.
    Depletable,
}

#[derive(Debug, Clone)]
pub struct MineableProduct {
    pub item: String,
    /// Probability in `[0.0, 1.0]`; `< 1.0` makes the entity's mining mode
    /// `Stochastic` and requires fluid products to be hand-mine-disallowed
    /// separately (see `requires_fluid`).
    pub probability: f64,
}

/// World entity prototype (ore patch, tree, rock, machine, ...).
#[derive(Debug, Clone)]
pub struct EntityPrototype {
    pub name: String,
    pub collision_box: CollisionBox,
    /// Base mining time in seconds at 1x speed, `None` for non-mineable
    /// entities (machines, belts, ...).
    pub mining_time: Option<f64>,
    pub mineable_kind: Option<MineableKind>,
    pub mineable_products: Vec<MineableProduct>,
    /// True if the mineable product requires a fluid (cannot hand-mine;
    /// spec.md §4.3 "Start").
    pub requires_fluid: bool,
    pub inventory_slots: u32,
    /// Additional reach distance this entity contributes when held/worn by
    /// the character (spec.md §3 "reach_contributions").
    pub reach_contribution: f64,
    pub requires_water: bool,
    /// Set when this entity must be sited on an existing resource entity
    /// of the named type (e.g. a mining drill on `iron-ore`); drives the
    /// "requires resources" branch of the placement-cue sweep (spec.md
    /// §4.5).
    pub requires_resource: Option<String>,
}

impl EntityPrototype {
    pub fn mining_mode(&self) -> MiningMode {
        let stochastic = self
            .mineable_products
            .iter()
            .any(|p| p.probability < 1.0);
        if stochastic {
            MiningMode::Stochastic
        } else {
            MiningMode::Deterministic
        }
    }

    pub fn is_stochastic(&self) -> bool {
        self.mining_mode() == MiningMode::Stochastic
    }
}

#[derive(Debug, Clone)]
pub struct TechnologyPrototype {
    pub name: String,
    pub prerequisites: Vec<String>,
    pub unit_cost: HashMap<String, u32>,
    pub duration: f64,
    pub effects: Vec<String>,
}

/// Process-wide, read-only prototype lookup.
#[derive(Debug, Clone, Default)]
pub struct PrototypeTable {
    recipes: HashMap<String, RecipePrototype>,
    entities: HashMap<String, EntityPrototype>,
    technologies: HashMap<String, TechnologyPrototype>,
}

impl PrototypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipe(mut self, recipe: RecipePrototype) -> Self {
        self.recipes.insert(recipe.name.clone(), recipe);
        self
    }

    pub fn with_entity(mut self, entity: EntityPrototype) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    pub fn with_technology(mut self, tech: TechnologyPrototype) -> Self {
        self.technologies.insert(tech.name.clone(), tech);
        self
    }

    pub fn recipe(&self, name: &str) -> Option<&RecipePrototype> {
        self.recipes.get(name)
    }

    pub fn entity(&self, name: &str) -> Option<&EntityPrototype> {
        self.entities.get(name)
    }

    pub fn technology(&self, name: &str) -> Option<&TechnologyPrototype> {
        self.technologies.get(name)
    }

    /// Seed a minimal prototype table covering exactly the entities/recipes
    /// named in spec.md §8's literal end-to-end scenarios: `iron-ore`,
    /// `huge-rock`, `stone-furnace`, and `iron-gear-wheel`.
    pub fn builtin() -> Self {
        Self::new()
            .with_entity(EntityPrototype {
                name: "iron-ore".to_string(),
                collision_box: CollisionBox::new(1.0, 1.0),
                mining_time: Some(1.0),
                mineable_kind: Some(MineableKind::Resource),
                mineable_products: vec![MineableProduct {
                    item: "iron-ore".to_string(),
                    probability: 1.0,
                }],
                requires_fluid: false,
                inventory_slots: 0,
                reach_contribution: 0.0,
                requires_water: false,
                requires_resource: None,
            })
            .with_entity(EntityPrototype {
                name: "huge-rock".to_string(),
                collision_box: CollisionBox::new(2.0, 2.0),
                mining_time: Some(4.0),
                mineable_kind: Some(MineableKind::Depletable),
                mineable_products: vec![
                    MineableProduct {
                        item: "stone".to_string(),
                        probability: 0.6,
                    },
                    MineableProduct {
                        item: "coal".to_string(),
                        probability: 0.3,
                    },
                ],
                requires_fluid: false,
                inventory_slots: 0,
                reach_contribution: 0.0,
                requires_water: false,
                requires_resource: None,
            })
            .with_entity(EntityPrototype {
                name: "stone-furnace".to_string(),
                collision_box: CollisionBox::new(2.0, 2.0),
                mining_time: Some(0.5),
                mineable_kind: None,
                mineable_products: Vec::new(),
                requires_fluid: false,
                inventory_slots: 1,
                reach_contribution: 0.0,
                requires_water: false,
                requires_resource: None,
            })
            .with_entity(EntityPrototype {
                name: "electric-mining-drill".to_string(),
                collision_box: CollisionBox::new(3.0, 3.0),
                mining_time: None,
                mineable_kind: None,
                mineable_products: Vec::new(),
                requires_fluid: false,
                inventory_slots: 0,
                reach_contribution: 0.0,
                requires_water: false,
                requires_resource: Some("iron-ore".to_string()),
            })
            .with_recipe(RecipePrototype {
                name: "iron-gear-wheel".to_string(),
                category: "crafting".to_string(),
                energy_seconds: 0.5,
                ingredients: vec![ItemStack::new("iron-plate", 2)],
                products: vec![ItemStack::new("iron-gear-wheel", 1)],
                hand_craftable: true,
            })
            .with_technology(TechnologyPrototype {
                name: "automation".to_string(),
                prerequisites: Vec::new(),
                unit_cost: HashMap::from([("science-pack-1".to_string(), 10)]),
                duration: 30.0,
                effects: vec!["unlocks-assembling-machine-1".to_string()],
            })
    }
}
