//! Hero definitions and the catalog they are looked up in.
//!
//! Hero records live in an external store in production. The arena only
//! needs to look a hero up by id, so that is all [`HeroCatalog`] asks for.
//! [`BuiltinHeroes`] carries the six launch heroes.

use serde::{Deserialize, Serialize};

use crate::effects::{OnHit, StatusKind};
use crate::stats::Stats;

/// A selectable hero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroDefinition {
    pub id: String,
    pub name: String,
    pub base: Stats,
    pub on_hit: Option<OnHit>,
}

/// Source of hero definitions.
pub trait HeroCatalog: Send + Sync {
    /// Looks up a hero by id.
    fn hero(&self, id: &str) -> Option<HeroDefinition>;

    /// Returns `true` if `id` names a selectable hero.
    fn contains(&self, id: &str) -> bool {
        self.hero(id).is_some()
    }
}

struct BuiltinEntry {
    id: &'static str,
    name: &'static str,
    health: u32,
    attack: u32,
    armor: u32,
    speed: u32,
    on_hit: Option<(StatusKind, f64, u32)>,
}

const BUILTIN: &[BuiltinEntry] = &[
    BuiltinEntry {
        id: "warrior",
        name: "Warrior",
        health: 120,
        attack: 15,
        armor: 8,
        speed: 6,
        on_hit: None,
    },
    BuiltinEntry {
        id: "mage",
        name: "Mage",
        health: 80,
        attack: 25,
        armor: 3,
        speed: 7,
        on_hit: Some((StatusKind::Burn, 0.3, 3)),
    },
    BuiltinEntry {
        id: "archer",
        name: "Archer",
        health: 90,
        attack: 20,
        armor: 5,
        speed: 9,
        on_hit: Some((StatusKind::Poison, 0.25, 4)),
    },
    BuiltinEntry {
        id: "assassin",
        name: "Assassin",
        health: 70,
        attack: 22,
        armor: 4,
        speed: 10,
        on_hit: Some((StatusKind::Poison, 0.2, 3)),
    },
    BuiltinEntry {
        id: "paladin",
        name: "Paladin",
        health: 110,
        attack: 18,
        armor: 7,
        speed: 5,
        on_hit: None,
    },
    BuiltinEntry {
        id: "necromancer",
        name: "Necromancer",
        health: 85,
        attack: 20,
        armor: 4,
        speed: 6,
        on_hit: None,
    },
];

impl BuiltinEntry {
    fn definition(&self) -> HeroDefinition {
        HeroDefinition {
            id: self.id.to_owned(),
            name: self.name.to_owned(),
            base: Stats {
                health: self.health,
                attack: self.attack,
                armor: self.armor,
                speed: self.speed,
            },
            on_hit: self.on_hit.map(|(kind, percent, duration)| OnHit {
                kind,
                percent,
                duration,
            }),
        }
    }
}

/// The built-in hero table.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinHeroes;

impl BuiltinHeroes {
    /// Every built-in hero id, in table order.
    pub fn ids() -> impl Iterator<Item = &'static str> {
        BUILTIN.iter().map(|e| e.id)
    }
}

impl HeroCatalog for BuiltinHeroes {
    fn hero(&self, id: &str) -> Option<HeroDefinition> {
        BUILTIN.iter().find(|e| e.id == id).map(BuiltinEntry::definition)
    }
}
