//! Server-side 1v1 battle simulation.
//!
//! Time advances in simulated ticks of 100 ms. On each tick the first
//! combatant acts before the second; a combatant attacks when the tick
//! number is a multiple of its attack interval. Status effects apply every
//! `status_interval` ticks. The loop stops as soon as either side reaches
//! 0 HP, or at `max_ticks`.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::catalog::{HeroCatalog, HeroDefinition};
use crate::damage::{attack_damage, ultimate_damage};
use crate::effects::{OnHit, StatusEffect, StatusKind, apply_effects};
use crate::error::CombatError;
use crate::stats::{StatModifier, Stats};

/// Tunables for a simulated battle.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleConfig {
    /// Safety cap on simulated ticks.
    pub max_ticks: u32,
    pub mana_per_attack: u32,
    pub max_mana: u32,
    /// Status effects apply on ticks that are a multiple of this.
    pub status_interval: u32,
    /// Scales status-effect damage. Rooms pass their round multiplier.
    pub damage_multiplier: f64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_ticks: 100,
            mana_per_attack: 15,
            max_mana: 100,
            status_interval: 10,
            damage_multiplier: 1.0,
        }
    }
}

/// One of the two combatants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    First,
    Second,
}

impl Side {
    fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    /// The other side.
    pub fn opponent(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

/// A hero in the middle of a battle.
#[derive(Debug, Clone, PartialEq)]
pub struct Combatant {
    pub name: String,
    /// Effective (shaped) stats.
    pub stats: Stats,
    pub health: u32,
    pub mana: u32,
    pub effects: Vec<StatusEffect>,
    pub on_hit: Option<OnHit>,
}

impl Combatant {
    /// Creates a combatant at full health. `stats` are shaped here.
    pub fn new(name: impl Into<String>, stats: Stats) -> Self {
        let stats = stats.effective();
        Self {
            name: name.into(),
            stats,
            health: stats.health,
            mana: 0,
            effects: Vec::new(),
            on_hit: None,
        }
    }

    /// Sets the effect inflicted on every landed basic attack.
    pub fn with_on_hit(mut self, on_hit: OnHit) -> Self {
        self.on_hit = Some(on_hit);
        self
    }

    /// Builds a combatant from a hero and its purchased upgrades.
    pub fn from_hero(hero: &HeroDefinition, modifiers: &[StatModifier]) -> Self {
        let mut combatant = Self::new(hero.name.clone(), hero.base.with_modifiers(modifiers));
        combatant.on_hit = hero.on_hit;
        combatant
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    fn take(&mut self, damage: u32) {
        self.health = self.health.saturating_sub(damage);
    }
}

/// One entry of the battle log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BattleEvent {
    Attack {
        tick: u32,
        attacker: Side,
        damage: u32,
        target_health: u32,
        attacker_mana: u32,
    },
    Ultimate {
        tick: u32,
        caster: Side,
        damage: u32,
        target_health: u32,
    },
    StatusTick {
        tick: u32,
        target: Side,
        kind: StatusKind,
        damage: u32,
        target_health: u32,
    },
    End {
        tick: u32,
        winner: Side,
        first_health: u32,
        second_health: u32,
    },
}

/// Outcome of a simulated battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleReport {
    pub winner: Side,
    /// Damage dealt by each side, indexed First then Second.
    pub damage_dealt: [u32; 2],
    pub remaining_health: [u32; 2],
    pub max_health: [u32; 2],
    pub ticks: u32,
    pub events: Vec<BattleEvent>,
}

impl BattleReport {
    /// The losing side.
    pub fn loser(&self) -> Side {
        self.winner.opponent()
    }

    /// Health `side` lost over the battle.
    pub fn health_lost(&self, side: Side) -> u32 {
        let i = side.index();
        self.max_health[i] - self.remaining_health[i]
    }
}

/// A basic attack by `attacker` on `defender`, plus the ultimate if it fills
/// the attacker's mana.
fn strike(
    side: Side,
    attacker: &mut Combatant,
    defender: &mut Combatant,
    tick: u32,
    config: &BattleConfig,
    events: &mut Vec<BattleEvent>,
) -> u32 {
    let damage = attack_damage(attacker.stats.attack, defender.stats.armor);
    defender.take(damage);
    attacker.mana = (attacker.mana + config.mana_per_attack).min(config.max_mana);
    events.push(BattleEvent::Attack {
        tick,
        attacker: side,
        damage,
        target_health: defender.health,
        attacker_mana: attacker.mana,
    });

    if let Some(on_hit) = attacker.on_hit {
        if defender.is_alive() {
            defender.effects.push(on_hit.inflict(damage));
        }
    }

    let mut dealt = damage;
    if attacker.mana >= config.max_mana {
        attacker.mana = 0;
        let ult = ultimate_damage(attacker.stats.attack);
        defender.take(ult);
        dealt += ult;
        events.push(BattleEvent::Ultimate {
            tick,
            caster: side,
            damage: ult,
            target_health: defender.health,
        });
    }
    dealt
}

/// Runs a battle to completion.
pub fn simulate(first: Combatant, second: Combatant, config: &BattleConfig) -> BattleReport {
    let max_health = [first.stats.health, second.stats.health];
    let mut fighters = [first, second];
    let mut dealt = [0u32; 2];
    let mut events = Vec::new();
    let mut tick = 0;

    while fighters[0].is_alive() && fighters[1].is_alive() && tick < config.max_ticks {
        tick += 1;

        for side in [Side::First, Side::Second] {
            let [a, b] = &mut fighters;
            let (attacker, defender) = match side {
                Side::First => (a, b),
                Side::Second => (b, a),
            };
            if !attacker.is_alive() || !defender.is_alive() {
                continue;
            }
            if tick % attacker.stats.attack_interval() == 0 {
                dealt[side.index()] += strike(side, attacker, defender, tick, config, &mut events);
            }
        }

        if config.status_interval > 0 && tick % config.status_interval == 0 {
            for side in [Side::First, Side::Second] {
                let target = &mut fighters[side.index()];
                if !target.is_alive() {
                    continue;
                }
                for (kind, damage) in apply_effects(&mut target.effects, config.damage_multiplier) {
                    target.take(damage);
                    dealt[side.opponent().index()] += damage;
                    events.push(BattleEvent::StatusTick {
                        tick,
                        target: side,
                        kind,
                        damage,
                        target_health: target.health,
                    });
                }
            }
        }
    }

    // Second wins only if it is the sole survivor. Every other outcome
    // goes to First: both alive at the tick cap, and both dropping to 0 HP
    // from status damage in the same tick.
    let winner = match (fighters[0].is_alive(), fighters[1].is_alive()) {
        (false, true) => Side::Second,
        _ => Side::First,
    };
    events.push(BattleEvent::End {
        tick,
        winner,
        first_health: fighters[0].health,
        second_health: fighters[1].health,
    });
    trace!(
        first = %fighters[0].name,
        second = %fighters[1].name,
        ?winner,
        ticks = tick,
        "battle simulated"
    );

    BattleReport {
        winner,
        damage_dealt: dealt,
        remaining_health: [fighters[0].health, fighters[1].health],
        max_health,
        ticks: tick,
        events,
    }
}

/// Looks both heroes up in `catalog` and simulates their battle.
///
/// # Errors
/// Returns `CombatError::UnknownHero` if either id is not in the catalog.
pub fn resolve_battle(
    catalog: &dyn HeroCatalog,
    first_hero: &str,
    second_hero: &str,
    config: &BattleConfig,
) -> Result<BattleReport, CombatError> {
    let lookup = |id: &str| {
        catalog
            .hero(id)
            .ok_or_else(|| CombatError::UnknownHero(id.to_owned()))
    };
    let first = Combatant::from_hero(&lookup(first_hero)?, &[]);
    let second = Combatant::from_hero(&lookup(second_hero)?, &[]);
    Ok(simulate(first, second, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fighter(health: u32, attack: u32, armor: u32, speed: u32) -> Combatant {
        Combatant::new(
            "dummy",
            Stats {
                health,
                attack,
                armor,
                speed,
            },
        )
    }

    #[test]
    fn test_simulate_first_side_acts_first_in_tick() {
        let report = simulate(
            fighter(30, 10, 0, 10),
            fighter(30, 10, 0, 10),
            &BattleConfig::default(),
        );

        assert_eq!(report.winner, Side::First);
        assert_eq!(report.ticks, 3);
        assert_eq!(report.remaining_health, [10, 0]);
        assert_eq!(report.damage_dealt, [30, 20]);
        assert_eq!(report.health_lost(Side::First), 20);
        assert_eq!(report.loser(), Side::Second);
    }

    #[test]
    fn test_simulate_dead_second_side_does_not_attack() {
        let report = simulate(
            fighter(30, 50, 0, 10),
            fighter(10, 50, 0, 10),
            &BattleConfig::default(),
        );

        assert_eq!(report.ticks, 1);
        assert_eq!(report.remaining_health, [30, 0]);
        let attacks = report
            .events
            .iter()
            .filter(|e| matches!(e, BattleEvent::Attack { .. }))
            .count();
        assert_eq!(attacks, 1);
    }

    #[test]
    fn test_simulate_ultimate_fires_at_full_mana_and_resets() {
        let report = simulate(
            fighter(1000, 10, 0, 10),
            fighter(1000, 1, 0, 1),
            &BattleConfig::default(),
        );

        let ult = report
            .events
            .iter()
            .find_map(|e| match e {
                BattleEvent::Ultimate { tick, damage, .. } => Some((*tick, *damage)),
                _ => None,
            })
            .expect("ultimate should fire");
        // 15 mana per attack, one attack per tick: full on the 7th.
        assert_eq!(ult, (7, 25));

        let mana_after = report.events.iter().find_map(|e| match e {
            BattleEvent::Attack {
                tick: 8,
                attacker: Side::First,
                attacker_mana,
                ..
            } => Some(*attacker_mana),
            _ => None,
        });
        assert_eq!(mana_after, Some(15));
    }

    #[test]
    fn test_simulate_safety_cap_favors_first_on_tie() {
        let report = simulate(
            fighter(100_000, 1, 0, 1),
            fighter(100_000, 1, 0, 1),
            &BattleConfig::default(),
        );

        assert_eq!(report.ticks, 100);
        assert_eq!(report.winner, Side::First);
        assert!(matches!(
            report.events.last(),
            Some(BattleEvent::End { tick: 100, .. })
        ));
    }

    #[test]
    fn test_simulate_double_status_knockout_favors_first() {
        let poisoned = |health| {
            let mut c = fighter(health, 1, 0, 1);
            c.effects.push(StatusEffect {
                kind: StatusKind::Poison,
                damage: 10,
                ticks_remaining: 1,
            });
            c
        };

        let report = simulate(poisoned(5), poisoned(5), &BattleConfig::default());

        assert_eq!(report.ticks, 10);
        assert_eq!(report.remaining_health, [0, 0]);
        assert_eq!(report.winner, Side::First);
    }

    #[test]
    fn test_simulate_status_damage_scales_with_multiplier() {
        let burner = fighter(1000, 10, 0, 10).with_on_hit(OnHit {
            kind: StatusKind::Burn,
            percent: 1.0,
            duration: 3,
        });
        let config = BattleConfig {
            damage_multiplier: 2.0,
            ..BattleConfig::default()
        };
        let report = simulate(burner, fighter(100_000, 1, 0, 1), &config);

        let first_tick = report.events.iter().find_map(|e| match e {
            BattleEvent::StatusTick {
                tick,
                target,
                kind,
                damage,
                ..
            } => Some((*tick, *target, *kind, *damage)),
            _ => None,
        });
        assert_eq!(first_tick, Some((10, Side::Second, StatusKind::Burn, 20)));
    }

    #[test]
    fn test_resolve_battle_unknown_hero_errors() {
        let result = resolve_battle(
            &crate::BuiltinHeroes,
            "warrior",
            "dragon",
            &BattleConfig::default(),
        );
        assert!(matches!(result, Err(CombatError::UnknownHero(id)) if id == "dragon"));
    }
}
