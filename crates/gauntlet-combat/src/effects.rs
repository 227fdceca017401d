//! Damage-over-time status effects.

use serde::{Deserialize, Serialize};

/// Kinds of damage-over-time effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusKind {
    Burn,
    Poison,
}

/// An effect currently on a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEffect {
    pub kind: StatusKind,
    /// Base damage per application, before the damage multiplier.
    pub damage: u32,
    pub ticks_remaining: u32,
}

impl StatusEffect {
    /// Damage this effect deals on one application under `multiplier`,
    /// rounded half away from zero.
    pub fn tick_damage(&self, multiplier: f64) -> u32 {
        (f64::from(self.damage) * multiplier).round() as u32
    }
}

/// Effect a combatant inflicts on every basic attack that lands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnHit {
    pub kind: StatusKind,
    /// Fraction of the hit's damage dealt per application.
    pub percent: f64,
    /// Number of applications.
    pub duration: u32,
}

impl OnHit {
    /// The effect inflicted by a hit that dealt `damage`.
    pub fn inflict(&self, damage: u32) -> StatusEffect {
        StatusEffect {
            kind: self.kind,
            damage: (f64::from(damage) * self.percent).round() as u32,
            ticks_remaining: self.duration,
        }
    }
}

/// Applies every effect once, returning `(kind, damage)` per application.
/// Spent effects are removed.
pub fn apply_effects(effects: &mut Vec<StatusEffect>, multiplier: f64) -> Vec<(StatusKind, u32)> {
    let mut applied = Vec::with_capacity(effects.len());
    for effect in effects.iter_mut() {
        applied.push((effect.kind, effect.tick_damage(multiplier)));
        effect.ticks_remaining = effect.ticks_remaining.saturating_sub(1);
    }
    effects.retain(|e| e.ticks_remaining > 0);
    applied
}
