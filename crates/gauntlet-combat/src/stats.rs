//! Combat stats and the shaping applied before every battle.

use serde::{Deserialize, Serialize};

/// The four stats a combatant fights with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub health: u32,
    pub attack: u32,
    pub armor: u32,
    pub speed: u32,
}

/// A purchased upgrade, applied additively (or as a percentage) on top of
/// a hero's base stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "value", rename_all = "camelCase")]
pub enum StatModifier {
    HealthBoost(u32),
    AttackBoost(u32),
    ArmorBoost(u32),
    SpeedBoost(u32),
    /// `attack = floor(attack * (1 + pct/100))`
    AttackPercent(u32),
    /// `health = floor(health * (1 + pct/100))`
    HealthPercent(u32),
}

/// Damping curve for one stat: everything above `threshold` only counts
/// `factor` of its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shaping {
    pub threshold: u32,
    pub factor: f64,
}

impl Shaping {
    pub const ATTACK: Self = Self {
        threshold: 100,
        factor: 0.6,
    };
    pub const ARMOR: Self = Self {
        threshold: 50,
        factor: 0.4,
    };
    pub const SPEED: Self = Self {
        threshold: 100,
        factor: 0.7,
    };

    /// Applies the curve to `value`.
    pub fn apply(self, value: u32) -> u32 {
        diminishing_returns(value, self.threshold, self.factor)
    }
}

/// Scales only the part of `value` above `threshold` by `factor`, flooring
/// the scaled excess.
///
/// ```
/// use gauntlet_combat::diminishing_returns;
///
/// assert_eq!(diminishing_returns(80, 100, 0.6), 80);
/// assert_eq!(diminishing_returns(151, 100, 0.6), 130);
/// ```
pub fn diminishing_returns(value: u32, threshold: u32, factor: f64) -> u32 {
    if value <= threshold {
        return value;
    }
    let excess = f64::from(value - threshold);
    threshold + (excess * factor).floor() as u32
}

fn scale_percent(value: u32, pct: u32) -> u32 {
    (f64::from(value) * (1.0 + f64::from(pct) / 100.0)).floor() as u32
}

impl Stats {
    /// Applies modifiers in order.
    pub fn with_modifiers(mut self, modifiers: &[StatModifier]) -> Self {
        for modifier in modifiers {
            match *modifier {
                StatModifier::HealthBoost(v) => self.health = self.health.saturating_add(v),
                StatModifier::AttackBoost(v) => self.attack = self.attack.saturating_add(v),
                StatModifier::ArmorBoost(v) => self.armor = self.armor.saturating_add(v),
                StatModifier::SpeedBoost(v) => self.speed = self.speed.saturating_add(v),
                StatModifier::AttackPercent(pct) => self.attack = scale_percent(self.attack, pct),
                StatModifier::HealthPercent(pct) => self.health = scale_percent(self.health, pct),
            }
        }
        self
    }

    /// The stats a combatant actually fights with: diminishing returns on
    /// attack, armor and speed, then floors (health, attack and speed at 1).
    pub fn effective(self) -> Self {
        Self {
            health: self.health.max(1),
            attack: Shaping::ATTACK.apply(self.attack).max(1),
            armor: Shaping::ARMOR.apply(self.armor),
            speed: Shaping::SPEED.apply(self.speed).max(1),
        }
    }

    /// Simulated ticks between two basic attacks: `ceil((1000/speed)/100)`.
    pub fn attack_interval(&self) -> u32 {
        10u32.div_ceil(self.speed.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Stats {
        Stats {
            health: 100,
            attack: 20,
            armor: 5,
            speed: 6,
        }
    }

    #[test]
    fn test_diminishing_returns_below_threshold_unchanged() {
        assert_eq!(diminishing_returns(100, 100, 0.6), 100);
        assert_eq!(diminishing_returns(0, 50, 0.4), 0);
    }

    #[test]
    fn test_diminishing_returns_floors_scaled_excess() {
        // 50 + floor(25 * 0.4) = 60
        assert_eq!(diminishing_returns(75, 50, 0.4), 60);
        // 100 + floor(33 * 0.7) = 123
        assert_eq!(diminishing_returns(133, 100, 0.7), 123);
    }

    #[test]
    fn test_effective_shapes_each_stat_with_its_own_curve() {
        let stats = Stats {
            health: 500,
            attack: 151,
            armor: 151,
            speed: 201,
        }
        .effective();

        assert_eq!(stats.health, 500, "health is not shaped");
        assert_eq!(stats.attack, 130);
        assert_eq!(stats.armor, 90);
        assert_eq!(stats.speed, 170);
    }

    #[test]
    fn test_effective_applies_floors() {
        let stats = Stats {
            health: 0,
            attack: 0,
            armor: 0,
            speed: 0,
        }
        .effective();

        assert_eq!(stats.health, 1);
        assert_eq!(stats.attack, 1);
        assert_eq!(stats.armor, 0);
        assert_eq!(stats.speed, 1);
    }

    #[test]
    fn test_with_modifiers_applies_in_order() {
        let stats = base().with_modifiers(&[
            StatModifier::AttackBoost(10),
            StatModifier::AttackPercent(50),
            StatModifier::HealthPercent(10),
            StatModifier::ArmorBoost(3),
            StatModifier::SpeedBoost(1),
        ]);

        assert_eq!(stats.attack, 45);
        assert_eq!(stats.health, 110);
        assert_eq!(stats.armor, 8);
        assert_eq!(stats.speed, 7);
    }

    #[test]
    fn test_attack_interval_matches_speed() {
        let mut stats = base();
        stats.speed = 6;
        assert_eq!(stats.attack_interval(), 2);
        stats.speed = 10;
        assert_eq!(stats.attack_interval(), 1);
        stats.speed = 3;
        assert_eq!(stats.attack_interval(), 4);
        stats.speed = 1;
        assert_eq!(stats.attack_interval(), 10);
    }

    #[test]
    fn test_stat_modifier_wire_shape() {
        let json = serde_json::to_value(StatModifier::AttackBoost(5)).unwrap();
        assert_eq!(json["effect"], "attackBoost");
        assert_eq!(json["value"], 5);
    }
}
