//! Armor mitigation.

/// Damage left after armor: `max(1, floor(base * (1 - armor/(armor+100))))`.
///
/// The curve approaches full mitigation but never reaches it, and every hit
/// does at least one point.
///
/// ```
/// use gauntlet_combat::calculate_damage;
///
/// assert_eq!(calculate_damage(100, 100), 50);
/// assert_eq!(calculate_damage(10, 0), 10);
/// ```
pub fn calculate_damage(base_damage: u32, armor: u32) -> u32 {
    let armor = f64::from(armor);
    let reduction = armor / (armor + 100.0);
    let mitigated = (f64::from(base_damage) * (1.0 - reduction)).floor() as u32;
    mitigated.max(1)
}

/// Basic-attack damage from `attack` against `armor`.
pub fn attack_damage(attack: u32, armor: u32) -> u32 {
    calculate_damage(attack, armor)
}

/// Ultimate damage: `floor(attack * 2.5)`, ignoring armor.
pub fn ultimate_damage(attack: u32) -> u32 {
    (f64::from(attack) * 2.5).floor() as u32
}
