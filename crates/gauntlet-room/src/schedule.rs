//! Damage-multiplier escalation within a round.

use crate::TournamentConfig;

/// The multiplier after `elapsed_secs` of round time.
///
/// Flat 1.0 until `escalation_start`, then linear.
pub fn damage_multiplier(elapsed_secs: u64, config: &TournamentConfig) -> f64 {
    let past = elapsed_secs.saturating_sub(config.escalation_start.as_secs());
    1.0 + config.escalation_rate * past as f64
}

/// `base` HP scaled by `multiplier`, rounded half-up.
pub fn scaled_penalty(base: u32, multiplier: f64) -> u32 {
    (f64::from(base) * multiplier).round() as u32
}
