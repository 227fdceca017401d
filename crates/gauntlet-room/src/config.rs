//! Tournament configuration.

use std::time::Duration;

use gauntlet_protocol::RoomMode;
use serde::{Deserialize, Serialize};

/// How live-vs-live matches get their result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Clients fight the battle and report `clientBattleResult`.
    #[default]
    ClientReported,
    /// The server simulates every battle at round start.
    ServerSimulated,
}

/// Timing and economy knobs for every room an arena runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub duo_capacity: usize,
    pub bracket_capacity: usize,

    /// Delay between a bracket room filling up and hero selection.
    pub bracket_countdown: Duration,

    /// Inter-round preparation time.
    pub buffer_duration: Duration,

    /// Length of a round before open matches are auto-resolved.
    pub round_duration: Duration,

    /// Round time after which the damage multiplier starts climbing.
    pub escalation_start: Duration,

    /// Multiplier gained per second past `escalation_start`.
    pub escalation_rate: f64,

    /// HP lost by the loser of a ghost bye or a timed-out match, before
    /// the multiplier.
    pub auto_penalty_hp: u32,

    pub starting_hp: u32,
    pub starting_gold: u32,

    pub resolution: Resolution,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            duo_capacity: RoomMode::Duo.capacity(),
            bracket_capacity: RoomMode::Bracket.capacity(),
            bracket_countdown: Duration::from_secs(10),
            buffer_duration: Duration::from_secs(30),
            round_duration: Duration::from_secs(50),
            escalation_start: Duration::from_secs(20),
            escalation_rate: 0.06,
            auto_penalty_hp: 5,
            starting_hp: 50,
            starting_gold: 300,
            resolution: Resolution::ClientReported,
        }
    }
}

impl TournamentConfig {
    /// Seat capacity for rooms of `mode`.
    pub fn capacity(&self, mode: RoomMode) -> usize {
        match mode {
            RoomMode::Duo => self.duo_capacity,
            RoomMode::Bracket => self.bracket_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tournament_config_default_timings() {
        let config = TournamentConfig::default();
        assert_eq!(config.capacity(RoomMode::Duo), 2);
        assert_eq!(config.capacity(RoomMode::Bracket), 8);
        assert_eq!(config.bracket_countdown, Duration::from_secs(10));
        assert_eq!(config.buffer_duration, Duration::from_secs(30));
        assert_eq!(config.round_duration, Duration::from_secs(50));
        assert_eq!(config.auto_penalty_hp, 5);
        assert_eq!(config.starting_hp, 50);
        assert_eq!(config.starting_gold, 300);
        assert_eq!(config.resolution, Resolution::ClientReported);
    }

    #[test]
    fn test_resolution_serializes_camel_case() {
        let json = serde_json::to_string(&Resolution::ServerSimulated).unwrap();
        assert_eq!(json, "\"serverSimulated\"");
    }

    #[test]
    fn test_tournament_config_roundtrips_through_json() {
        let config = TournamentConfig {
            starting_hp: 80,
            ..TournamentConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: TournamentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.starting_hp, 80);
        assert_eq!(back.round_duration, config.round_duration);
    }
}
