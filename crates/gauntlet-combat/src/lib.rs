//! Combat resolution for Gauntlet.
//!
//! A finished match needs a winner and the loser's HP loss. Rooms get that
//! either from a client's report or, with server-side resolution, from
//! [`simulate`] here. Everything in this crate is pure and synchronous: no
//! clocks, no randomness, no I/O.
//!
//! - [`Stats`] and [`StatModifier`]: raw stats, upgrades, and the
//!   diminishing-returns shaping ([`Stats::effective`]).
//! - [`calculate_damage`]: the hyperbolic armor curve.
//! - [`StatusEffect`]: burn and poison damage over time.
//! - [`simulate`] / [`resolve_battle`]: the tick loop and its [`BattleReport`].
//! - [`HeroCatalog`]: where hero definitions come from; [`BuiltinHeroes`]
//!   is the default table.

mod battle;
mod catalog;
mod damage;
mod effects;
mod error;
mod stats;

pub use battle::{BattleConfig, BattleEvent, BattleReport, Combatant, Side, resolve_battle, simulate};
pub use catalog::{BuiltinHeroes, HeroCatalog, HeroDefinition};
pub use damage::{attack_damage, calculate_damage, ultimate_damage};
pub use effects::{OnHit, StatusEffect, StatusKind, apply_effects};
pub use error::CombatError;
pub use stats::{Shaping, StatModifier, Stats, diminishing_returns};
