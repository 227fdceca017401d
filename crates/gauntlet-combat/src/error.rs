/// Errors that can occur while setting up a battle.
#[derive(Debug, thiserror::Error)]
pub enum CombatError {
    /// The hero id is not in the catalog.
    #[error("unknown hero: {0}")]
    UnknownHero(String),

    /// A combatant has no hero selected.
    #[error("combatant has no hero selected")]
    NoHeroSelected,
}
