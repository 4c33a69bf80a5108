pub mod catch;
pub mod engine;
pub mod state;

pub use engine::{BattleEngine, BattleView, EncounterRequest, NextStep, TurnReport};
pub use state::{BattleAction, BattlePhase, EventBus, GameEvent, Ticket, TurnRng, WildEncounter};

#[cfg(test)]
mod tests;
