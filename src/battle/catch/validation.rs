use crate::battle::state::{BattlePhase, WildEncounter};
use crate::errors::GameError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatchError {
    /// Balls can only be thrown on the player's turn.
    #[error("not your turn")]
    NotPlayerTurn,
    /// No wild creature to aim at
    #[error("no wild creature")]
    NoTarget,
    #[error("{species} has fainted")]
    TargetFainted { species: String },
}

impl From<CatchError> for GameError {
    fn from(err: CatchError) -> Self {
        GameError::OutOfTurn {
            phase: err.to_string(),
        }
    }
}

/// Validate that a throw can be made and return the target.
///
/// Ball stock is not checked here; spending the ball is a ledger
/// transaction that refuses on its own.
pub fn can_attempt_catch<'a>(
    phase: &BattlePhase,
    wild: Option<&'a WildEncounter>,
) -> Result<&'a WildEncounter, CatchError> {
    if !matches!(phase, BattlePhase::PlayerChoice | BattlePhase::Resolving(_)) {
        return Err(CatchError::NotPlayerTurn);
    }
    match wild {
        Some(target) if target.is_fainted() => Err(CatchError::TargetFainted {
            species: target.display_name(),
        }),
        Some(target) => Ok(target),
        None => Err(CatchError::NoTarget),
    }
}
