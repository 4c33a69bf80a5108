use super::RewardCalculator;
use crate::save::SaveData;
use schema::{species_key, EvolutionChain};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A level-gated evolution the partner currently qualifies for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionPlan {
    pub from: String,
    pub to: String,
    pub required_level: u32,
}

/// A completed evolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evolution {
    pub from: String,
    pub to: String,
    pub level: u32,
}

impl RewardCalculator {
    /// Check whether `species` at `level` should evolve along `chain`.
    ///
    /// Only the first listed successor is considered, and only when it is
    /// reached by a level-up trigger that names a minimum level. Terminal
    /// forms and item/trade/other triggers yield `None`.
    pub fn should_evolve(
        &self,
        chain: &EvolutionChain,
        species: &str,
        level: u32,
    ) -> Option<EvolutionPlan> {
        let successor = chain.successor_of(species)?;
        let required_level = successor.trigger.as_ref()?.required_level()?;
        if level < required_level {
            debug!(species, level, required_level, "not ready to evolve");
            return None;
        }
        Some(EvolutionPlan {
            from: species_key(species),
            to: species_key(&successor.species_name),
            required_level,
        })
    }
}

/// Evolve the active partner in place if it still qualifies.
///
/// The plan is recomputed against `data`, so a partner swap or a reset
/// between the chain lookup and this call turns it into a no-op. On
/// success the successor's record is created or overwritten with the
/// predecessor's stats verbatim and the successor becomes the active
/// partner. Nothing is touched otherwise.
pub fn apply_evolution(
    data: &mut SaveData,
    expected_partner: &str,
    chain: &EvolutionChain,
) -> Option<Evolution> {
    let expected = species_key(expected_partner);
    let (partner, record) = data.partner()?;
    if partner != expected {
        debug!(partner, expected = %expected, "partner changed before evolution");
        return None;
    }
    let plan = RewardCalculator.should_evolve(chain, partner, record.level)?;
    let record = record.clone();
    let level = record.level;

    data.creatures.insert(plan.to.clone(), record);
    data.active_partner = Some(plan.to.clone());
    info!(from = %plan.from, to = %plan.to, level, "partner evolved");

    Some(Evolution {
        from: plan.from,
        to: plan.to,
        level,
    })
}
