use crate::battle::state::{TurnRng, WildEncounter};
use schema::BallKind;

pub const MIN_CATCH_CHANCE: f64 = 0.10;
pub const MAX_CATCH_CHANCE: f64 = 0.95;

const LEVEL_BONUS: f64 = 0.01;
const SLEEP_BONUS: f64 = 0.2;

/// Probability that a throw catches `wild`.
/// Formula: chance = (damage dealt / max HP) / rarity penalty
///                   + partner level * 0.01 + ball bonus (+ 0.2 while asleep)
/// clamped to [0.10, 0.95].
pub fn calculate_catch_chance(wild: &WildEncounter, partner_level: u32, ball_bonus: f64) -> f64 {
    let missing = if wild.max_hp == 0 {
        0.0
    } else {
        f64::from(wild.max_hp - wild.current_hp.min(wild.max_hp)) / f64::from(wild.max_hp)
    };

    let mut chance = missing / wild.rarity.catch_penalty()
        + f64::from(partner_level) * LEVEL_BONUS
        + ball_bonus;
    if wild.is_asleep() {
        chance += SLEEP_BONUS;
    }

    chance.clamp(MIN_CATCH_CHANCE, MAX_CATCH_CHANCE)
}

/// The chance shown in the battle view: a plain ball, no bonus.
pub fn preview_catch_chance(wild: &WildEncounter, partner_level: u32) -> f64 {
    calculate_catch_chance(wild, partner_level, BallKind::Poke.catch_bonus())
}

/// Roll for catch success. Master balls always succeed and draw nothing.
pub fn roll_catch_success(chance: f64, ball: BallKind, rng: &mut TurnRng) -> bool {
    if ball.guarantees_catch() {
        return true;
    }
    rng.next_outcome("catch roll") < chance
}

/// Get a descriptive catch chance category for display purposes
pub fn get_catch_rate_description(chance: f64) -> &'static str {
    match chance {
        c if c >= 0.80 => "Excellent",
        c if c >= 0.60 => "Very Good",
        c if c >= 0.45 => "Good",
        c if c >= 0.30 => "Fair",
        c if c >= 0.20 => "Poor",
        _ => "Very Poor",
    }
}
