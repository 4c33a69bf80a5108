pub mod evolution;
pub mod leveling;
pub mod rewards;

pub use evolution::{Evolution, EvolutionPlan};
pub use leveling::{gain_xp, xp_threshold, LevelUp};
pub use rewards::{RewardCalculator, Rewards};
