use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Static classification of a species. Ordered from most to least common.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RarityTier {
    Common,
    Uncommon,
    Rare,
    Legendary,
}

impl RarityTier {
    /// Divisor applied to the damage ratio in the capture formula.
    pub fn catch_penalty(self) -> f64 {
        match self {
            RarityTier::Common => 1.0,
            RarityTier::Uncommon => 1.2,
            RarityTier::Rare => 1.5,
            RarityTier::Legendary => 2.0,
        }
    }

    /// Victory XP multiplier, in tenths (x1.2 -> 12).
    pub fn xp_multiplier_tenths(self) -> u64 {
        match self {
            RarityTier::Common => 10,
            RarityTier::Uncommon => 12,
            RarityTier::Rare => 15,
            RarityTier::Legendary => 25,
        }
    }

    /// Victory coin multiplier, in tenths (x1.3 -> 13).
    pub fn coin_multiplier_tenths(self) -> u64 {
        match self {
            RarityTier::Common => 10,
            RarityTier::Uncommon => 13,
            RarityTier::Rare => 16,
            RarityTier::Legendary => 30,
        }
    }

    /// Per-level base price paid when selling a party member.
    pub fn sell_base_value(self) -> u32 {
        match self {
            RarityTier::Common => 2,
            RarityTier::Uncommon => 5,
            RarityTier::Rare => 10,
            RarityTier::Legendary => 20,
        }
    }
}
