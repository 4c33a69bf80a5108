use schema::RarityTier;
use serde::{Deserialize, Serialize};

/// Payout for defeating a wild creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewards {
    pub xp: u32,
    pub coins: u32,
}

/// Calculator for victory rewards and sale prices.
///
/// All arithmetic is integer so the results are exact: multipliers are
/// carried in hundredths/thousandths and rarity multipliers in tenths.
pub struct RewardCalculator;

impl RewardCalculator {
    /// Victory rewards.
    /// - xp    = floor(maxHP * (1 + L*0.05)) * rarity XP multiplier
    /// - coins = floor((20 + maxHP/10) * (1 + L*0.03)) * rarity coin multiplier
    ///
    /// Each product is floored.
    pub fn victory_rewards(
        &self,
        wild_max_hp: u32,
        partner_level: u32,
        rarity: RarityTier,
    ) -> Rewards {
        let max_hp = u64::from(wild_max_hp);
        let level = u64::from(partner_level);

        let base_xp = max_hp * (100 + 5 * level) / 100;
        let xp = base_xp * rarity.xp_multiplier_tenths() / 10;

        // (20 + hp/10) * (1 + 0.03L) == (200 + hp) * (100 + 3L) / 1000
        let base_coins = (200 + max_hp) * (100 + 3 * level) / 1000;
        let coins = base_coins * rarity.coin_multiplier_tenths() / 10;

        Rewards {
            xp: clamp_u32(xp),
            coins: clamp_u32(coins),
        }
    }

    /// Coins paid for selling one creature: base value by rarity times
    /// (level + 1).
    pub fn sell_value(&self, rarity: RarityTier, level: u32) -> u32 {
        rarity.sell_base_value().saturating_mul(level.saturating_add(1))
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
