use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BallKind {
    #[strum(to_string = "poke", serialize = "base", serialize = "pokeball")]
    Poke,
    Great,
    Ultra,
    Master,
}

impl BallKind {
    /// Flat bonus added to the capture chance.
    pub fn catch_bonus(self) -> f64 {
        match self {
            BallKind::Poke => 0.0,
            BallKind::Great => 0.15,
            BallKind::Ultra => 0.30,
            BallKind::Master => 0.0,
        }
    }

    /// Master balls skip the capture formula entirely.
    pub fn guarantees_catch(self) -> bool {
        matches!(self, BallKind::Master)
    }

    pub fn label(self) -> &'static str {
        match self {
            BallKind::Poke => "Poké Ball",
            BallKind::Great => "Great Ball",
            BallKind::Ultra => "Ultra Ball",
            BallKind::Master => "Master Ball",
        }
    }

    /// Ball kinds a PokéStop can hand out.
    pub const POKESTOP_REWARDS: [BallKind; 3] = [BallKind::Poke, BallKind::Great, BallKind::Ultra];
}

/// Items sold in the shop.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ShopItem {
    #[strum(to_string = "pokeball", serialize = "poke", serialize = "ball")]
    PokeBall,
    #[strum(to_string = "greatball", serialize = "great")]
    GreatBall,
    #[strum(to_string = "ultraball", serialize = "ultra")]
    UltraBall,
    Potion,
}

impl ShopItem {
    pub fn label(self) -> &'static str {
        match self {
            ShopItem::PokeBall => "Poké Ball",
            ShopItem::GreatBall => "Great Ball",
            ShopItem::UltraBall => "Ultra Ball",
            ShopItem::Potion => "Potion",
        }
    }

    pub fn ball_kind(self) -> Option<BallKind> {
        match self {
            ShopItem::PokeBall => Some(BallKind::Poke),
            ShopItem::GreatBall => Some(BallKind::Great),
            ShopItem::UltraBall => Some(BallKind::Ultra),
            ShopItem::Potion => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_ball_aliases() {
        assert_eq!(BallKind::from_str("base"), Ok(BallKind::Poke));
        assert_eq!(BallKind::from_str("POKE"), Ok(BallKind::Poke));
        assert_eq!(BallKind::from_str("ultra"), Ok(BallKind::Ultra));
        assert_eq!(BallKind::Poke.to_string(), "poke");
        assert!(BallKind::from_str("premier").is_err());
    }

    #[test]
    fn test_master_ball_is_the_only_guarantee() {
        assert!(BallKind::Master.guarantees_catch());
        assert!(!BallKind::Ultra.guarantees_catch());
    }

    #[test]
    fn test_shop_items_map_to_balls() {
        assert_eq!(ShopItem::from_str("great"), Ok(ShopItem::GreatBall));
        assert_eq!(ShopItem::GreatBall.ball_kind(), Some(BallKind::Great));
        assert_eq!(ShopItem::Potion.ball_kind(), None);
    }
}
