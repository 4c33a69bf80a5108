use super::Ledger;
use crate::errors::{GameError, GameResult};
use crate::progression::{gain_xp, LevelUp, Rewards};
use crate::save::{CreatureRecord, KeyValueStore};
use schema::{BallKind, ShopItem};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub item: ShopItem,
    pub price: u32,
    pub coins_left: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotionReceipt {
    pub healed: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub potions_left: u32,
}

impl<S: KeyValueStore> Ledger<S> {
    /// Buy one item from the shop.
    pub fn buy(&mut self, item: ShopItem) -> GameResult<Purchase> {
        let price = self.config().prices.price_of(item);
        let purchase = self.transact(|data| {
            if data.inventory.coins < price {
                return Err(GameError::exhausted("coins"));
            }
            data.inventory.coins -= price;
            match item.ball_kind() {
                Some(kind) => *data.inventory.balls_mut(kind) += 1,
                None => data.inventory.potions += 1,
            }
            Ok(Purchase {
                item,
                price,
                coins_left: data.inventory.coins,
            })
        })?;
        info!(item = %item, price, coins_left = purchase.coins_left, "bought");
        Ok(purchase)
    }

    /// Spend one ball of `kind`. Returns how many are left.
    pub fn consume_ball(&mut self, kind: BallKind) -> GameResult<u32> {
        self.transact(|data| {
            let balls = data.inventory.balls_mut(kind);
            if *balls == 0 {
                return Err(GameError::exhausted(kind.label()));
            }
            *balls -= 1;
            debug!(ball = %kind, left = *balls, "ball used");
            Ok(*balls)
        })
    }

    /// Spend one potion healing the partner by `heal`, capped at max HP.
    pub fn use_potion(&mut self, heal: u32) -> GameResult<PotionReceipt> {
        self.transact(|data| {
            if data.inventory.potions == 0 {
                return Err(GameError::exhausted("Potions"));
            }
            data.inventory.potions -= 1;
            let potions_left = data.inventory.potions;
            let partner = data.partner_mut().ok_or(GameError::NoPartner)?;
            let healed = partner.heal(heal);
            debug!(healed, hp = partner.current_hp, "potion used");
            Ok(PotionReceipt {
                healed,
                hp: partner.current_hp,
                max_hp: partner.max_hp,
                potions_left,
            })
        })
    }

    /// Apply wild damage to the partner and persist it immediately.
    pub fn damage_partner(&mut self, amount: u32) -> GameResult<CreatureRecord> {
        self.transact(|data| {
            let partner = data.partner_mut().ok_or(GameError::NoPartner)?;
            partner.take_damage(amount);
            Ok(partner.clone())
        })
    }

    /// Credit victory coins and route the XP through the leveling loop, in
    /// one write. Returns every level-up, in order.
    pub fn award_victory(&mut self, rewards: Rewards) -> GameResult<Vec<LevelUp>> {
        let level_ups = self.transact(|data| {
            let partner = data.partner_mut().ok_or(GameError::NoPartner)?;
            let level_ups = gain_xp(partner, rewards.xp);
            data.inventory.coins = data.inventory.coins.saturating_add(rewards.coins);
            Ok(level_ups)
        })?;
        info!(
            xp = rewards.xp,
            coins = rewards.coins,
            level_ups = level_ups.len(),
            "victory rewards"
        );
        Ok(level_ups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_support::{ledger, ledger_with_partner};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn wounded(current_hp: u32) -> CreatureRecord {
        CreatureRecord {
            level: 5,
            xp: 0,
            max_hp: 140,
            attack: 35,
            current_hp,
        }
    }

    #[rstest]
    #[case(ShopItem::PokeBall, 20)]
    #[case(ShopItem::GreatBall, 50)]
    #[case(ShopItem::UltraBall, 100)]
    #[case(ShopItem::Potion, 10)]
    fn test_buy_deducts_price(#[case] item: ShopItem, #[case] price: u32) {
        let mut ledger = ledger();
        let before = ledger.snapshot().unwrap().inventory;
        let purchase = ledger.buy(item).unwrap();
        assert_eq!(purchase.price, price);
        assert_eq!(purchase.coins_left, 100 - price);

        let after = ledger.snapshot().unwrap().inventory;
        match item.ball_kind() {
            Some(kind) => assert_eq!(after.balls(kind), before.balls(kind) + 1),
            None => assert_eq!(after.potions, before.potions + 1),
        }
    }

    #[test]
    fn test_buy_without_coins_is_refused() {
        let mut ledger = ledger();
        ledger.buy(ShopItem::UltraBall).unwrap();
        let before = ledger.snapshot().unwrap();
        let err = ledger.buy(ShopItem::GreatBall).unwrap_err();
        assert_eq!(err.to_string(), "No coins left!");
        assert_eq!(ledger.snapshot().unwrap(), before);
    }

    #[test]
    fn test_consume_ball_until_empty() {
        let mut ledger = ledger();
        for expected in (0..5).rev() {
            assert_eq!(ledger.consume_ball(BallKind::Poke).unwrap(), expected);
        }
        let err = ledger.consume_ball(BallKind::Poke).unwrap_err();
        assert!(matches!(err, GameError::ResourceExhausted { .. }));
        assert!(matches!(
            ledger.consume_ball(BallKind::Master),
            Err(GameError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_potion_heals_up_to_max() {
        let mut ledger = ledger_with_partner("eevee", wounded(120));
        let receipt = ledger.use_potion(30).unwrap();
        assert_eq!(
            receipt,
            PotionReceipt {
                healed: 20,
                hp: 140,
                max_hp: 140,
                potions_left: 1,
            }
        );
    }

    #[test]
    fn test_potion_revives_fainted_partner() {
        let mut ledger = ledger_with_partner("eevee", wounded(0));
        assert_eq!(ledger.use_potion(30).unwrap().hp, 30);
    }

    #[test]
    fn test_no_potions_is_refused_without_mutation() {
        let mut ledger = ledger_with_partner("eevee", wounded(10));
        ledger.use_potion(30).unwrap();
        ledger.use_potion(30).unwrap();
        let before = ledger.snapshot().unwrap();
        assert!(matches!(
            ledger.use_potion(30),
            Err(GameError::ResourceExhausted { .. })
        ));
        assert_eq!(ledger.snapshot().unwrap(), before);
    }

    #[test]
    fn test_damage_is_persisted_and_floored() {
        let mut ledger = ledger_with_partner("eevee", wounded(12));
        assert_eq!(ledger.damage_partner(5).unwrap().current_hp, 7);
        assert_eq!(ledger.damage_partner(50).unwrap().current_hp, 0);
        assert_eq!(ledger.partner().unwrap().1.current_hp, 0);
    }

    #[test]
    fn test_award_victory_levels_and_pays() {
        let mut ledger = ledger_with_partner("eevee", wounded(50));
        // Level 5 needs 175, level 6 needs 200.
        let ups = ledger.award_victory(Rewards { xp: 400, coins: 26 }).unwrap();
        assert_eq!(ups.iter().map(|u| u.new_level).collect::<Vec<_>>(), vec![6, 7]);
        let data = ledger.snapshot().unwrap();
        assert_eq!(data.inventory.coins, 126);
        let partner = data.creature("eevee").unwrap();
        assert_eq!(partner.xp, 25);
        assert_eq!(partner.max_hp, 160);
        assert_eq!(partner.current_hp, 50);
    }

    #[test]
    fn test_award_without_partner_pays_nothing() {
        let mut ledger = ledger();
        assert!(matches!(
            ledger.award_victory(Rewards { xp: 10, coins: 10 }),
            Err(GameError::NoPartner)
        ));
        assert_eq!(ledger.snapshot().unwrap().inventory.coins, 100);
    }
}
