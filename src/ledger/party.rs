use super::Ledger;
use crate::errors::{GameError, GameResult, StoreResult};
use crate::progression::evolution::{apply_evolution, Evolution};
use crate::progression::RewardCalculator;
use crate::save::{KeyValueStore, PokedexEntry};
use crate::species::rarity_of;
use schema::{species_key, EvolutionChain, RarityTier, SpeciesData};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchReceipt {
    pub species: String,
    pub count: u32,
    pub new_pokedex_entry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReceipt {
    pub species: String,
    pub coins: u32,
    pub remaining: u32,
    pub coins_total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
    pub species: String,
    pub previous: Option<String>,
}

/// Bag ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BagSort {
    #[default]
    Name,
    /// Rarest first.
    Rarity,
    /// Largest stack first.
    Quantity,
}

impl FromStr for BagSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "name" => Ok(BagSort::Name),
            "rarity" => Ok(BagSort::Rarity),
            "quantity" | "qty" | "count" => Ok(BagSort::Quantity),
            other => Err(format!("unknown sort '{}', use name, rarity or quantity", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagEntry {
    pub species: String,
    pub count: u32,
    pub rarity: RarityTier,
    pub level: u32,
    pub sell_value: u32,
}

impl<S: KeyValueStore> Ledger<S> {
    /// Add a caught creature to the party and record it in the Pokédex.
    pub fn record_catch(&mut self, species: &SpeciesData) -> GameResult<CatchReceipt> {
        let key = species.key();
        let receipt = self.transact(|data| {
            let count = data.party.add(&key, 1);
            let new_pokedex_entry = data.record_pokedex(PokedexEntry::from_species(species));
            Ok(CatchReceipt {
                species: key.clone(),
                count,
                new_pokedex_entry,
            })
        })?;
        info!(species = %receipt.species, count = receipt.count, "caught");
        Ok(receipt)
    }

    /// Sell one creature for `base value by rarity * (level + 1)` coins.
    pub fn sell(&mut self, species: &str) -> GameResult<SaleReceipt> {
        let key = species_key(species);
        let receipt = self.transact(|data| {
            let remaining = data
                .party
                .remove_one(&key)
                .ok_or_else(|| GameError::invalid_selection(schema::display_name(&key)))?;
            let coins = RewardCalculator.sell_value(rarity_of(&key), data.level_of(&key));
            data.inventory.coins = data.inventory.coins.saturating_add(coins);
            Ok(SaleReceipt {
                species: key.clone(),
                coins,
                remaining,
                coins_total: data.inventory.coins,
            })
        })?;
        info!(species = %receipt.species, coins = receipt.coins, "sold");
        Ok(receipt)
    }

    /// Promote a party member to active partner.
    ///
    /// The outgoing partner goes back into the party and the incoming one
    /// leaves it, both in the same write, so the number of creatures owned
    /// never changes. Choosing the current partner is a no-op.
    pub fn set_active(&mut self, species: &str) -> GameResult<SwapReceipt> {
        let key = species_key(species);
        let default_record = self.config().default_partner.record();
        let receipt = self.transact(|data| {
            let previous = data.active_partner.clone();
            if previous.as_deref() == Some(key.as_str()) {
                return Ok(SwapReceipt {
                    species: key.clone(),
                    previous: None,
                });
            }
            if data.party.count(&key) == 0 {
                return Err(GameError::invalid_selection(schema::display_name(&key)));
            }
            if let Some(previous) = &previous {
                data.party.add(previous, 1);
            }
            data.party.remove_one(&key);
            data.creatures
                .entry(key.clone())
                .or_insert(default_record);
            data.active_partner = Some(key.clone());
            Ok(SwapReceipt {
                species: key.clone(),
                previous,
            })
        })?;
        info!(species = %receipt.species, previous = ?receipt.previous, "partner set");
        Ok(receipt)
    }

    /// First partner of a new game. Refused once a partner exists.
    pub fn choose_starter(&mut self, species: &SpeciesData) -> GameResult<String> {
        let key = species.key();
        let default_record = self.config().default_partner.record();
        self.transact(|data| {
            if let Some(current) = &data.active_partner {
                return Err(GameError::OutOfTurn {
                    phase: format!("{} is already your partner", schema::display_name(current)),
                });
            }
            data.creatures
                .entry(key.clone())
                .or_insert(default_record);
            data.active_partner = Some(key.clone());
            data.record_pokedex(PokedexEntry::from_species(species));
            Ok(())
        })?;
        info!(species = %key, "starter chosen");
        Ok(key)
    }

    /// Evolve the partner along `chain` if it still qualifies. All or nothing.
    pub fn evolve_partner(
        &mut self,
        expected_partner: &str,
        chain: &EvolutionChain,
    ) -> GameResult<Option<Evolution>> {
        self.transact(|data| Ok(apply_evolution(data, expected_partner, chain)))
    }

    pub fn bag(&self, sort: BagSort) -> StoreResult<Vec<BagEntry>> {
        let data = self.snapshot()?;
        let mut entries: Vec<BagEntry> = data
            .party
            .iter()
            .map(|(species, count)| {
                let rarity = rarity_of(species);
                let level = data.level_of(species);
                BagEntry {
                    species: species.to_string(),
                    count,
                    rarity,
                    level,
                    sell_value: RewardCalculator.sell_value(rarity, level),
                }
            })
            .collect();

        // The party iterates in name order, and the sorts below are stable.
        match sort {
            BagSort::Name => {}
            BagSort::Rarity => entries.sort_by_key(|e| Reverse(e.rarity)),
            BagSort::Quantity => entries.sort_by_key(|e| Reverse(e.count)),
        }
        debug!(?sort, entries = entries.len(), "bag listed");
        Ok(entries)
    }
}
