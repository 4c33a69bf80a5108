//! Ledger operations over the persisted save.
//!
//! Each public operation is one read-modify-write transaction against the
//! latest persisted value: refusals leave the save untouched, successes
//! write exactly once. Two processes sharing a save file can still race;
//! the last writer wins per operation.

pub mod inventory;
pub mod party;
pub mod pokestop;

pub use inventory::{Purchase, PotionReceipt};
pub use party::{BagEntry, BagSort, CatchReceipt, SaleReceipt, SwapReceipt};
pub use pokestop::{epoch_ms, PokestopReward};

use crate::config::EngineConfig;
use crate::errors::{GameError, GameResult, StoreResult};
use crate::save::{CreatureRecord, KeyValueStore, PokedexEntry, SaveData, SaveStore, Settings};
use tracing::debug;

#[derive(Debug)]
pub struct Ledger<S> {
    save: SaveStore<S>,
}

impl<S: KeyValueStore> Ledger<S> {
    /// Open the ledger, migrating a legacy save on first use.
    pub fn open(store: S, config: EngineConfig) -> StoreResult<Self> {
        Ok(Self {
            save: SaveStore::open(store, config)?,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.save.config()
    }

    /// The latest persisted save, for display.
    pub fn snapshot(&self) -> StoreResult<SaveData> {
        self.save.load()
    }

    pub fn reset(&mut self) -> StoreResult<()> {
        self.save.reset()
    }

    pub(crate) fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut SaveData) -> GameResult<T>,
    ) -> GameResult<T> {
        self.save.transact(op)
    }

    /// Active partner key and record.
    pub fn partner(&self) -> GameResult<(String, CreatureRecord)> {
        let data = self.save.load()?;
        data.partner()
            .map(|(key, record)| (key.to_string(), record.clone()))
            .ok_or(GameError::NoPartner)
    }

    /// Returns false when the name was already recorded.
    pub fn record_pokedex(&mut self, entry: PokedexEntry) -> GameResult<bool> {
        let name = entry.name.clone();
        let added = self.transact(|data| Ok(data.record_pokedex(entry)))?;
        if added {
            debug!(name = %name, "pokedex entry recorded");
        }
        Ok(added)
    }

    pub fn update_settings(&mut self, op: impl FnOnce(&mut Settings)) -> GameResult<Settings> {
        self.transact(|data| {
            op(&mut data.settings);
            Ok(data.settings.clone())
        })
    }

    pub fn into_store(self) -> S {
        self.save.into_inner()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::save::MemoryStore;

    pub fn ledger() -> Ledger<MemoryStore> {
        Ledger::open(MemoryStore::new(), EngineConfig::default()).unwrap()
    }

    /// A ledger whose active partner is `species` with the given record.
    pub fn ledger_with_partner(species: &str, record: CreatureRecord) -> Ledger<MemoryStore> {
        let mut ledger = ledger();
        ledger
            .transact(|data| {
                data.creatures.insert(species.to_string(), record);
                data.active_partner = Some(species.to_string());
                Ok(())
            })
            .unwrap();
        ledger
    }
}
