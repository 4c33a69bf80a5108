//! The durable save: a typed record kept under a single store key.
//!
//! Every mutation goes through [`SaveStore::transact`], which loads the
//! latest persisted value, applies the change, and writes the result back
//! once. A failed operation writes nothing.

pub mod migration;
pub mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

use crate::config::EngineConfig;
use crate::errors::{StoreError, StoreResult};
use ordered_float::OrderedFloat;
use schema::{species_key, BallKind, BaseStat, SpeciesData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Store key holding the whole typed save.
pub const SAVE_KEY: &str = "pkm_save";
pub const SAVE_VERSION: u32 = 1;

/// Progression of one species that has been the active partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureRecord {
    pub level: u32,
    pub xp: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub current_hp: u32,
}

impl CreatureRecord {
    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    /// Heal by up to `amount`, capped at max HP. Returns the HP restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.current_hp;
        self.current_hp = self.current_hp.saturating_add(amount).min(self.max_hp);
        self.current_hp - before
    }

    /// Apply damage, floored at 0. Returns the new HP.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.current_hp = self.current_hp.saturating_sub(amount);
        self.current_hp
    }
}

/// Owned creature counts keyed by lowercase species name. Zero counts are
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "migration::PartyRepr", into = "BTreeMap<String, u32>")]
pub struct PartyLedger {
    counts: BTreeMap<String, u32>,
}

impl PartyLedger {
    pub fn count(&self, species: &str) -> u32 {
        self.counts.get(&species_key(species)).copied().unwrap_or(0)
    }

    pub fn add(&mut self, species: &str, amount: u32) -> u32 {
        if amount == 0 {
            return self.count(species);
        }
        let entry = self.counts.entry(species_key(species)).or_insert(0);
        *entry += amount;
        *entry
    }

    /// Take one creature out. `None` if the species is not held.
    pub fn remove_one(&mut self, species: &str) -> Option<u32> {
        let key = species_key(species);
        let count = self.counts.get_mut(&key)?;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.counts.remove(&key);
        }
        Some(remaining)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl From<PartyLedger> for BTreeMap<String, u32> {
    fn from(party: PartyLedger) -> Self {
        party.counts
    }
}

impl FromIterator<(String, u32)> for PartyLedger {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        let mut party = PartyLedger::default();
        for (species, count) in iter {
            party.add(&species, count);
        }
        party
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub coins: u32,
    pub poke_balls: u32,
    pub great_balls: u32,
    pub ultra_balls: u32,
    pub master_balls: u32,
    pub potions: u32,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            coins: 100,
            poke_balls: 5,
            great_balls: 0,
            ultra_balls: 0,
            master_balls: 0,
            potions: 2,
        }
    }
}

impl Inventory {
    pub fn balls(&self, kind: BallKind) -> u32 {
        match kind {
            BallKind::Poke => self.poke_balls,
            BallKind::Great => self.great_balls,
            BallKind::Ultra => self.ultra_balls,
            BallKind::Master => self.master_balls,
        }
    }

    pub fn balls_mut(&mut self, kind: BallKind) -> &mut u32 {
        match kind {
            BallKind::Poke => &mut self.poke_balls,
            BallKind::Great => &mut self.great_balls,
            BallKind::Ultra => &mut self.ultra_balls,
            BallKind::Master => &mut self.master_balls,
        }
    }

    pub fn total_balls(&self) -> u32 {
        self.poke_balls + self.great_balls + self.ultra_balls + self.master_balls
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokedexEntry {
    pub id: u16,
    pub name: String,
    #[serde(default, alias = "spriteUrl")]
    pub sprite_ref: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub stats: Vec<BaseStat>,
}

impl PokedexEntry {
    pub fn from_species(species: &SpeciesData) -> Self {
        Self {
            id: species.id,
            name: species.display_name(),
            sprite_ref: species.sprite_ref.clone(),
            types: species.types.clone(),
            abilities: species.abilities.clone(),
            stats: species.stats.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sound_on: bool,
    pub volume: OrderedFloat<f64>,
    pub random_battles: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_on: true,
            volume: OrderedFloat(0.4),
            random_battles: false,
        }
    }
}

impl Settings {
    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_finite() { volume } else { 0.0 };
        self.volume = OrderedFloat(volume.clamp(0.0, 1.0));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveData {
    pub version: u32,
    pub creatures: BTreeMap<String, CreatureRecord>,
    pub party: PartyLedger,
    pub inventory: Inventory,
    pub active_partner: Option<String>,
    pub pokedex: Vec<PokedexEntry>,
    /// Epoch milliseconds at which the next PokéStop claim opens.
    pub pokestop_cooldown_ms: u64,
    pub settings: Settings,
}

impl Default for SaveData {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            creatures: BTreeMap::new(),
            party: PartyLedger::default(),
            inventory: Inventory::default(),
            active_partner: None,
            pokedex: Vec::new(),
            pokestop_cooldown_ms: 0,
            settings: Settings::default(),
        }
    }
}

impl SaveData {
    pub fn new_game(config: &EngineConfig) -> Self {
        Self {
            inventory: config.starting_inventory.clone(),
            ..Self::default()
        }
    }

    pub fn creature(&self, species: &str) -> Option<&CreatureRecord> {
        self.creatures.get(&species_key(species))
    }

    /// The active partner's key and record.
    pub fn partner(&self) -> Option<(&str, &CreatureRecord)> {
        let key = self.active_partner.as_deref()?;
        self.creatures.get(key).map(|record| (key, record))
    }

    pub fn partner_mut(&mut self) -> Option<&mut CreatureRecord> {
        let key = self.active_partner.as_deref()?;
        self.creatures.get_mut(key)
    }

    /// Level used for pricing: the tracked level, or 1 if never tracked.
    pub fn level_of(&self, species: &str) -> u32 {
        self.creature(species).map_or(1, |record| record.level)
    }

    /// Append to the Pokédex unless the name is already recorded.
    pub fn record_pokedex(&mut self, entry: PokedexEntry) -> bool {
        let known = self
            .pokedex
            .iter()
            .any(|existing| existing.name.eq_ignore_ascii_case(&entry.name));
        if known {
            return false;
        }
        self.pokedex.push(entry);
        true
    }
}

/// Typed access to the save over any [`KeyValueStore`].
#[derive(Debug)]
pub struct SaveStore<S> {
    store: S,
    config: EngineConfig,
}

impl<S: KeyValueStore> SaveStore<S> {
    /// Open the save, importing the legacy layout on first use.
    pub fn open(mut store: S, config: EngineConfig) -> StoreResult<Self> {
        if store.get(SAVE_KEY)?.is_none() {
            let data = if migration::has_legacy_keys(&store)? {
                let imported = migration::import_legacy(&store, &config)?;
                info!(
                    party = imported.party.total(),
                    creatures = imported.creatures.len(),
                    "imported legacy save"
                );
                imported
            } else {
                debug!("starting a fresh save");
                SaveData::new_game(&config)
            };
            store.set_record(SAVE_KEY, &data)?;
        }
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The latest persisted save.
    pub fn load(&self) -> StoreResult<SaveData> {
        match self.store.get_record::<SaveData>(SAVE_KEY)? {
            Some(data) => Ok(data),
            None => Ok(SaveData::new_game(&self.config)),
        }
    }

    /// Read-modify-write. The closure sees the latest persisted save; its
    /// changes are written back in one write only when it succeeds.
    pub fn transact<T, E>(&mut self, op: impl FnOnce(&mut SaveData) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut data = self.load()?;
        let result = op(&mut data)?;
        self.store.set_record(SAVE_KEY, &data)?;
        Ok(result)
    }

    /// Wipe back to a new game.
    pub fn reset(&mut self) -> StoreResult<()> {
        for key in self.store.keys()? {
            if key.starts_with("pkm_") {
                self.store.remove(&key)?;
            }
        }
        self.store.set_record(SAVE_KEY, &SaveData::new_game(&self.config))?;
        info!("save reset to defaults");
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}
