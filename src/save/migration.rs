//! One-shot import of the legacy per-key layout into [`SaveData`].
//!
//! The old layout kept each counter under its own `pkm_*` key, stored most
//! values as strings, and at one point stored the party as a list of
//! duplicate names instead of a species to count map. Both party shapes are
//! accepted here and wherever a party is deserialized.

use super::store::KeyValueStore;
use super::{CreatureRecord, PartyLedger, PokedexEntry, SaveData};
use crate::config::EngineConfig;
use crate::errors::StoreResult;
use schema::species_key;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const LEGACY_COINS: &str = "pkm_coins";
pub const LEGACY_BALLS: &str = "pkm_balls";
pub const LEGACY_GREAT_BALLS: &str = "pkm_great_balls";
pub const LEGACY_ULTRA_BALLS: &str = "pkm_ultra_balls";
pub const LEGACY_MASTER_BALLS: &str = "pkm_master_balls";
pub const LEGACY_POTIONS: &str = "pkm_potions";
pub const LEGACY_PARTY: &str = "pkm_party";
pub const LEGACY_STARTER: &str = "pkm_starter";
pub const LEGACY_STATS: &str = "pkm_stats";
pub const LEGACY_POKEDEX: &str = "pkm_pokedex";
pub const LEGACY_POKESTOP_COOLDOWN: &str = "pkm_pokestop_cooldown";
pub const LEGACY_SOUND_ON: &str = "pkm_sound_on";
pub const LEGACY_VOLUME: &str = "pkm_volume";
pub const LEGACY_RANDOM_BATTLES: &str = "pkm_random_battles";

pub const LEGACY_KEYS: [&str; 14] = [
    LEGACY_COINS,
    LEGACY_BALLS,
    LEGACY_GREAT_BALLS,
    LEGACY_ULTRA_BALLS,
    LEGACY_MASTER_BALLS,
    LEGACY_POTIONS,
    LEGACY_PARTY,
    LEGACY_STARTER,
    LEGACY_STATS,
    LEGACY_POKEDEX,
    LEGACY_POKESTOP_COOLDOWN,
    LEGACY_SOUND_ON,
    LEGACY_VOLUME,
    LEGACY_RANDOM_BATTLES,
];

/// Either party shape as it may appear on disk.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PartyRepr {
    List(Vec<String>),
    Map(BTreeMap<String, f64>),
}

impl From<PartyRepr> for PartyLedger {
    fn from(repr: PartyRepr) -> Self {
        let mut party = PartyLedger::default();
        match repr {
            PartyRepr::List(names) => {
                for name in names.iter().filter(|n| !n.trim().is_empty()) {
                    party.add(name, 1);
                }
            }
            PartyRepr::Map(counts) => {
                for (name, count) in counts {
                    let count = count.floor();
                    if name.trim().is_empty() || !count.is_finite() || count < 1.0 {
                        continue;
                    }
                    party.add(&name, count.min(u32::MAX as f64) as u32);
                }
            }
        }
        party
    }
}

/// The subset of a legacy per-species stats object that carries over.
#[derive(Debug, Deserialize)]
struct LegacyStats {
    #[serde(default)]
    xp: Option<f64>,
    #[serde(default)]
    level: Option<f64>,
    #[serde(default)]
    hp: Option<f64>,
    #[serde(default)]
    atk: Option<f64>,
    #[serde(default, rename = "currentHP")]
    current_hp: Option<f64>,
}

impl LegacyStats {
    fn into_record(self, config: &EngineConfig) -> CreatureRecord {
        let defaults = &config.default_partner;
        let whole = |v: Option<f64>, fallback: u32| {
            v.filter(|f| f.is_finite() && *f >= 0.0)
                .map_or(fallback, |f| f.floor().min(u32::MAX as f64) as u32)
        };
        let max_hp = whole(self.hp, defaults.max_hp);
        CreatureRecord {
            level: whole(self.level, defaults.level).max(1),
            xp: whole(self.xp, defaults.xp),
            max_hp,
            attack: whole(self.atk, defaults.attack),
            current_hp: whole(self.current_hp, max_hp).min(max_hp),
        }
    }
}

pub fn has_legacy_keys<S: KeyValueStore>(store: &S) -> StoreResult<bool> {
    for key in LEGACY_KEYS {
        if store.get(key)?.is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Build a [`SaveData`] from the legacy keys. Absent keys take defaults and
/// unreadable values are skipped with a warning.
pub fn import_legacy<S: KeyValueStore>(store: &S, config: &EngineConfig) -> StoreResult<SaveData> {
    let mut data = SaveData::new_game(config);
    let start = &config.starting_inventory;
    let counter = |key: &str, default: u32| -> StoreResult<u32> {
        let value = store.get_int(key, i64::from(default))?;
        Ok(value.clamp(0, i64::from(u32::MAX)) as u32)
    };

    data.inventory.coins = counter(LEGACY_COINS, start.coins)?;
    data.inventory.poke_balls = counter(LEGACY_BALLS, start.poke_balls)?;
    data.inventory.great_balls = counter(LEGACY_GREAT_BALLS, start.great_balls)?;
    data.inventory.ultra_balls = counter(LEGACY_ULTRA_BALLS, start.ultra_balls)?;
    data.inventory.master_balls = counter(LEGACY_MASTER_BALLS, start.master_balls)?;
    data.inventory.potions = counter(LEGACY_POTIONS, start.potions)?;
    data.pokestop_cooldown_ms = store.get_int(LEGACY_POKESTOP_COOLDOWN, 0)?.max(0) as u64;

    data.party = match store.get_record::<PartyLedger>(LEGACY_PARTY) {
        Ok(party) => party.unwrap_or_default(),
        Err(err) => {
            warn!(error = %err, "legacy party unreadable, starting empty");
            PartyLedger::default()
        }
    };

    data.creatures = import_stats(store, config)?;

    if let Some(Value::String(starter)) = store.get(LEGACY_STARTER)? {
        let key = species_key(&starter);
        if !key.is_empty() {
            data.creatures
                .entry(key.clone())
                .or_insert_with(|| config.default_partner.record());
            data.active_partner = Some(key);
        }
    }

    if let Ok(Some(entries)) = store.get_record::<Vec<Value>>(LEGACY_POKEDEX) {
        for entry in entries {
            match serde_json::from_value::<PokedexEntry>(entry) {
                Ok(entry) => {
                    data.record_pokedex(entry);
                }
                Err(err) => debug!(error = %err, "skipping unreadable pokedex entry"),
            }
        }
    }

    data.settings.sound_on = store.get_bool(LEGACY_SOUND_ON, data.settings.sound_on)?;
    data.settings.random_battles =
        store.get_bool(LEGACY_RANDOM_BATTLES, data.settings.random_battles)?;
    if let Some(volume) = store.get(LEGACY_VOLUME)?.as_ref().and_then(float_value) {
        data.settings.set_volume(volume);
    }

    Ok(data)
}

fn import_stats<S: KeyValueStore>(
    store: &S,
    config: &EngineConfig,
) -> StoreResult<BTreeMap<String, CreatureRecord>> {
    let raw = match store.get_record::<BTreeMap<String, Value>>(LEGACY_STATS) {
        Ok(raw) => raw.unwrap_or_default(),
        Err(err) => {
            warn!(error = %err, "legacy stats unreadable, starting empty");
            BTreeMap::new()
        }
    };

    let mut creatures = BTreeMap::new();
    for (name, value) in raw {
        // Early versions kept bare `hp`/`atk` numbers at the top level.
        if !value.is_object() {
            continue;
        }
        match serde_json::from_value::<LegacyStats>(value) {
            Ok(stats) => {
                creatures.insert(species_key(&name), stats.into_record(config));
            }
            Err(err) => warn!(species = %name, error = %err, "skipping legacy stats"),
        }
    }
    Ok(creatures)
}

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::{MemoryStore, SaveStore};
    use ordered_float::OrderedFloat;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn party_of(pairs: &[(&str, u32)]) -> PartyLedger {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_list_party_becomes_counts() {
        let store = MemoryStore::with_values([(
            LEGACY_PARTY,
            json!(["Pidgey", "pidgey", "Eevee", "PIDGEY"]),
        )]);
        let data = import_legacy(&store, &EngineConfig::default()).unwrap();
        assert_eq!(data.party, party_of(&[("pidgey", 3), ("eevee", 1)]));
    }

    #[test]
    fn test_list_party_stored_as_text() {
        let store =
            MemoryStore::with_values([(LEGACY_PARTY, json!("[\"Rattata\",\"rattata\"]"))]);
        let data = import_legacy(&store, &EngineConfig::default()).unwrap();
        assert_eq!(data.party.count("rattata"), 2);
    }

    #[test]
    fn test_map_party_drops_non_positive_counts() {
        let store = MemoryStore::with_values([(
            LEGACY_PARTY,
            json!({"Gastly": 2, "magikarp": 0, "riolu": -3}),
        )]);
        let data = import_legacy(&store, &EngineConfig::default()).unwrap();
        assert_eq!(data.party, party_of(&[("gastly", 2)]));
    }

    #[test]
    fn test_counters_and_settings_carry_over() {
        let store = MemoryStore::with_values([
            (LEGACY_COINS, json!("340")),
            (LEGACY_BALLS, json!(0)),
            (LEGACY_MASTER_BALLS, json!(1)),
            (LEGACY_POKESTOP_COOLDOWN, json!(1_700_000_000_000_i64)),
            (LEGACY_SOUND_ON, json!("false")),
            (LEGACY_VOLUME, json!("0.75")),
            (LEGACY_RANDOM_BATTLES, json!("true")),
        ]);
        let data = import_legacy(&store, &EngineConfig::default()).unwrap();
        assert_eq!(data.inventory.coins, 340);
        assert_eq!(data.inventory.poke_balls, 0);
        assert_eq!(data.inventory.master_balls, 1);
        assert_eq!(data.inventory.potions, 2);
        assert_eq!(data.pokestop_cooldown_ms, 1_700_000_000_000);
        assert!(!data.settings.sound_on);
        assert!(data.settings.random_battles);
        assert_eq!(data.settings.volume, OrderedFloat(0.75));
    }

    #[test]
    fn test_stats_and_starter_import() {
        let store = MemoryStore::with_values([
            (
                LEGACY_STATS,
                json!({
                    "hp": 100,
                    "atk": 15,
                    "Charmander": {"xp": 40, "level": 7, "hp": 160, "atk": 45, "currentHP": 12},
                    "squirtle": {"xp": 0, "level": 2, "hp": 110, "atk": 20, "currentHP": null}
                }),
            ),
            (LEGACY_STARTER, json!("Charmander")),
        ]);
        let data = import_legacy(&store, &EngineConfig::default()).unwrap();
        assert_eq!(data.creatures.len(), 2);
        assert_eq!(
            data.creature("charmander"),
            Some(&CreatureRecord {
                level: 7,
                xp: 40,
                max_hp: 160,
                attack: 45,
                current_hp: 12,
            })
        );
        assert_eq!(data.creature("squirtle").map(|r| r.current_hp), Some(110));
        assert_eq!(data.active_partner.as_deref(), Some("charmander"));
    }

    #[test]
    fn test_starter_without_stats_gets_default_record() {
        let store = MemoryStore::with_values([(LEGACY_STARTER, json!("Pikachu"))]);
        let data = import_legacy(&store, &EngineConfig::default()).unwrap();
        assert_eq!(
            data.creature("pikachu"),
            Some(&EngineConfig::default().default_partner.record())
        );
    }

    #[test]
    fn test_pokedex_import_skips_bad_entries() {
        let store = MemoryStore::with_values([(
            LEGACY_POKEDEX,
            json!([
                {"id": 16, "name": "Pidgey", "spriteUrl": "p.png", "types": ["normal", "flying"]},
                {"name": "no id"},
                {"id": 16, "name": "pidgey", "types": []}
            ]),
        )]);
        let data = import_legacy(&store, &EngineConfig::default()).unwrap();
        assert_eq!(data.pokedex.len(), 1);
        assert_eq!(data.pokedex[0].sprite_ref.as_deref(), Some("p.png"));
    }

    #[test]
    fn test_migration_runs_once() {
        let backend = MemoryStore::with_values([(LEGACY_PARTY, json!(["eevee"]))]);
        let mut store = SaveStore::open(backend, EngineConfig::default()).unwrap();
        store
            .transact(|data| {
                data.party.remove_one("eevee");
                Ok::<_, crate::errors::StoreError>(())
            })
            .unwrap();

        // The legacy key is still there, but the typed save now wins.
        let reopened = SaveStore::open(store.into_inner(), EngineConfig::default()).unwrap();
        assert!(reopened.load().unwrap().party.is_empty());
    }

    #[test]
    fn test_list_party_inside_typed_save() {
        let backend = MemoryStore::with_values([(
            crate::save::SAVE_KEY,
            json!({"party": ["Eevee", "eevee"], "inventory": {"coins": 7}}),
        )]);
        let store = SaveStore::open(backend, EngineConfig::default()).unwrap();
        let data = store.load().unwrap();
        assert_eq!(data.party.count("eevee"), 2);
        assert_eq!(data.inventory.coins, 7);
        assert_eq!(data.inventory.poke_balls, 5);
    }
}
