//! Engine tunables, loaded from RON.
//!
//! Every field has a default, so a missing file or a partial one both work.
//! Formula constants (XP curve, capture clamp, rarity multipliers) are not
//! tunables and live next to the code that uses them.

use crate::save::{CreatureRecord, Inventory};
use schema::ShopItem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wild max HP is `base_hp + partner_level * wild_hp_per_level`.
    pub wild_hp_per_level: u32,
    /// Encounters draw a species id uniformly from `1..=max_wild_species_id`.
    pub max_wild_species_id: u16,
    pub turn_delay_ms: u64,
    pub close_delay_ms: u64,
    pub flee_close_delay_ms: u64,
    pub potion_heal: u32,
    pub sleep_powder_turns: u32,
    pub starting_inventory: Inventory,
    pub default_partner: PartnerDefaults,
    pub pokestop: PokestopConfig,
    /// Inclusive-exclusive bounds, in seconds.
    pub random_battle_secs: (u64, u64),
    pub prices: Prices,
    pub save_path: PathBuf,
    pub provider: ProviderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wild_hp_per_level: 8,
            max_wild_species_id: 649,
            turn_delay_ms: 500,
            close_delay_ms: 1500,
            flee_close_delay_ms: 500,
            potion_heal: 30,
            sleep_powder_turns: 1,
            starting_inventory: Inventory::default(),
            default_partner: PartnerDefaults::default(),
            pokestop: PokestopConfig::default(),
            random_battle_secs: (60, 600),
            prices: Prices::default(),
            save_path: PathBuf::from("pokemon-companion-save.json"),
            provider: ProviderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a RON document. Omitted fields keep their defaults.
    pub fn from_ron(content: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(content)
    }

    /// Load from `path`, falling back to defaults when the file is absent or
    /// unreadable. A malformed file is logged and ignored.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_ron(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded engine config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "bad engine config, using defaults"
                    );
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "no engine config, using defaults");
                Self::default()
            }
        }
    }

    pub fn turn_delay(&self) -> Duration {
        Duration::from_millis(self.turn_delay_ms)
    }

    pub fn close_delay(&self, fled: bool) -> Duration {
        if fled {
            Duration::from_millis(self.flee_close_delay_ms)
        } else {
            Duration::from_millis(self.close_delay_ms)
        }
    }
}

/// Stats given to a species the first time it becomes the active partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerDefaults {
    pub level: u32,
    pub xp: u32,
    pub max_hp: u32,
    pub attack: u32,
}

impl Default for PartnerDefaults {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            max_hp: 100,
            attack: 15,
        }
    }
}

impl PartnerDefaults {
    pub fn record(&self) -> CreatureRecord {
        CreatureRecord {
            level: self.level.max(1),
            xp: self.xp,
            max_hp: self.max_hp,
            attack: self.attack,
            current_hp: self.max_hp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PokestopConfig {
    /// Inclusive bounds on the number of balls granted.
    pub ball_quantity: (u32, u32),
    /// Inclusive bounds on the coins granted.
    pub coins: (u32, u32),
    pub master_ball_chance: f64,
    /// Inclusive bounds on the next cooldown, in whole minutes.
    pub cooldown_minutes: (u32, u32),
}

impl Default for PokestopConfig {
    fn default() -> Self {
        Self {
            ball_quantity: (1, 5),
            coins: (10, 100),
            master_ball_chance: 0.025,
            cooldown_minutes: (1, 5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prices {
    pub poke_ball: u32,
    pub great_ball: u32,
    pub ultra_ball: u32,
    pub potion: u32,
}

impl Default for Prices {
    fn default() -> Self {
        Self {
            poke_ball: 20,
            great_ball: 50,
            ultra_ball: 100,
            potion: 10,
        }
    }
}

impl Prices {
    pub fn price_of(&self, item: ShopItem) -> u32 {
        match item {
            ShopItem::PokeBall => self.poke_ball,
            ShopItem::GreatBall => self.great_ball,
            ShopItem::UltraBall => self.ultra_ball,
            ShopItem::Potion => self.potion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pokeapi.co/api/v2".to_string(),
            timeout_secs: 10,
        }
    }
}
