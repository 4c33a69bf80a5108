//! Pokémon Companion
//!
//! Battle and progression engine for a small creature-collecting
//! companion game: wild encounters against species data fetched from a
//! provider, capture and rewards, a persisted party and inventory ledger,
//! and partner leveling with level-gated evolution.

pub mod battle;
pub mod config;
pub mod errors;
pub mod interface;
pub mod ledger;
pub mod logging;
pub mod progression;
pub mod providers;
pub mod save;
pub mod session;
pub mod species;

// --- From the `schema` crate ---
pub use schema::{
    BallKind, EvolutionChain, EvolutionNode, EvolutionTrigger, RarityTier, ShopItem, SoundCue,
    SpeciesData, TriggerKind,
};

// --- From this crate's modules ---
pub use battle::{BattleAction, BattleEngine, BattlePhase, GameEvent, TurnRng, WildEncounter};
pub use config::EngineConfig;
pub use errors::{GameError, GameResult, ProviderError, StoreError};
pub use ledger::{BagSort, Ledger};
pub use progression::{xp_threshold, RewardCalculator};
pub use providers::{CatalogProvider, PokeApiProvider, SpeciesProvider};
pub use save::{FileStore, KeyValueStore, MemoryStore, SaveData};
pub use session::{Intent, Session, SessionHandle, StatusReport};
