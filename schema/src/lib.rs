// Pokemon Companion Schema - Shared type definitions
// This crate contains the plain data types shared between the main
// pokemon-companion crate and its build script, so the compiled species
// catalog can round-trip through postcard.

// Re-export the main types
pub use battle_data::*;
pub use items::*;
pub use rarity::*;
pub use species_data::*;

pub mod battle_data;
pub mod items;
pub mod rarity;
pub mod species_data;
