use schema::{species_key, RarityTier, SpeciesData};
use std::fmt;

// Compiled rarity table and species catalog, generated by build.rs.
include!(concat!(env!("OUT_DIR"), "/generated_data.rs"));

/// Static rarity of a species. Anything unlisted is common.
pub fn rarity_of(species_name: &str) -> RarityTier {
    let key = species_key(species_name);
    RARITY_TABLE
        .get(key.as_str())
        .copied()
        .unwrap_or(RarityTier::Common)
}

/// Species names listed under `tier`, sorted.
pub fn species_in_tier(tier: RarityTier) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = RARITY_TABLE
        .entries()
        .filter(|(_, t)| **t == tier)
        .map(|(name, _)| *name)
        .collect();
    names.sort_unstable();
    names
}

/// Base HP stat, falling back to the `base_hp` field when the stat list
/// does not carry an "hp" entry.
pub fn base_hp(species: &SpeciesData) -> u32 {
    species
        .stats
        .iter()
        .find(|stat| stat.name == "hp")
        .map_or(u32::from(species.base_hp), |stat| u32::from(stat.value))
}

/// Multi-line species card used by the lookup commands.
pub struct SpeciesCard<'a>(pub &'a SpeciesData);

impl fmt::Display for SpeciesCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0;
        writeln!(
            f,
            "{} (#{:03}) [{}]",
            data.display_name(),
            data.id,
            rarity_of(&data.name)
        )?;
        writeln!(f, "--------------------")?;
        writeln!(f, "Type(s): {}", data.types.join(" / "))?;
        if !data.abilities.is_empty() {
            writeln!(f, "Abilities: {}", data.abilities.join(", "))?;
        }
        if data.stats.is_empty() {
            return write!(f, "{:<12} : {}", "HP", data.base_hp);
        }
        writeln!(f, "--------------------")?;
        writeln!(f, "Base Stats:")?;
        const LABEL_WIDTH: usize = 15;
        let mut lines = data.stats.iter().peekable();
        while let Some(stat) = lines.next() {
            write!(f, "{:<LABEL_WIDTH$} : {}", stat.name, stat.value)?;
            if lines.peek().is_some() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
