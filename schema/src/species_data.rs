use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStat {
    pub name: String,
    pub value: u16,
}

/// Everything the engine consumes about a species from a data provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesData {
    pub id: u16,
    pub name: String, // Provider spelling, e.g. "mr-mime"
    pub base_hp: u16,
    pub types: Vec<String>,
    pub abilities: Vec<String>,
    pub stats: Vec<BaseStat>,
    pub sprite_ref: Option<String>,
    pub evolution_chain_ref: Option<String>,
}

impl SpeciesData {
    /// Lowercase key used by every ledger table.
    pub fn key(&self) -> String {
        species_key(&self.name)
    }

    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }
}

/// Normalise a species name into its ledger key.
pub fn species_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// "pikachu" -> "Pikachu". Only the first character is touched.
pub fn display_name(name: &str) -> String {
    let mut chars = name.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    LevelUp,
    Item,
    Trade,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionTrigger {
    pub kind: TriggerKind,
    pub min_level: Option<u32>,
}

impl EvolutionTrigger {
    pub fn level(min_level: u32) -> Self {
        Self {
            kind: TriggerKind::LevelUp,
            min_level: Some(min_level),
        }
    }

    /// The level gate, only for level-up triggers that carry one.
    pub fn required_level(&self) -> Option<u32> {
        match self.kind {
            TriggerKind::LevelUp => self.min_level,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionNode {
    pub species_name: String,
    /// How this node is reached from its parent. `None` on the chain root.
    pub trigger: Option<EvolutionTrigger>,
    pub evolves_to: Vec<EvolutionNode>,
}

impl EvolutionNode {
    /// Depth-first search for the node of `species_name` (case-insensitive).
    pub fn find(&self, species_name: &str) -> Option<&EvolutionNode> {
        if self.species_name.eq_ignore_ascii_case(species_name) {
            return Some(self);
        }
        self.evolves_to
            .iter()
            .find_map(|child| child.find(species_name))
    }

    pub fn is_terminal(&self) -> bool {
        self.evolves_to.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionChain {
    pub chain_ref: String,
    pub root: EvolutionNode,
}

impl EvolutionChain {
    /// The first listed successor of `species_name`, if the species is in
    /// this chain and is not a terminal form.
    pub fn successor_of(&self, species_name: &str) -> Option<&EvolutionNode> {
        self.root
            .find(species_name)
            .and_then(|node| node.evolves_to.first())
    }
}

/// Static classification lists, compiled into a perfect-hash table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RarityTable {
    pub legendary: Vec<String>,
    pub rare: Vec<String>,
    pub uncommon: Vec<String>,
}

/// The offline catalog shipped with the crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeciesCatalog {
    pub species: Vec<SpeciesData>,
    pub chains: Vec<EvolutionChain>,
}
