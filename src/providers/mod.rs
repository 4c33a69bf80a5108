//! Species data providers.
//!
//! The engine only ever sees [`SpeciesData`] and [`EvolutionChain`]; where
//! they come from is up to the provider. Lookups are async and may fail,
//! in which case the operation that needed them is abandoned.

pub mod catalog;
pub mod pokeapi;

pub use catalog::CatalogProvider;
pub use pokeapi::PokeApiProvider;

use crate::errors::ProviderResult;
use schema::{species_key, EvolutionChain, SpeciesData};
use std::fmt;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeciesQuery {
    Id(u16),
    Name(String),
}

impl SpeciesQuery {
    pub fn name(name: &str) -> Self {
        SpeciesQuery::Name(species_key(name))
    }
}

impl fmt::Display for SpeciesQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeciesQuery::Id(id) => write!(f, "{}", id),
            SpeciesQuery::Name(name) => write!(f, "{}", name),
        }
    }
}

pub trait SpeciesProvider: Send + Sync + 'static {
    fn species(
        &self,
        query: SpeciesQuery,
    ) -> impl Future<Output = ProviderResult<SpeciesData>> + Send;

    fn evolution_chain(
        &self,
        chain_ref: &str,
    ) -> impl Future<Output = ProviderResult<EvolutionChain>> + Send;
}

/// Look up `species` and then its evolution chain. `None` when the species
/// has no chain.
pub async fn chain_for_species<P: SpeciesProvider>(
    provider: &P,
    species: &str,
) -> ProviderResult<Option<EvolutionChain>> {
    let data = provider.species(SpeciesQuery::name(species)).await?;
    match data.evolution_chain_ref {
        Some(chain_ref) => provider.evolution_chain(&chain_ref).await.map(Some),
        None => Ok(None),
    }
}
