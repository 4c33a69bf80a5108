use super::{SpeciesProvider, SpeciesQuery};
use crate::errors::{ProviderError, ProviderResult};
use crate::species::CATALOG_BYTES;
use schema::{species_key, EvolutionChain, SpeciesCatalog, SpeciesData};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::error;

// Decoded once from the blob compiled in by build.rs
static CATALOG: LazyLock<SpeciesCatalog> = LazyLock::new(|| {
    postcard::from_bytes(CATALOG_BYTES).unwrap_or_else(|err| {
        error!(error = %err, "compiled species catalog is unreadable");
        SpeciesCatalog::default()
    })
});

pub fn catalog() -> &'static SpeciesCatalog {
    &CATALOG
}

/// Offline provider over the compiled catalog.
///
/// Id lookups outside the catalog wrap onto it, so any id a random
/// encounter draws resolves to some species.
#[derive(Debug, Clone, Default)]
pub struct CatalogProvider {
    latency: Option<Duration>,
}

impl CatalogProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every lookup after `latency`, like a remote provider would.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
        }
    }

    pub fn lookup(&self, query: &SpeciesQuery) -> ProviderResult<SpeciesData> {
        let species = &catalog().species;
        let found = match query {
            SpeciesQuery::Id(id) => species
                .iter()
                .find(|s| s.id == *id)
                .or_else(|| {
                    let len = species.len();
                    (len > 0 && *id > 0).then(|| &species[(usize::from(*id) - 1) % len])
                }),
            SpeciesQuery::Name(name) => {
                let key = species_key(name);
                species.iter().find(|s| s.key() == key)
            }
        };
        found
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(query.to_string()))
    }

    pub fn lookup_chain(&self, chain_ref: &str) -> ProviderResult<EvolutionChain> {
        catalog()
            .chains
            .iter()
            .find(|chain| chain.chain_ref == chain_ref)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(chain_ref.to_string()))
    }

    /// Every species name in the catalog, in id order.
    pub fn names(&self) -> Vec<String> {
        let mut species: Vec<&SpeciesData> = catalog().species.iter().collect();
        species.sort_by_key(|s| s.id);
        species.into_iter().map(|s| s.key()).collect()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl SpeciesProvider for CatalogProvider {
    async fn species(&self, query: SpeciesQuery) -> ProviderResult<SpeciesData> {
        self.delay().await;
        self.lookup(&query)
    }

    async fn evolution_chain(&self, chain_ref: &str) -> ProviderResult<EvolutionChain> {
        self.delay().await;
        self.lookup_chain(chain_ref)
    }
}
