use super::{SpeciesProvider, SpeciesQuery};
use crate::config::ProviderConfig;
use crate::errors::{ProviderError, ProviderResult};
use reqwest::Client;
use schema::{BaseStat, EvolutionChain, EvolutionNode, EvolutionTrigger, SpeciesData, TriggerKind};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Chain refs handed out by this provider point at the species resource;
/// the evolution chain URL is resolved from it on demand.
const SPECIES_REF_PREFIX: &str = "pokemon-species/";

/// Live provider backed by the public PokeAPI v2. No retries: a failed
/// request fails the lookup.
#[derive(Debug, Clone)]
pub struct PokeApiProvider {
    http: Client,
    base_url: String,
}

impl PokeApiProvider {
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("pokemon-companion/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        let url = self.url(path);
        debug!(%url, "provider request");
        let response = self.http.get(&url).send().await.map_err(|err| {
            warn!(%url, error = %err, "provider request failed");
            ProviderError::from(err)
        })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(url));
        }
        let response = response.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

impl SpeciesProvider for PokeApiProvider {
    async fn species(&self, query: SpeciesQuery) -> ProviderResult<SpeciesData> {
        let pokemon: PokemonResponse = self.get(&format!("pokemon/{}", query)).await?;
        Ok(pokemon.into_species())
    }

    async fn evolution_chain(&self, chain_ref: &str) -> ProviderResult<EvolutionChain> {
        let chain_url = match chain_ref.strip_prefix(SPECIES_REF_PREFIX) {
            Some(_) => {
                let species: SpeciesResponse = self.get(chain_ref).await?;
                species.evolution_chain.map(|link| link.url).ok_or_else(|| {
                    ProviderError::NotFound(format!("evolution chain of {}", chain_ref))
                })?
            }
            None => chain_ref.to_string(),
        };
        let chain: ChainResponse = self.get(&chain_url).await?;
        Ok(chain.into_chain(chain_url))
    }
}

// PokeAPI response shapes, reduced to the fields the engine reads.

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PokemonResponse {
    id: u16,
    name: String,
    #[serde(default)]
    stats: Vec<StatSlot>,
    #[serde(default)]
    types: Vec<TypeSlot>,
    #[serde(default)]
    abilities: Vec<AbilitySlot>,
    #[serde(default)]
    sprites: Sprites,
    species: Option<NamedResource>,
}

#[derive(Debug, Deserialize)]
struct StatSlot {
    base_stat: u16,
    stat: NamedResource,
}

#[derive(Debug, Deserialize)]
struct TypeSlot {
    #[serde(rename = "type")]
    kind: NamedResource,
}

#[derive(Debug, Deserialize)]
struct AbilitySlot {
    ability: NamedResource,
}

#[derive(Debug, Default, Deserialize)]
struct Sprites {
    front_default: Option<String>,
}

impl PokemonResponse {
    fn into_species(self) -> SpeciesData {
        let stats: Vec<BaseStat> = self
            .stats
            .into_iter()
            .map(|slot| BaseStat {
                name: slot.stat.name,
                value: slot.base_stat,
            })
            .collect();
        let base_hp = stats
            .iter()
            .find(|stat| stat.name == "hp")
            .map_or(0, |stat| stat.value);
        let species_name = self
            .species
            .map_or_else(|| self.name.clone(), |species| species.name);

        SpeciesData {
            id: self.id,
            name: self.name,
            base_hp,
            types: self.types.into_iter().map(|slot| slot.kind.name).collect(),
            abilities: self
                .abilities
                .into_iter()
                .map(|slot| slot.ability.name)
                .collect(),
            stats,
            sprite_ref: self.sprites.front_default,
            evolution_chain_ref: Some(format!("{}{}", SPECIES_REF_PREFIX, species_name)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpeciesResponse {
    evolution_chain: Option<UrlResource>,
}

#[derive(Debug, Deserialize)]
struct UrlResource {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChainResponse {
    chain: ChainLink,
}

#[derive(Debug, Deserialize)]
struct ChainLink {
    species: NamedResource,
    #[serde(default)]
    evolution_details: Vec<EvolutionDetail>,
    #[serde(default)]
    evolves_to: Vec<ChainLink>,
}

#[derive(Debug, Deserialize)]
struct EvolutionDetail {
    min_level: Option<u32>,
    trigger: Option<NamedResource>,
}

impl ChainResponse {
    fn into_chain(self, chain_ref: String) -> EvolutionChain {
        EvolutionChain {
            chain_ref,
            root: self.chain.into_node(),
        }
    }
}

impl ChainLink {
    fn into_node(self) -> EvolutionNode {
        // Only the first listed method counts.
        let trigger = self.evolution_details.into_iter().next().map(|detail| {
            let kind = match detail.trigger.as_ref().map(|t| t.name.as_str()) {
                Some("level-up") => TriggerKind::LevelUp,
                Some("use-item") => TriggerKind::Item,
                Some("trade") => TriggerKind::Trade,
                _ => TriggerKind::Other,
            };
            EvolutionTrigger {
                kind,
                min_level: detail.min_level,
            }
        });
        EvolutionNode {
            species_name: self.species.name,
            trigger,
            evolves_to: self.evolves_to.into_iter().map(ChainLink::into_node).collect(),
        }
    }
}
