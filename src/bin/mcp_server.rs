//! Pokémon Companion MCP Server
//!
//! A Model Context Protocol server (rmcp, stdio transport) that exposes
//! the companion game to an LLM client. Every tool answers in plain text.

use std::borrow::Cow;
use std::future::Future;
use std::str::FromStr;

use pokemon_companion::config::{EngineConfig, DEFAULT_CONFIG_PATH};
use pokemon_companion::interface;
use pokemon_companion::ledger::{BagSort, Ledger};
use pokemon_companion::logging;
use pokemon_companion::providers::CatalogProvider;
use pokemon_companion::save::FileStore;
use pokemon_companion::session::{Intent, Session, SessionHandle};
use pokemon_companion::{BallKind, BattleAction, GameError, ShopItem, TurnRng};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ErrorData as McpError, *},
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tokio::io::{stdin, stdout};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CompanionService {
    tool_router: ToolRouter<CompanionService>,
    session: SessionHandle,
}

// Tool request structures
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ThrowBallRequest {
    #[schemars(description = "Ball to throw: poke, great, ultra or master (default poke)")]
    pub ball: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SpeciesRequest {
    #[schemars(description = "Name of the Pokemon species")]
    pub species_name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BuyRequest {
    #[schemars(description = "Item to buy: pokeball, greatball, ultraball or potion")]
    pub item: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BagRequest {
    #[schemars(description = "Sort order: name, rarity or quantity (default name)")]
    pub sort: Option<String>,
}

fn invalid_params(message: String) -> McpError {
    McpError {
        code: ErrorCode(-32602),
        message: Cow::from(message),
        data: None,
    }
}

fn internal(err: GameError) -> McpError {
    McpError {
        code: ErrorCode(-32603),
        message: Cow::from(err.to_string()),
        data: None,
    }
}

fn text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_router]
impl CompanionService {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            tool_router: Self::tool_router(),
            session,
        }
    }

    async fn dispatch(&self, intent: Intent) -> Result<CallToolResult, McpError> {
        let events = self.session.dispatch(intent).await.map_err(internal)?;
        let mut output = interface::render_events(&events);
        if output.is_empty() {
            output = "OK.".to_string();
        }
        text(output)
    }

    #[tool(description = "Show the partner, inventory and any open battle")]
    async fn get_status(&self) -> Result<CallToolResult, McpError> {
        let status = self.session.status().await.map_err(internal)?;
        text(interface::render_status(&status))
    }

    #[tool(description = "Choose the first partner Pokemon of a new game")]
    async fn choose_starter(
        &self,
        Parameters(request): Parameters<SpeciesRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::ChooseStarter(request.species_name)).await
    }

    #[tool(description = "Look for a wild Pokemon and start a battle")]
    async fn start_battle(&self) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::StartBattle).await
    }

    #[tool(description = "Attack the wild Pokemon")]
    async fn attack(&self) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::Battle(BattleAction::Attack)).await
    }

    #[tool(description = "Throw a ball at the wild Pokemon")]
    async fn throw_ball(
        &self,
        Parameters(request): Parameters<ThrowBallRequest>,
    ) -> Result<CallToolResult, McpError> {
        let kind = match request.ball.as_deref() {
            None | Some("") => BallKind::Poke,
            Some(name) => BallKind::from_str(name)
                .map_err(|_| invalid_params(format!("Unknown ball '{}'", name)))?,
        };
        self.dispatch(Intent::Battle(BattleAction::ThrowBall(kind))).await
    }

    #[tool(description = "Use a Potion on the partner (in or out of battle)")]
    async fn use_potion(&self) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::UsePotion).await
    }

    #[tool(description = "Put the wild Pokemon to sleep so it skips its next attack")]
    async fn sleep_powder(&self) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::Battle(BattleAction::SleepPowder)).await
    }

    #[tool(description = "Run away from the battle")]
    async fn run_away(&self) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::Battle(BattleAction::Run)).await
    }

    #[tool(description = "Close the battle panel, abandoning any battle in progress")]
    async fn close_battle(&self) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::CloseBattle).await
    }

    #[tool(description = "List the Pokemon in the bag")]
    async fn get_bag(
        &self,
        Parameters(request): Parameters<BagRequest>,
    ) -> Result<CallToolResult, McpError> {
        let sort = match request.sort.as_deref() {
            None => BagSort::default(),
            Some(sort) => sort.parse().map_err(invalid_params)?,
        };
        let bag = self.session.bag(sort).await.map_err(internal)?;
        text(interface::render_bag(&bag))
    }

    #[tool(description = "Make a Pokemon from the bag the active partner")]
    async fn set_partner(
        &self,
        Parameters(request): Parameters<SpeciesRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::SetActive(request.species_name)).await
    }

    #[tool(description = "Sell one Pokemon of a species from the bag")]
    async fn sell(
        &self,
        Parameters(request): Parameters<SpeciesRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::Sell(request.species_name)).await
    }

    #[tool(description = "Buy an item from the shop")]
    async fn buy(
        &self,
        Parameters(request): Parameters<BuyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let item = ShopItem::from_str(&request.item)
            .map_err(|_| invalid_params(format!("The shop does not sell '{}'", request.item)))?;
        self.dispatch(Intent::Buy(item)).await
    }

    #[tool(description = "Claim the PokeStop reward if its cooldown has passed")]
    async fn claim_pokestop(&self) -> Result<CallToolResult, McpError> {
        self.dispatch(Intent::ClaimPokestop).await
    }

    #[tool(description = "List every species recorded in the Pokedex")]
    async fn get_pokedex(&self) -> Result<CallToolResult, McpError> {
        let status = self.session.status().await.map_err(internal)?;
        text(interface::render_pokedex(&status.save.pokedex))
    }

    #[tool(description = "Look up detailed information about a Pokemon species")]
    async fn lookup_pokemon(
        &self,
        Parameters(request): Parameters<SpeciesRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.session.lookup(&request.species_name).await {
            Ok(species) => text(interface::render_species(&species)),
            Err(_) => text(format!("The Pokemon '{}' was not found.", request.species_name)),
        }
    }
}

#[tool_handler]
impl ServerHandler for CompanionService {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    info!("Pokémon Companion MCP server starting");

    let config = EngineConfig::load_or_default(DEFAULT_CONFIG_PATH);
    let ledger = Ledger::open(FileStore::new(&config.save_path), config)?;
    // Background events (random battles, panel closes) have no client to
    // go to over stdio, so the receiver is dropped.
    let (session, handle, _) =
        Session::new(ledger, CatalogProvider::new(), TurnRng::new_random());
    let session_task = session.spawn();

    let service = CompanionService::new(handle);
    let server = service.serve((stdin(), stdout())).await?;
    let quit_reason = server.waiting().await?;

    info!(?quit_reason, "Pokémon Companion MCP server exiting");
    session_task.abort();
    Ok(())
}
