use pokemon_companion::config::{EngineConfig, DEFAULT_CONFIG_PATH};
use pokemon_companion::interface::{self, Command};
use pokemon_companion::ledger::Ledger;
use pokemon_companion::logging;
use pokemon_companion::providers::{CatalogProvider, PokeApiProvider, SpeciesProvider};
use pokemon_companion::save::FileStore;
use pokemon_companion::session::Session;
use pokemon_companion::{GameEvent, TurnRng};
use std::path::PathBuf;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let offline = args.iter().any(|arg| arg == "--offline");
    let config_path = args
        .iter()
        .find(|arg| !arg.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = EngineConfig::load_or_default(&config_path);
    info!(save = %config.save_path.display(), offline, "starting");
    let ledger = Ledger::open(FileStore::new(&config.save_path), config.clone())?;

    if offline {
        play(ledger, CatalogProvider::new()).await
    } else {
        play(ledger, PokeApiProvider::new(&config.provider)?).await
    }
}

async fn play<P: SpeciesProvider>(
    ledger: Ledger<FileStore>,
    provider: P,
) -> Result<(), Box<dyn std::error::Error>> {
    let (session, handle, mut background) = Session::new(ledger, provider, TurnRng::new_random());
    let task = session.spawn();

    println!("🔥 Welcome to Pokémon Companion! 🔥");
    match handle.status().await {
        Ok(status) => println!("{}", interface::render_header(&status.save)),
        Err(err) => println!("Error: {}", err),
    }
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match interface::parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        let text = interface::execute(&handle, command).await;
                        if !text.is_empty() {
                            println!("{}", text);
                        }
                    }
                    Err(message) => println!("{}", message),
                }
            }
            Some(event) = background.recv() => print_background(event, &mut background),
        }
    }

    drop(handle);
    let _ = task.await;
    println!("See you next time!");
    Ok(())
}

/// Print a background event plus whatever else is already queued.
fn print_background(first: GameEvent, background: &mut UnboundedReceiver<GameEvent>) {
    let mut events = vec![first];
    while let Ok(event) = background.try_recv() {
        events.push(event);
    }
    let text = interface::render_events(&events);
    if !text.is_empty() {
        println!("{}", text);
    }
}
