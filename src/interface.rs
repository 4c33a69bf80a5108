//! Text front end shared by the REPL and the MCP server.
//!
//! Parses player commands into intents and renders session output as
//! plain text.

use crate::battle::{BattleAction, BattleView, EventBus, GameEvent};
use crate::errors::GameResult;
use crate::ledger::{BagEntry, BagSort};
use crate::progression::xp_threshold;
use crate::save::{PokedexEntry, SaveData};
use crate::session::{Intent, SessionHandle, StatusReport};
use crate::species::SpeciesCard;
use schema::{display_name, BallKind, ShopItem, SpeciesData};
use std::fmt::Write;
use std::str::FromStr;
use std::time::Duration;

/// A parsed line of player input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Intent(Intent),
    Status,
    Bag(BagSort),
    Pokedex,
    Lookup(String),
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default().to_lowercase();
    let rest = parts.next().map(str::trim).unwrap_or_default();

    let intent = match verb.as_str() {
        "" => return Err("Type 'help' for a list of commands.".to_string()),
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        "status" | "s" => return Ok(Command::Status),
        "bag" => return rest.parse().map(Command::Bag),
        "pokedex" | "dex" => return Ok(Command::Pokedex),
        "lookup" => {
            if rest.is_empty() {
                return Err(
                    "What Pokémon do you want to look up? (e.g., 'lookup pikachu')".to_string(),
                );
            }
            return Ok(Command::Lookup(rest.to_string()));
        }
        "battle" | "wild" => Intent::StartBattle,
        "attack" | "a" => Intent::Battle(BattleAction::Attack),
        "throw" | "ball" => {
            let kind = if rest.is_empty() {
                BallKind::Poke
            } else {
                BallKind::from_str(rest).map_err(|_| {
                    format!("Unknown ball '{}'. Use poke, great, ultra or master.", rest)
                })?
            };
            Intent::Battle(BattleAction::ThrowBall(kind))
        }
        "potion" => Intent::UsePotion,
        "sleep" => Intent::Battle(BattleAction::SleepPowder),
        "run" => Intent::Battle(BattleAction::Run),
        "close" => Intent::CloseBattle,
        "starter" => Intent::ChooseStarter(required(rest, "starter")?),
        "partner" | "use" => Intent::SetActive(required(rest, "partner")?),
        "sell" => Intent::Sell(required(rest, "sell")?),
        "buy" => {
            let item = ShopItem::from_str(rest).map_err(|_| {
                format!("Unknown item '{}'. The shop sells poke, great, ultra and potion.", rest)
            })?;
            Intent::Buy(item)
        }
        "pokestop" | "stop" => Intent::ClaimPokestop,
        "sound" => Intent::SetSound(parse_toggle(rest)?),
        "volume" => {
            let percent: f64 = rest
                .trim_end_matches('%')
                .parse()
                .map_err(|_| "Volume is a number from 0 to 100.".to_string())?;
            Intent::SetVolume(percent / 100.0)
        }
        "random" => Intent::SetRandomBattles(parse_toggle(rest)?),
        "reset" => Intent::Reset,
        other => return Err(format!("Unknown command '{}'. Type 'help' for a list.", other)),
    };
    Ok(Command::Intent(intent))
}

fn required(rest: &str, verb: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(format!("Usage: {} <pokemon>", verb))
    } else {
        Ok(rest.to_string())
    }
}

fn parse_toggle(rest: &str) -> Result<bool, String> {
    match rest.to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err("Use 'on' or 'off'.".to_string()),
    }
}

pub fn help_text() -> &'static str {
    "Commands:
  battle                 look for a wild Pokémon
  attack | throw [ball] | potion | sleep | run
  close                  close the battle panel
  starter <name>         pick your first partner
  partner <name>         make a bag Pokémon your partner
  sell <name>            sell one from the bag
  buy <item>             poke, great, ultra or potion
  pokestop               claim the PokéStop reward
  bag [name|rarity|quantity]
  pokedex | lookup <name> | status
  sound on|off | volume <0-100> | random on|off
  reset | quit"
}

/// Run `command` against the session and render the reply. Failures are
/// rendered too, so a bad save or a dead session never ends the caller.
pub async fn execute(handle: &SessionHandle, command: Command) -> String {
    let rendered: GameResult<String> = match command {
        Command::Intent(intent) => handle
            .dispatch(intent)
            .await
            .map(|events| render_events(&events)),
        Command::Status => handle.status().await.map(|status| render_status(&status)),
        Command::Bag(sort) => handle.bag(sort).await.map(|bag| render_bag(&bag)),
        Command::Pokedex => handle
            .status()
            .await
            .map(|status| render_pokedex(&status.save.pokedex)),
        Command::Lookup(name) => {
            return match handle.lookup(&name).await {
                Ok(species) => render_species(&species),
                Err(err) => format!("The Pokémon '{}' was not found. ({})", name, err),
            };
        }
        Command::Help => Ok(help_text().to_string()),
        Command::Quit => Ok(String::new()),
    };
    rendered.unwrap_or_else(|err| format!("Error: {}", err))
}

/// Event lines in order, skipping silent events.
pub fn render_events(events: &[GameEvent]) -> String {
    let mut bus = EventBus::new();
    bus.extend(events.iter().cloned());
    bus.to_string()
}

/// Header line plus the battle panel when one is open.
pub fn render_status(status: &StatusReport) -> String {
    let mut output = render_header(&status.save);
    if status.loading {
        output.push_str("\nSomething is rustling in the grass...");
    } else if let Some(view) = &status.battle {
        output.push('\n');
        output.push_str(&render_battle(view));
    }
    match status.pokestop_remaining_ms {
        Some(ms) => {
            let remaining = crate::errors::format_remaining(ms);
            let _ = write!(output, "\nPokéStop: ready in {}", remaining);
        }
        None => output.push_str("\nPokéStop: ready!"),
    }
    if let Some(next) = status.next_random_battle {
        let _ = write!(output, "\nNext random battle in ~{}", format_duration(next));
    }
    output
}

pub fn render_header(save: &SaveData) -> String {
    let inv = &save.inventory;
    let partner = match save.partner() {
        Some((species, record)) => format!(
            "{} Lv.{}  HP {}/{}  XP {}/{}  ATK {}",
            display_name(species),
            record.level,
            record.current_hp,
            record.max_hp,
            record.xp,
            xp_threshold(record.level),
            record.attack
        ),
        None => "No partner yet (try 'starter pikachu')".to_string(),
    };
    format!(
        "{}\nCoins {}  Balls P{} G{} U{} M{}  Potions {}",
        partner,
        inv.coins,
        inv.poke_balls,
        inv.great_balls,
        inv.ultra_balls,
        inv.master_balls,
        inv.potions
    )
}

pub fn render_battle(view: &BattleView) -> String {
    let mut output = String::from("--- Battle ---\n");
    if let Some(wild) = &view.wild {
        let sleeping = if wild.is_asleep() { " (asleep)" } else { "" };
        let _ = writeln!(
            output,
            "Wild {} [{}] HP {}/{}{}",
            wild.display_name(),
            wild.rarity,
            wild.current_hp,
            wild.max_hp,
            sleeping
        );
    }
    let _ = writeln!(
        output,
        "{} Lv.{} HP {}/{}",
        display_name(&view.partner),
        view.partner_level,
        view.partner_hp,
        view.partner_max_hp
    );
    if let (Some(chance), Some(description)) = (view.catch_chance, view.catch_description) {
        let percent = chance.into_inner() * 100.0;
        let _ = writeln!(output, "Catch chance: {:.1}% ({})", percent, description);
    }
    let _ = write!(output, "Phase: {}", view.phase);
    output
}

pub fn render_bag(entries: &[BagEntry]) -> String {
    if entries.is_empty() {
        return "Your bag is empty. Catch something!".to_string();
    }
    let mut output = String::from("--- Bag ---\n");
    for entry in entries {
        let _ = writeln!(
            output,
            "{:<14} x{:<3} {:<10} Lv.{:<3} sells for {}",
            display_name(&entry.species),
            entry.count,
            entry.rarity,
            entry.level,
            entry.sell_value
        );
    }
    output.trim_end().to_string()
}

pub fn render_pokedex(entries: &[PokedexEntry]) -> String {
    if entries.is_empty() {
        return "The Pokédex is empty.".to_string();
    }
    let mut output = format!("--- Pokédex ({} seen) ---\n", entries.len());
    // Capture order.
    for entry in entries {
        let _ = writeln!(
            output,
            "#{:03} {:<14} {}",
            entry.id,
            display_name(&entry.name),
            entry.types.join(" / ")
        );
    }
    output.trim_end().to_string()
}

pub fn render_species(species: &SpeciesData) -> String {
    format!("--- Pokémon Details ---\n{}", SpeciesCard(species))
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
