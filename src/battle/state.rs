use crate::ledger::PokestopReward;
use crate::progression::Rewards;
use crate::save::Settings;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schema::{display_name, BallKind, BattleOutcome, RarityTier, ShopItem, SoundCue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one deferred step of one battle. A ticket only matches the
/// step it was issued for, so a timer or fetch that completes after the
/// battle moved on (or ended) is recognised as stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub battle_id: u64,
    pub seq: u64,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.battle_id, self.seq)
    }
}

/// The kinds of action a player can resolve on their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Attack,
    Ball,
    Potion,
    Sleep,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleAction {
    Attack,
    ThrowBall(BallKind),
    UsePotion,
    SleepPowder,
    Run,
}

impl ActionKind {
    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Attack => "attack",
            ActionKind::Ball => "ball",
            ActionKind::Potion => "potion",
            ActionKind::Sleep => "sleep powder",
            ActionKind::Run => "run",
        }
    }
}

impl BattleAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            BattleAction::Attack => ActionKind::Attack,
            BattleAction::ThrowBall(_) => ActionKind::Ball,
            BattleAction::UsePotion => ActionKind::Potion,
            BattleAction::SleepPowder => ActionKind::Sleep,
            BattleAction::Run => ActionKind::Run,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattlePhase {
    Idle,
    /// Waiting on the species provider for the wild creature.
    Encountered { ticket: Ticket },
    PlayerChoice,
    Resolving(ActionKind),
    /// The wild side's turn is scheduled.
    WildRetaliates { ticket: Ticket },
    /// Terminal. The battle closes when `ticket` is presented.
    Ended {
        outcome: BattleOutcome,
        ticket: Ticket,
    },
}

impl BattlePhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, BattlePhase::Idle)
    }

    /// A battle panel is open, loading or not.
    pub fn in_battle(&self) -> bool {
        !self.is_idle()
    }
}

impl fmt::Display for BattlePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattlePhase::Idle => write!(f, "no battle"),
            BattlePhase::Encountered { .. } => write!(f, "encounter loading"),
            BattlePhase::PlayerChoice => write!(f, "your turn"),
            BattlePhase::Resolving(kind) => write!(f, "resolving {}", kind.label()),
            BattlePhase::WildRetaliates { .. } => write!(f, "wild turn"),
            BattlePhase::Ended { outcome, .. } => write!(f, "battle over: {}", outcome),
        }
    }
}

/// The opposing creature. Lives only as long as its battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WildEncounter {
    pub species_name: String,
    pub rarity: RarityTier,
    pub max_hp: u32,
    pub current_hp: u32,
    pub sleep_turns_remaining: u32,
}

impl WildEncounter {
    pub fn new(species_name: &str, rarity: RarityTier, max_hp: u32) -> Self {
        Self {
            species_name: species_name.to_string(),
            rarity,
            max_hp,
            current_hp: max_hp,
            sleep_turns_remaining: 0,
        }
    }

    pub fn display_name(&self) -> String {
        display_name(&self.species_name)
    }

    pub fn is_asleep(&self) -> bool {
        self.sleep_turns_remaining > 0
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.current_hp = self.current_hp.saturating_sub(amount);
    }
}

/// Everything the engine reports to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    EncounterLoading,
    /// The species lookup failed and the encounter was dropped.
    EncounterCancelled { reason: String },
    EncounterStarted {
        wild: String,
        rarity: RarityTier,
        wild_max_hp: u32,
        partner: String,
        partner_hp: u32,
        partner_max_hp: u32,
    },
    TurnResolved {
        message: String,
        damage_dealt: u32,
        cue: Option<SoundCue>,
    },
    LevelUp { species: String, new_level: u32 },
    Evolved { from: String, new_species_name: String },
    BattleEnded {
        outcome: BattleOutcome,
        rewards: Option<Rewards>,
    },
    BattleClosed,
    ClaimRejected { reason: String, remaining_ms: u64 },
    PokestopClaimed(PokestopReward),
    /// An intent was refused without consuming a turn.
    ActionRefused { reason: String },
    StarterChosen { species: String },
    PartnerChanged {
        species: String,
        previous: Option<String>,
    },
    Purchased {
        item: ShopItem,
        price: u32,
        coins_left: u32,
    },
    Sold {
        species: String,
        coins: u32,
        remaining: u32,
    },
    PotionUsed { healed: u32, hp: u32, max_hp: u32 },
    PokedexRecorded { name: String },
    CatchChance {
        chance: OrderedFloat<f64>,
        description: String,
    },
    RandomBattleScheduled { in_secs: u64 },
    SettingsChanged(Settings),
    SaveReset,
    /// No fetch or wild turn is outstanding.
    Settled,
}

impl GameEvent {
    /// Formats the event into a human-readable string.
    /// Returns None for silent events that should not produce user-visible text.
    pub fn format(&self) -> Option<String> {
        match self {
            GameEvent::EncounterLoading => {
                Some("Something is rustling in the grass...".to_string())
            }
            GameEvent::EncounterCancelled { reason } => {
                Some(format!("The encounter slipped away. {}", reason))
            }
            GameEvent::EncounterStarted {
                wild,
                rarity,
                wild_max_hp,
                partner,
                partner_hp,
                partner_max_hp,
            } => Some(format!(
                "A wild {} ({}) appeared! HP {}/{}\nGo, {}! HP {}/{}",
                display_name(wild),
                rarity,
                wild_max_hp,
                wild_max_hp,
                display_name(partner),
                partner_hp,
                partner_max_hp
            )),
            GameEvent::TurnResolved { message, .. } => Some(message.clone()),
            GameEvent::LevelUp { species, new_level } => Some(format!(
                "{} leveled up to {}! HP and ATK increased.",
                display_name(species),
                new_level
            )),
            GameEvent::Evolved {
                from,
                new_species_name,
            } => Some(format!(
                "Your {} evolved into {}!",
                display_name(from),
                display_name(new_species_name)
            )),
            GameEvent::BattleEnded { outcome, rewards } => Some(match (outcome, rewards) {
                (BattleOutcome::Victory, Some(r)) => {
                    format!("You won! +{} coins, +{} XP", r.coins, r.xp)
                }
                (BattleOutcome::Victory, None) => "You won!".to_string(),
                (BattleOutcome::Defeat, _) => "You were knocked out...".to_string(),
                (BattleOutcome::Fled, _) => "You ran away!".to_string(),
                (BattleOutcome::Caught, _) => "Gotcha! The catch was recorded.".to_string(),
            }),
            GameEvent::BattleClosed => None,
            GameEvent::ClaimRejected { reason, .. } => Some(reason.clone()),
            GameEvent::PokestopClaimed(reward) => Some(reward.to_string()),
            GameEvent::ActionRefused { reason } => Some(reason.clone()),
            GameEvent::StarterChosen { species } => {
                Some(format!("{} is now your partner!", display_name(species)))
            }
            GameEvent::PartnerChanged { species, previous } => Some(match previous {
                Some(previous) => format!(
                    "{} returned to the bag. {} is now your partner!",
                    display_name(previous),
                    display_name(species)
                ),
                None => format!("{} is now your partner!", display_name(species)),
            }),
            GameEvent::Purchased {
                item,
                price,
                coins_left,
            } => Some(format!(
                "Bought a {} for {} coins. ({} left)",
                item.label(),
                price,
                coins_left
            )),
            GameEvent::Sold {
                species,
                coins,
                remaining,
            } => Some(format!(
                "Sold {} for {} coins. ({} left)",
                display_name(species),
                coins,
                remaining
            )),
            GameEvent::PotionUsed { healed, hp, max_hp } => Some(format!(
                "You used a Potion. +{} HP ({}/{})",
                healed, hp, max_hp
            )),
            GameEvent::PokedexRecorded { name } => {
                Some(format!("{} was added to the Pokédex.", display_name(name)))
            }
            GameEvent::CatchChance {
                chance,
                description,
            } => Some(format!(
                "Catch chance: {:.1}% ({})",
                chance.into_inner() * 100.0,
                description
            )),
            GameEvent::RandomBattleScheduled { .. } => None,
            GameEvent::SettingsChanged(settings) => Some(format!(
                "Sound {}, volume {:.0}%, random battles {}",
                if settings.sound_on { "on" } else { "off" },
                settings.volume.into_inner() * 100.0,
                if settings.random_battles { "on" } else { "off" }
            )),
            GameEvent::SaveReset => Some("Game data reset.".to_string()),
            GameEvent::Settled => None,
        }
    }

    /// Audio hint for the presentation layer. Playback failures are its
    /// own business.
    pub fn cue(&self) -> Option<SoundCue> {
        match self {
            GameEvent::EncounterStarted { .. } => Some(SoundCue::Start),
            GameEvent::TurnResolved { cue, .. } => *cue,
            GameEvent::BattleEnded { outcome, .. } => Some(match outcome {
                BattleOutcome::Victory => SoundCue::Victory,
                BattleOutcome::Defeat => SoundCue::Lose,
                BattleOutcome::Fled => SoundCue::Run,
                BattleOutcome::Caught => SoundCue::Catch,
            }),
            _ => None,
        }
    }

    pub(crate) fn turn(
        message: impl Into<String>,
        damage_dealt: u32,
        cue: Option<SoundCue>,
    ) -> Self {
        GameEvent::TurnResolved {
            message: message.into(),
            damage_dealt,
            cue,
        }
    }

    pub(crate) fn refused(err: &crate::errors::GameError) -> Self {
        GameEvent::ActionRefused {
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventBus {
    events: Vec<GameEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        self.events.extend(events);
    }

    /// Return true if the event bus contains no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Return the number of events in the bus.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl fmt::Display for EventBus {
    /// Only the events that produce text, one per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.events.iter().filter_map(GameEvent::format).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

#[derive(Debug, Clone)]
enum RngSource {
    Scripted { outcomes: Vec<f64>, index: usize },
    Live(StdRng),
}

/// Source of uniform `[0, 1)` draws for every random decision the engine
/// makes. Tests script the exact values; everything else draws live.
#[derive(Debug, Clone)]
pub struct TurnRng {
    source: RngSource,
}

impl TurnRng {
    pub fn new_for_test(outcomes: Vec<f64>) -> Self {
        Self {
            source: RngSource::Scripted { outcomes, index: 0 },
        }
    }

    pub fn new_random() -> Self {
        Self {
            source: RngSource::Live(StdRng::from_os_rng()),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            source: RngSource::Live(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn next_outcome(&mut self, reason: &str) -> f64 {
        let outcome = match &mut self.source {
            RngSource::Live(rng) => rng.random::<f64>(),
            RngSource::Scripted { outcomes, index } => {
                if *index >= outcomes.len() {
                    panic!(
                        "TurnRng exhausted! Tried to get a value for: '{}'. Need more random values.",
                        reason
                    );
                }
                let outcome = outcomes[*index];
                *index += 1;
                outcome
            }
        };

        #[cfg(test)]
        println!("[RNG] Consumed {} for: {}", outcome, reason);

        outcome
    }

    /// Uniform integer in `lo..=hi`.
    pub fn uniform_inclusive(&mut self, lo: u32, hi: u32, reason: &str) -> u32 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let span = f64::from(hi - lo) + 1.0;
        let offset = (self.next_outcome(reason) * span).floor() as u32;
        lo + offset.min(hi - lo)
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64, reason: &str) -> bool {
        self.next_outcome(reason) < p
    }

    /// Uniformly pick one element of a non-empty slice.
    pub fn pick<T: Copy>(&mut self, items: &[T], reason: &str) -> Option<T> {
        if items.is_empty() {
            return None;
        }
        let last = u32::try_from(items.len() - 1).unwrap_or(u32::MAX);
        let index = self.uniform_inclusive(0, last, reason) as usize;
        items.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1)]
    #[case(0.199, 1)]
    #[case(0.2, 2)]
    #[case(0.999_999, 5)]
    fn test_uniform_inclusive_buckets(#[case] draw: f64, #[case] expected: u32) {
        let mut rng = TurnRng::new_for_test(vec![draw]);
        assert_eq!(rng.uniform_inclusive(1, 5, "bucket"), expected);
    }

    #[test]
    fn test_chance_is_strict() {
        let mut rng = TurnRng::new_for_test(vec![0.5, 0.49]);
        assert!(!rng.chance(0.5, "equal"));
        assert!(rng.chance(0.5, "below"));
    }

    #[test]
    fn test_pick_and_live_draws() {
        let mut rng = TurnRng::new_for_test(vec![0.7]);
        assert_eq!(rng.pick(&BallKind::POKESTOP_REWARDS, "ball"), Some(BallKind::Ultra));

        let mut live = TurnRng::from_seed(7);
        for _ in 0..100 {
            let draw = live.next_outcome("live");
            assert!((0.0..1.0).contains(&draw));
        }
    }

    #[test]
    #[should_panic(expected = "TurnRng exhausted")]
    fn test_scripted_rng_exhaustion_names_reason() {
        let mut rng = TurnRng::new_for_test(vec![]);
        rng.next_outcome("attack roll");
    }

    #[test]
    fn test_event_text_and_cues() {
        let ended = GameEvent::BattleEnded {
            outcome: BattleOutcome::Victory,
            rewards: Some(Rewards { xp: 1500, coins: 234 }),
        };
        assert_eq!(ended.format().as_deref(), Some("You won! +234 coins, +1500 XP"));
        assert_eq!(ended.cue(), Some(SoundCue::Victory));
        assert_eq!(GameEvent::BattleClosed.format(), None);
        assert_eq!(
            GameEvent::turn("You hit for 15!", 15, Some(SoundCue::Hit)).cue(),
            Some(SoundCue::Hit)
        );
    }

    #[test]
    fn test_event_bus_display_skips_silent_events() {
        let mut bus = EventBus::new();
        bus.push(GameEvent::Settled);
        bus.push(GameEvent::LevelUp {
            species: "pidgey".to_string(),
            new_level: 3,
        });
        bus.push(GameEvent::BattleClosed);
        assert_eq!(bus.len(), 3);
        assert_eq!(bus.to_string(), "Pidgey leveled up to 3! HP and ATK increased.");
    }
}
