use crate::battle::catch::{
    calculate_catch_chance, can_attempt_catch, get_catch_rate_description, preview_catch_chance,
    roll_catch_success, CatchError,
};
use crate::battle::state::{BattleAction, BattlePhase, GameEvent, Ticket, TurnRng, WildEncounter};
use crate::config::EngineConfig;
use crate::errors::{GameError, GameResult, ProviderResult};
use crate::ledger::Ledger;
use crate::progression::RewardCalculator;
use crate::save::{CreatureRecord, KeyValueStore};
use crate::species::{base_hp, rarity_of};
use ordered_float::OrderedFloat;
use schema::{BallKind, BattleOutcome, SoundCue, SpeciesData};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// An outstanding species lookup for a new wild encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncounterRequest {
    pub ticket: Ticket,
    pub species_id: u16,
}

/// What the driver has to schedule after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// The player acts next.
    AwaitChoice,
    /// Call `retaliate` with `ticket` after `delay`.
    Retaliation { ticket: Ticket, delay: Duration },
    /// Call `close` with `ticket` after `delay`. When the partner leveled up,
    /// `evolution_check` names it so the driver can look up its chain.
    Closing {
        ticket: Ticket,
        delay: Duration,
        evolution_check: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub events: Vec<GameEvent>,
    pub next: NextStep,
}

/// Snapshot of an open battle for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattleView {
    pub phase: BattlePhase,
    pub wild: Option<WildEncounter>,
    pub partner: String,
    pub partner_hp: u32,
    pub partner_max_hp: u32,
    pub partner_level: u32,
    pub catch_chance: Option<OrderedFloat<f64>>,
    pub catch_description: Option<&'static str>,
}

/// The battle state machine.
///
/// Owns only the ephemeral side of a battle: its phase, the wild creature
/// and the ticket counters. Every durable effect goes through the `Ledger`
/// passed into each step, which re-reads the save before writing. Deferred
/// steps (the species lookup, the wild turn, the close) are handed to the
/// driver as tickets; a ticket that no longer matches the phase is stale
/// and ignored.
#[derive(Debug)]
pub struct BattleEngine {
    config: EngineConfig,
    phase: BattlePhase,
    wild: Option<WildEncounter>,
    species: Option<SpeciesData>,
    battle_id: u64,
    seq: u64,
}

impl BattleEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            phase: BattlePhase::Idle,
            wild: None,
            species: None,
            battle_id: 0,
            seq: 0,
        }
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn wild(&self) -> Option<&WildEncounter> {
        self.wild.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn wild_mut(&mut self) -> Option<&mut WildEncounter> {
        self.wild.as_mut()
    }

    pub fn in_battle(&self) -> bool {
        self.phase.in_battle()
    }

    /// True while the species lookup for a new encounter is outstanding.
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, BattlePhase::Encountered { .. })
    }

    fn next_ticket(&mut self) -> Ticket {
        self.seq += 1;
        Ticket {
            battle_id: self.battle_id,
            seq: self.seq,
        }
    }

    fn out_of_turn(&self) -> GameError {
        GameError::OutOfTurn {
            phase: self.phase.to_string(),
        }
    }

    /// Start a battle: pick a random species id and wait for its data.
    pub fn request_encounter<S: KeyValueStore>(
        &mut self,
        ledger: &Ledger<S>,
        rng: &mut TurnRng,
    ) -> GameResult<EncounterRequest> {
        if !self.phase.is_idle() {
            return Err(self.out_of_turn());
        }
        ledger.partner()?;

        self.battle_id += 1;
        self.seq = 0;
        let ticket = self.next_ticket();
        let max_id = u32::from(self.config.max_wild_species_id.max(1));
        let species_id = u16::try_from(rng.uniform_inclusive(1, max_id, "wild species"))
            .unwrap_or(self.config.max_wild_species_id);
        self.phase = BattlePhase::Encountered { ticket };
        debug!(%ticket, species_id, "encounter requested");
        Ok(EncounterRequest { ticket, species_id })
    }

    /// Deliver the species lookup for `ticket`.
    ///
    /// A stale ticket returns no events. A failed lookup or a missing
    /// partner cancels the encounter without touching the save.
    pub fn complete_encounter<S: KeyValueStore>(
        &mut self,
        ticket: Ticket,
        species: ProviderResult<SpeciesData>,
        ledger: &Ledger<S>,
    ) -> Vec<GameEvent> {
        if self.phase != (BattlePhase::Encountered { ticket }) {
            debug!(%ticket, phase = %self.phase, "stale encounter response dropped");
            return Vec::new();
        }

        let started = species
            .map_err(GameError::from)
            .and_then(|species| ledger.partner().map(|partner| (species, partner)));
        let (species, (partner, record)) = match started {
            Ok(started) => started,
            Err(err) => {
                warn!(%ticket, error = %err, "encounter cancelled");
                self.reset();
                return vec![GameEvent::EncounterCancelled {
                    reason: err.to_string(),
                }];
            }
        };

        let key = species.key();
        let rarity = rarity_of(&key);
        let max_hp = base_hp(&species) + record.level * self.config.wild_hp_per_level;
        let wild = WildEncounter::new(&key, rarity, max_hp);
        info!(%ticket, wild = %key, %rarity, max_hp, "encounter started");

        let mut events = vec![GameEvent::EncounterStarted {
            wild: key,
            rarity,
            wild_max_hp: max_hp,
            partner,
            partner_hp: record.current_hp,
            partner_max_hp: record.max_hp,
        }];
        events.push(catch_preview(&wild, record.level));

        self.wild = Some(wild);
        self.species = Some(species);
        self.phase = BattlePhase::PlayerChoice;
        events
    }

    /// Resolve one player action.
    ///
    /// Refusals (no balls, no potions, wrong phase) return an error and
    /// leave the battle on the player's turn.
    pub fn submit<S: KeyValueStore>(
        &mut self,
        action: BattleAction,
        ledger: &mut Ledger<S>,
        rng: &mut TurnRng,
    ) -> GameResult<TurnReport> {
        if self.phase != BattlePhase::PlayerChoice {
            return Err(self.out_of_turn());
        }
        self.phase = BattlePhase::Resolving(action.kind());

        let result = match action {
            BattleAction::Attack => self.attack(ledger, rng),
            BattleAction::ThrowBall(ball) => self.throw_ball(ball, ledger, rng),
            BattleAction::UsePotion => self.use_potion(ledger),
            BattleAction::SleepPowder => self.sleep_powder(),
            BattleAction::Run => Ok(self.run()),
        };

        if let Err(err) = &result {
            debug!(?action, error = %err, "action refused");
            if matches!(self.phase, BattlePhase::Resolving(_)) {
                self.phase = BattlePhase::PlayerChoice;
            }
        }
        result
    }

    fn attack<S: KeyValueStore>(
        &mut self,
        ledger: &mut Ledger<S>,
        rng: &mut TurnRng,
    ) -> GameResult<TurnReport> {
        let (partner, record) = ledger.partner()?;
        let roll = rng.next_outcome("attack damage");
        let damage = (f64::from(record.attack) * (0.8 + roll * 0.4)).floor() as u32;

        let wild = self.wild.as_mut().ok_or_else(no_wild)?;
        wild.take_damage(damage);
        debug!(damage, wild_hp = wild.current_hp, "player attack");
        let fainted = wild.is_fainted();

        let mut events = vec![GameEvent::turn(
            format!("You hit for {}!", damage),
            damage,
            Some(SoundCue::Hit),
        )];
        if fainted {
            let next = self.victory(&partner, &record, ledger, &mut events)?;
            return Ok(TurnReport { events, next });
        }
        Ok(self.hand_to_wild(events))
    }

    fn throw_ball<S: KeyValueStore>(
        &mut self,
        ball: BallKind,
        ledger: &mut Ledger<S>,
        rng: &mut TurnRng,
    ) -> GameResult<TurnReport> {
        let (_, record) = ledger.partner()?;
        let chance = {
            let target = can_attempt_catch(&self.phase, self.wild.as_ref())?;
            calculate_catch_chance(target, record.level, ball.catch_bonus())
        };
        let left = ledger.consume_ball(ball)?;
        debug!(%ball, left, chance, "ball thrown");

        let mut events = vec![GameEvent::turn(
            format!("You threw a {}!", ball.label()),
            0,
            Some(SoundCue::Ball),
        )];

        if !roll_catch_success(chance, ball, rng) {
            events.push(GameEvent::turn(
                format!("It broke free from the {}!", ball.label()),
                0,
                None,
            ));
            return Ok(self.hand_to_wild(events));
        }

        let species = self.species.clone().ok_or_else(no_wild)?;
        let receipt = ledger.record_catch(&species)?;
        events.push(GameEvent::turn(
            format!("Caught {}!", species.display_name()),
            0,
            None,
        ));
        if receipt.new_pokedex_entry {
            events.push(GameEvent::PokedexRecorded {
                name: species.display_name(),
            });
        }
        events.push(GameEvent::BattleEnded {
            outcome: BattleOutcome::Caught,
            rewards: None,
        });
        let next = self.finish(BattleOutcome::Caught, None);
        Ok(TurnReport { events, next })
    }

    fn use_potion<S: KeyValueStore>(&mut self, ledger: &mut Ledger<S>) -> GameResult<TurnReport> {
        let receipt = ledger.use_potion(self.config.potion_heal)?;
        let events = vec![GameEvent::turn(
            format!(
                "You used a Potion. +{} HP ({}/{})",
                receipt.healed, receipt.hp, receipt.max_hp
            ),
            0,
            None,
        )];
        Ok(self.hand_to_wild(events))
    }

    fn sleep_powder(&mut self) -> GameResult<TurnReport> {
        let turns = self.config.sleep_powder_turns;
        let wild = self.wild.as_mut().ok_or_else(no_wild)?;
        wild.sleep_turns_remaining = turns;
        debug!(turns, "wild put to sleep");
        let message = format!("{} fell asleep!", wild.display_name());
        self.phase = BattlePhase::PlayerChoice;
        Ok(TurnReport {
            events: vec![GameEvent::turn(message, 0, None)],
            next: NextStep::AwaitChoice,
        })
    }

    fn run(&mut self) -> TurnReport {
        info!("player fled");
        let next = self.finish(BattleOutcome::Fled, None);
        TurnReport {
            events: vec![GameEvent::BattleEnded {
                outcome: BattleOutcome::Fled,
                rewards: None,
            }],
            next,
        }
    }

    fn hand_to_wild(&mut self, events: Vec<GameEvent>) -> TurnReport {
        let ticket = self.next_ticket();
        self.phase = BattlePhase::WildRetaliates { ticket };
        TurnReport {
            events,
            next: NextStep::Retaliation {
                ticket,
                delay: self.config.turn_delay(),
            },
        }
    }

    fn victory<S: KeyValueStore>(
        &mut self,
        partner: &str,
        record: &CreatureRecord,
        ledger: &mut Ledger<S>,
        events: &mut Vec<GameEvent>,
    ) -> GameResult<NextStep> {
        let wild = self.wild.as_ref().ok_or_else(no_wild)?;
        let rewards = RewardCalculator.victory_rewards(wild.max_hp, record.level, wild.rarity);
        let level_ups = ledger.award_victory(rewards)?;
        info!(wild = %wild.species_name, xp = rewards.xp, coins = rewards.coins, "victory");

        events.push(GameEvent::BattleEnded {
            outcome: BattleOutcome::Victory,
            rewards: Some(rewards),
        });
        events.extend(level_ups.iter().map(|up| GameEvent::LevelUp {
            species: partner.to_string(),
            new_level: up.new_level,
        }));

        let evolution_check = (!level_ups.is_empty()).then(|| partner.to_string());
        Ok(self.finish(BattleOutcome::Victory, evolution_check))
    }

    /// The wild side's turn, delivered after the turn delay.
    ///
    /// Returns `Ok(None)` for a stale ticket.
    pub fn retaliate<S: KeyValueStore>(
        &mut self,
        ticket: Ticket,
        ledger: &mut Ledger<S>,
        rng: &mut TurnRng,
    ) -> GameResult<Option<TurnReport>> {
        if self.phase != (BattlePhase::WildRetaliates { ticket }) {
            debug!(%ticket, phase = %self.phase, "stale retaliation dropped");
            return Ok(None);
        }
        let result = self.wild_turn(ledger, rng);
        if result.is_err() {
            self.phase = BattlePhase::PlayerChoice;
        }
        result.map(Some)
    }

    fn wild_turn<S: KeyValueStore>(
        &mut self,
        ledger: &mut Ledger<S>,
        rng: &mut TurnRng,
    ) -> GameResult<TurnReport> {
        let wild = self.wild.as_mut().ok_or_else(no_wild)?;

        if wild.is_asleep() {
            wild.sleep_turns_remaining -= 1;
            debug!(left = wild.sleep_turns_remaining, "wild is asleep");
            let message = format!("Wild {} is asleep and didn't attack!", wild.display_name());
            self.phase = BattlePhase::PlayerChoice;
            return Ok(TurnReport {
                events: vec![GameEvent::turn(message, 0, None)],
                next: NextStep::AwaitChoice,
            });
        }

        let name = wild.display_name();
        let (_, record) = ledger.partner()?;
        let roll = rng.next_outcome("wild damage");
        let damage = (5.0 + roll * 10.0 + f64::from(record.level) * 0.5).floor() as u32;
        let record = ledger.damage_partner(damage)?;
        debug!(damage, partner_hp = record.current_hp, "wild attack");

        let mut events = vec![GameEvent::turn(
            format!("Wild {} hit for {}!", name, damage),
            damage,
            Some(SoundCue::Hit),
        )];
        if record.is_fainted() {
            info!("partner knocked out");
            events.push(GameEvent::BattleEnded {
                outcome: BattleOutcome::Defeat,
                rewards: None,
            });
            let next = self.finish(BattleOutcome::Defeat, None);
            return Ok(TurnReport { events, next });
        }

        self.phase = BattlePhase::PlayerChoice;
        Ok(TurnReport {
            events,
            next: NextStep::AwaitChoice,
        })
    }

    fn finish(&mut self, outcome: BattleOutcome, evolution_check: Option<String>) -> NextStep {
        let ticket = self.next_ticket();
        self.phase = BattlePhase::Ended { outcome, ticket };
        self.wild = None;
        self.species = None;
        NextStep::Closing {
            ticket,
            delay: self.config.close_delay(outcome == BattleOutcome::Fled),
            evolution_check,
        }
    }

    /// Close an ended battle once its display delay has passed.
    pub fn close(&mut self, ticket: Ticket) -> Vec<GameEvent> {
        match self.phase {
            BattlePhase::Ended { ticket: current, .. } if current == ticket => {
                debug!(%ticket, "battle closed");
                self.reset();
                vec![GameEvent::BattleClosed]
            }
            _ => {
                debug!(%ticket, phase = %self.phase, "stale close dropped");
                Vec::new()
            }
        }
    }

    /// Drop whatever battle is open. Outstanding tickets become stale.
    pub fn abandon(&mut self) -> Vec<GameEvent> {
        if self.phase.is_idle() {
            return Vec::new();
        }
        info!(phase = %self.phase, "battle abandoned");
        self.reset();
        vec![GameEvent::BattleClosed]
    }

    fn reset(&mut self) {
        self.phase = BattlePhase::Idle;
        self.wild = None;
        self.species = None;
    }

    /// Current battle state for rendering, `None` when no battle is open.
    pub fn view<S: KeyValueStore>(&self, ledger: &Ledger<S>) -> GameResult<Option<BattleView>> {
        if self.phase.is_idle() {
            return Ok(None);
        }
        let (partner, record) = ledger.partner()?;
        let chance = self
            .wild
            .as_ref()
            .map(|wild| preview_catch_chance(wild, record.level));
        Ok(Some(BattleView {
            phase: self.phase,
            wild: self.wild.clone(),
            partner,
            partner_hp: record.current_hp,
            partner_max_hp: record.max_hp,
            partner_level: record.level,
            catch_chance: chance.map(OrderedFloat),
            catch_description: chance.map(get_catch_rate_description),
        }))
    }
}

fn catch_preview(wild: &WildEncounter, partner_level: u32) -> GameEvent {
    let chance = preview_catch_chance(wild, partner_level);
    GameEvent::CatchChance {
        chance: OrderedFloat(chance),
        description: get_catch_rate_description(chance).to_string(),
    }
}

fn no_wild() -> GameError {
    CatchError::NoTarget.into()
}
