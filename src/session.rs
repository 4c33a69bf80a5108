//! Async driver around the battle engine.
//!
//! One task owns the engine, the ledger and the random source, and reacts
//! to whichever comes first: a player intent, a finished species lookup,
//! or one of the battle timers. Every deferred battle step carries a
//! ticket, so a timer or lookup that outlives its battle is dropped by the
//! engine instead of acting on the next one.

use crate::battle::{BattleAction, BattleEngine, BattleView, GameEvent, NextStep, Ticket, TurnRng};
use crate::errors::{format_remaining, GameError, GameResult, ProviderResult};
use crate::ledger::{epoch_ms, BagEntry, BagSort, Ledger};
use crate::providers::{chain_for_species, SpeciesProvider, SpeciesQuery};
use crate::save::{KeyValueStore, PokedexEntry, SaveData, Settings};
use schema::{EvolutionChain, ShopItem, SpeciesData};
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Everything a player can ask the game to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    StartBattle,
    Battle(BattleAction),
    /// Close the battle panel, abandoning the battle if it is still running.
    CloseBattle,
    ChooseStarter(String),
    SetActive(String),
    Sell(String),
    Buy(ShopItem),
    /// In battle this is the potion action; outside it heals directly.
    UsePotion,
    ClaimPokestop,
    SetSound(bool),
    SetVolume(f64),
    SetRandomBattles(bool),
    Reset,
}

/// Read-only view for the status header and battle panel.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub save: SaveData,
    pub battle: Option<BattleView>,
    pub loading: bool,
    pub pokestop_remaining_ms: Option<u64>,
    pub next_random_battle: Option<Duration>,
}

enum Command {
    Intent {
        intent: Intent,
        events: mpsc::UnboundedSender<GameEvent>,
    },
    Status(oneshot::Sender<GameResult<StatusReport>>),
    Bag(BagSort, oneshot::Sender<GameResult<Vec<BagEntry>>>),
    Lookup(String, oneshot::Sender<GameResult<SpeciesData>>),
}

enum Completion {
    Encounter {
        ticket: Ticket,
        species: ProviderResult<SpeciesData>,
    },
    Evolution {
        partner: String,
        chain: ProviderResult<Option<EvolutionChain>>,
    },
    Pokedex(ProviderResult<SpeciesData>),
    Starter(ProviderResult<SpeciesData>),
    Lookup {
        reply: oneshot::Sender<GameResult<SpeciesData>>,
        result: ProviderResult<SpeciesData>,
    },
}

/// Cloneable front door to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Intent { intent, .. } => write!(f, "Intent({:?})", intent),
            Command::Status(_) => write!(f, "Status"),
            Command::Bag(sort, _) => write!(f, "Bag({:?})", sort),
            Command::Lookup(name, _) => write!(f, "Lookup({})", name),
        }
    }
}

impl SessionHandle {
    /// Send `intent` and collect what it caused, up to the point where no
    /// lookup or wild turn is outstanding.
    pub async fn dispatch(&self, intent: Intent) -> GameResult<Vec<GameEvent>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.commands
            .send(Command::Intent { intent, events: tx })
            .map_err(|_| GameError::SessionClosed)?;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            if event == GameEvent::Settled {
                break;
            }
            events.push(event);
        }
        Ok(events)
    }

    pub async fn status(&self) -> GameResult<StatusReport> {
        self.request(Command::Status).await
    }

    pub async fn bag(&self, sort: BagSort) -> GameResult<Vec<BagEntry>> {
        self.request(|reply| Command::Bag(sort, reply)).await
    }

    /// Species lookup through the session's provider.
    pub async fn lookup(&self, name: &str) -> GameResult<SpeciesData> {
        let name = name.to_string();
        self.request(|reply| Command::Lookup(name, reply)).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<GameResult<T>>) -> Command,
    ) -> GameResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| GameError::SessionClosed)?;
        rx.await.map_err(|_| GameError::SessionClosed)?
    }
}

pub struct Session<S, P> {
    engine: BattleEngine,
    ledger: Ledger<S>,
    provider: Arc<P>,
    rng: TurnRng,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    listeners: Vec<mpsc::UnboundedSender<GameEvent>>,
    background: mpsc::UnboundedSender<GameEvent>,
    encounter_task: Option<(Ticket, JoinHandle<()>)>,
    evolution_pending: bool,
    pokedex_pending: bool,
    starter_pending: bool,
    retaliation: Option<(Instant, Ticket)>,
    closing: Option<(Instant, Ticket)>,
    random_battle: Option<Instant>,
}

impl<S, P> Session<S, P>
where
    S: KeyValueStore + 'static,
    P: SpeciesProvider,
{
    /// Build a session. Events nobody is waiting for (random battles,
    /// late closes) go to the returned receiver.
    pub fn new(
        ledger: Ledger<S>,
        provider: P,
        rng: TurnRng,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<GameEvent>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (background, background_rx) = mpsc::unbounded_channel();
        let session = Self {
            engine: BattleEngine::new(ledger.config().clone()),
            ledger,
            provider: Arc::new(provider),
            rng,
            commands,
            completions_tx,
            completions,
            listeners: Vec::new(),
            background,
            encounter_task: None,
            evolution_pending: false,
            pokedex_pending: false,
            starter_pending: false,
            retaliation: None,
            closing: None,
            random_battle: None,
        };
        let handle = SessionHandle {
            commands: commands_tx,
        };
        (session, handle, background_rx)
    }

    /// Spawn the session on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        match self.ledger.snapshot() {
            Ok(save) if save.settings.random_battles => self.arm_random_battle(),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "could not read settings"),
        }
        info!("session started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
                _ = wait_for(self.retaliation.map(|(at, _)| at)) => {
                    if let Some((_, ticket)) = self.retaliation.take() {
                        self.run_retaliation(ticket);
                    }
                }
                _ = wait_for(self.closing.map(|(at, _)| at)) => {
                    if let Some((_, ticket)) = self.closing.take() {
                        let events = self.engine.close(ticket);
                        self.emit_all(events);
                    }
                }
                _ = wait_for(self.random_battle) => {
                    self.random_battle = None;
                    self.fire_random_battle();
                }
            }

            if self.is_settled() {
                for listener in self.listeners.drain(..) {
                    let _ = listener.send(GameEvent::Settled);
                }
            }
        }

        if let Some((_, task)) = self.encounter_task.take() {
            task.abort();
        }
        info!("session ended");
    }

    fn is_settled(&self) -> bool {
        self.encounter_task.is_none()
            && !self.evolution_pending
            && !self.pokedex_pending
            && !self.starter_pending
            && self.retaliation.is_none()
    }

    fn emit(&mut self, event: GameEvent) {
        if self.listeners.is_empty() {
            let _ = self.background.send(event);
            return;
        }
        self.listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    fn emit_all(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    fn refuse(&mut self, err: &GameError) {
        if err.is_refusal() {
            debug!(error = %err, "intent refused");
        } else {
            warn!(error = %err, "intent failed");
        }
        self.emit(GameEvent::refused(err));
    }

    fn handle_command(&mut self, command: Command) {
        debug!(?command, "command");
        match command {
            Command::Intent { intent, events } => {
                self.listeners.push(events);
                self.handle_intent(intent);
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Bag(sort, reply) => {
                let _ = reply.send(self.ledger.bag(sort).map_err(GameError::from));
            }
            Command::Lookup(name, reply) => {
                let provider = Arc::clone(&self.provider);
                let completions = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = provider.species(SpeciesQuery::name(&name)).await;
                    let _ = completions.send(Completion::Lookup { reply, result });
                });
            }
        }
    }

    fn status(&self) -> GameResult<StatusReport> {
        let now = Instant::now();
        Ok(StatusReport {
            save: self.ledger.snapshot()?,
            battle: self.engine.view(&self.ledger)?,
            loading: self.engine.is_loading(),
            pokestop_remaining_ms: self.ledger.pokestop_remaining(epoch_ms())?,
            next_random_battle: self.random_battle.map(|at| at.saturating_duration_since(now)),
        })
    }

    fn handle_intent(&mut self, intent: Intent) {
        let result = match intent {
            Intent::StartBattle => self.start_battle(),
            Intent::Battle(action) => self.battle_action(action),
            Intent::UsePotion if self.engine.in_battle() => {
                self.battle_action(BattleAction::UsePotion)
            }
            Intent::CloseBattle => {
                self.close_battle();
                Ok(())
            }
            Intent::ChooseStarter(name) => self.choose_starter(name),
            Intent::SetActive(name) => self.out_of_battle().and_then(|_| {
                let swap = self.ledger.set_active(&name)?;
                self.emit(GameEvent::PartnerChanged {
                    species: swap.species,
                    previous: swap.previous,
                });
                Ok(())
            }),
            Intent::Sell(name) => self.ledger.sell(&name).map(|sale| {
                self.emit(GameEvent::Sold {
                    species: sale.species,
                    coins: sale.coins,
                    remaining: sale.remaining,
                })
            }),
            Intent::Buy(item) => self.ledger.buy(item).map(|purchase| {
                self.emit(GameEvent::Purchased {
                    item: purchase.item,
                    price: purchase.price,
                    coins_left: purchase.coins_left,
                })
            }),
            Intent::UsePotion => {
                let heal = self.ledger.config().potion_heal;
                self.ledger.use_potion(heal).map(|receipt| {
                    self.emit(GameEvent::PotionUsed {
                        healed: receipt.healed,
                        hp: receipt.hp,
                        max_hp: receipt.max_hp,
                    })
                })
            }
            Intent::ClaimPokestop => {
                self.claim_pokestop();
                Ok(())
            }
            Intent::SetSound(on) => self.update_settings(|settings| settings.sound_on = on),
            Intent::SetVolume(volume) => {
                self.update_settings(|settings| settings.set_volume(volume))
            }
            Intent::SetRandomBattles(on) => {
                let result = self.update_settings(|settings| settings.random_battles = on);
                if result.is_ok() {
                    if on {
                        self.arm_random_battle();
                    } else {
                        self.random_battle = None;
                    }
                }
                result
            }
            Intent::Reset => self.reset(),
        };

        if let Err(err) = result {
            self.refuse(&err);
        }
    }

    fn out_of_battle(&self) -> GameResult<()> {
        if self.engine.in_battle() {
            return Err(GameError::OutOfTurn {
                phase: "finish the battle first".to_string(),
            });
        }
        Ok(())
    }

    fn start_battle(&mut self) -> GameResult<()> {
        let request = self.engine.request_encounter(&self.ledger, &mut self.rng)?;
        self.emit(GameEvent::EncounterLoading);

        let provider = Arc::clone(&self.provider);
        let completions = self.completions_tx.clone();
        let ticket = request.ticket;
        let task = tokio::spawn(async move {
            let species = provider.species(SpeciesQuery::Id(request.species_id)).await;
            let _ = completions.send(Completion::Encounter { ticket, species });
        });
        self.encounter_task = Some((ticket, task));
        Ok(())
    }

    fn battle_action(&mut self, action: BattleAction) -> GameResult<()> {
        let report = self
            .engine
            .submit(action, &mut self.ledger, &mut self.rng)?;
        self.emit_all(report.events);
        self.schedule(report.next);
        Ok(())
    }

    fn schedule(&mut self, next: NextStep) {
        match next {
            NextStep::AwaitChoice => {}
            NextStep::Retaliation { ticket, delay } => {
                self.retaliation = Some((Instant::now() + delay, ticket));
            }
            NextStep::Closing {
                ticket,
                delay,
                evolution_check,
            } => {
                self.retaliation = None;
                self.closing = Some((Instant::now() + delay, ticket));
                if let Some(partner) = evolution_check {
                    self.check_evolution(partner);
                }
            }
        }
    }

    fn run_retaliation(&mut self, ticket: Ticket) {
        match self
            .engine
            .retaliate(ticket, &mut self.ledger, &mut self.rng)
        {
            Ok(Some(report)) => {
                self.emit_all(report.events);
                self.schedule(report.next);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "wild turn failed");
                self.refuse(&err);
            }
        }
    }

    fn close_battle(&mut self) {
        self.retaliation = None;
        self.closing = None;
        if let Some((_, task)) = self.encounter_task.take() {
            task.abort();
        }
        let events = self.engine.abandon();
        self.emit_all(events);
    }

    fn check_evolution(&mut self, partner: String) {
        let provider = Arc::clone(&self.provider);
        let completions = self.completions_tx.clone();
        self.evolution_pending = true;
        tokio::spawn(async move {
            let chain = chain_for_species(provider.as_ref(), &partner).await;
            let _ = completions.send(Completion::Evolution { partner, chain });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Encounter { ticket, species } => {
                if matches!(&self.encounter_task, Some((pending, _)) if *pending == ticket) {
                    self.encounter_task = None;
                }
                let events = self.engine.complete_encounter(ticket, species, &self.ledger);
                self.emit_all(events);
            }
            Completion::Evolution { partner, chain } => {
                self.evolution_pending = false;
                let chain = match chain {
                    Ok(Some(chain)) => chain,
                    Ok(None) => return,
                    Err(err) => {
                        warn!(%partner, error = %err, "evolution check abandoned");
                        return;
                    }
                };
                match self.ledger.evolve_partner(&partner, &chain) {
                    Ok(Some(evolution)) => {
                        info!(from = %evolution.from, to = %evolution.to, "partner evolved");
                        self.emit(GameEvent::Evolved {
                            from: evolution.from,
                            new_species_name: evolution.to.clone(),
                        });
                        self.record_evolved_species(evolution.to);
                    }
                    Ok(None) => {}
                    Err(err) => warn!(%partner, error = %err, "evolution not applied"),
                }
            }
            Completion::Pokedex(species) => {
                self.pokedex_pending = false;
                let recorded = species.map_err(GameError::from).and_then(|species| {
                    let added = self
                        .ledger
                        .record_pokedex(PokedexEntry::from_species(&species))?;
                    Ok(added.then(|| species.display_name()))
                });
                match recorded {
                    Ok(Some(name)) => self.emit(GameEvent::PokedexRecorded { name }),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "pokedex entry for evolved partner skipped"),
                }
            }
            Completion::Starter(species) => {
                self.starter_pending = false;
                let chosen = species
                    .map_err(GameError::from)
                    .and_then(|species| self.ledger.choose_starter(&species));
                match chosen {
                    Ok(key) => self.emit(GameEvent::StarterChosen { species: key }),
                    Err(err) => self.refuse(&err),
                }
            }
            Completion::Lookup { reply, result } => {
                let _ = reply.send(result.map_err(GameError::from));
            }
        }
    }

    fn record_evolved_species(&mut self, species: String) {
        let provider = Arc::clone(&self.provider);
        let completions = self.completions_tx.clone();
        self.pokedex_pending = true;
        tokio::spawn(async move {
            let result = provider.species(SpeciesQuery::name(&species)).await;
            let _ = completions.send(Completion::Pokedex(result));
        });
    }

    /// Checks what it can now; the ledger write happens when the species
    /// lookup completes.
    fn choose_starter(&mut self, name: String) -> GameResult<()> {
        self.out_of_battle()?;
        if self.starter_pending {
            return Err(GameError::OutOfTurn {
                phase: "starter lookup in progress".to_string(),
            });
        }
        if let Ok((current, _)) = self.ledger.partner() {
            return Err(GameError::OutOfTurn {
                phase: format!("{} is already your partner", schema::display_name(&current)),
            });
        }

        let provider = Arc::clone(&self.provider);
        let completions = self.completions_tx.clone();
        self.starter_pending = true;
        tokio::spawn(async move {
            let species = provider.species(SpeciesQuery::name(&name)).await;
            let _ = completions.send(Completion::Starter(species));
        });
        Ok(())
    }

    fn claim_pokestop(&mut self) {
        match self.ledger.claim_pokestop(epoch_ms(), &mut self.rng) {
            Ok(reward) => self.emit(GameEvent::PokestopClaimed(reward)),
            Err(GameError::NotReady { remaining_ms }) => self.emit(GameEvent::ClaimRejected {
                reason: format!("PokéStop will be ready in {}", format_remaining(remaining_ms)),
                remaining_ms,
            }),
            Err(err) => self.refuse(&err),
        }
    }

    fn update_settings(&mut self, op: impl FnOnce(&mut Settings)) -> GameResult<()> {
        let settings = self.ledger.update_settings(op)?;
        self.emit(GameEvent::SettingsChanged(settings));
        Ok(())
    }

    fn reset(&mut self) -> GameResult<()> {
        self.close_battle();
        self.random_battle = None;
        self.ledger.reset()?;
        info!("save reset");
        self.emit(GameEvent::SaveReset);
        Ok(())
    }

    fn arm_random_battle(&mut self) {
        let (lo, hi) = self.ledger.config().random_battle_secs;
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        let roll = self.rng.next_outcome("random battle delay");
        let secs = lo as f64 + roll * (hi - lo) as f64;
        self.random_battle = Some(Instant::now() + Duration::from_secs_f64(secs));
        debug!(secs, "random battle armed");
        self.emit(GameEvent::RandomBattleScheduled {
            in_secs: secs.round() as u64,
        });
    }

    fn fire_random_battle(&mut self) {
        self.arm_random_battle();
        if self.engine.in_battle() {
            debug!("random battle skipped, already in battle");
            return;
        }
        if let Err(err) = self.start_battle() {
            debug!(error = %err, "random battle not started");
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_support::{ledger, ledger_with_partner};
    use crate::providers::CatalogProvider;
    use crate::save::{CreatureRecord, MemoryStore};
    use pretty_assertions::assert_eq;
    use schema::{BallKind, RarityTier};

    const LATENCY: Duration = Duration::from_millis(300);

    /// Ledger with a full-HP charmander partner.
    fn charmander(level: u32, xp: u32, attack: u32) -> Ledger<MemoryStore> {
        let record = CreatureRecord {
            level,
            xp,
            max_hp: 140,
            attack,
            current_hp: 140,
        };
        ledger_with_partner("charmander", record)
    }

    fn start(
        ledger: Ledger<MemoryStore>,
        rolls: Vec<f64>,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<GameEvent>, JoinHandle<()>) {
        start_with_latency(ledger, rolls, LATENCY)
    }

    fn start_with_latency(
        ledger: Ledger<MemoryStore>,
        rolls: Vec<f64>,
        latency: Duration,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<GameEvent>, JoinHandle<()>) {
        let provider = CatalogProvider::with_latency(latency);
        let rng = TurnRng::new_for_test(rolls);
        let (session, handle, background) = Session::new(ledger, provider, rng);
        (handle, background, session.spawn())
    }

    fn messages(events: &[GameEvent]) -> Vec<String> {
        events.iter().filter_map(GameEvent::format).collect()
    }

    async fn partner_hp(handle: &SessionHandle) -> u32 {
        let status = handle.status().await.unwrap();
        status.save.partner().map(|(_, record)| record.current_hp).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_battle_waits_for_species() {
        // Roll 0.0 draws species #1.
        let (handle, _background, _task) = start(charmander(5, 0, 15), vec![0.0]);

        let events = handle.dispatch(Intent::StartBattle).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], GameEvent::EncounterLoading);
        assert_eq!(
            events[1],
            GameEvent::EncounterStarted {
                wild: "bulbasaur".to_string(),
                rarity: RarityTier::Common,
                wild_max_hp: 85,
                partner: "charmander".to_string(),
                partner_hp: 140,
                partner_max_hp: 140,
            }
        );
        assert!(matches!(events[2], GameEvent::CatchChance { .. }));

        let status = handle.status().await.unwrap();
        assert!(!status.loading);
        assert_eq!(
            status.battle.and_then(|view| view.wild).map(|wild| wild.current_hp),
            Some(85)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attack_waits_for_wild_turn() {
        let (handle, _background, _task) = start(charmander(5, 0, 15), vec![0.0, 0.5, 0.5]);
        handle.dispatch(Intent::StartBattle).await.unwrap();

        let started = Instant::now();
        let events = handle.dispatch(Intent::Battle(BattleAction::Attack)).await.unwrap();
        assert_eq!(
            messages(&events),
            vec!["You hit for 15!".to_string(), "Wild Bulbasaur hit for 12!".to_string()]
        );
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(partner_hp(&handle).await, 128);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_does_not_hold_up_wild_turn() {
        let ledger = charmander(5, 0, 15);
        let (handle, _background, _task) =
            start_with_latency(ledger, vec![0.0, 0.5, 0.5], Duration::from_secs(10));
        handle.dispatch(Intent::StartBattle).await.unwrap();

        let attack = async {
            let started = Instant::now();
            let events = handle.dispatch(Intent::Battle(BattleAction::Attack)).await;
            (events.unwrap(), started.elapsed())
        };
        let (species, (events, elapsed)) = tokio::join!(handle.lookup("pikachu"), attack);

        assert_eq!(
            messages(&events),
            vec!["You hit for 15!".to_string(), "Wild Bulbasaur hit for 12!".to_string()]
        );
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_secs(1));
        assert_eq!(species.unwrap().key(), "pikachu");
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_refused_while_loading() {
        let (handle, _background, _task) = start(charmander(5, 0, 15), vec![0.0]);

        let (start_events, attack_events) = tokio::join!(
            handle.dispatch(Intent::StartBattle),
            handle.dispatch(Intent::Battle(BattleAction::Attack)),
        );
        let refusal = GameEvent::ActionRefused {
            reason: "Can't do that right now (encounter loading).".to_string(),
        };
        let attack_events = attack_events.unwrap();
        assert_eq!(attack_events[0], refusal);
        assert!(start_events.unwrap().contains(&refusal));
        // The refused attack consumed no turn and no roll.
        assert!(attack_events
            .iter()
            .any(|event| matches!(event, GameEvent::EncounterStarted { .. })));
        assert_eq!(partner_hp(&handle).await, 140);
    }

    #[tokio::test(start_paused = true)]
    async fn test_victory_evolves_partner() {
        let ledger = charmander(15, 424, 500);
        let (handle, mut background, _task) = start(ledger, vec![0.0, 0.0]);
        handle.dispatch(Intent::StartBattle).await.unwrap();

        let events = handle.dispatch(Intent::Battle(BattleAction::Attack)).await.unwrap();
        let tail = &events[events.len() - 3..];
        assert_eq!(
            tail,
            &[
                GameEvent::LevelUp {
                    species: "charmander".to_string(),
                    new_level: 16,
                },
                GameEvent::Evolved {
                    from: "charmander".to_string(),
                    new_species_name: "charmeleon".to_string(),
                },
                GameEvent::PokedexRecorded {
                    name: "Charmeleon".to_string(),
                },
            ]
        );

        let status = handle.status().await.unwrap();
        let (active, record) = status.save.partner().unwrap();
        assert_eq!(active, "charmeleon");
        assert_eq!(record.level, 16);
        assert_eq!(record.attack, 505);
        assert_eq!(record.max_hp, 150);

        // The panel closes on its own afterwards.
        assert_eq!(background.recv().await, Some(GameEvent::BattleClosed));
        assert!(handle.status().await.unwrap().battle.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_evolution_lookup_keeps_partner() {
        // Not in the catalog, so the chain lookup fails.
        let record = CreatureRecord {
            level: 15,
            xp: 424,
            max_hp: 140,
            attack: 500,
            current_hp: 140,
        };
        let ledger = ledger_with_partner("missingno", record);
        let (handle, mut background, _task) = start(ledger, vec![0.0, 0.0]);
        handle.dispatch(Intent::StartBattle).await.unwrap();
        let before = handle.status().await.unwrap().save;

        let events = handle.dispatch(Intent::Battle(BattleAction::Attack)).await.unwrap();
        assert_eq!(
            events.last(),
            Some(&GameEvent::LevelUp {
                species: "missingno".to_string(),
                new_level: 16,
            })
        );
        assert!(!events
            .iter()
            .any(|event| matches!(event, GameEvent::Evolved { .. })));

        let after = handle.status().await.unwrap().save;
        assert_eq!(after.active_partner, before.active_partner);
        assert_eq!(after.pokedex, before.pokedex);
        assert_eq!(after.party, before.party);
        assert_eq!(
            after.creatures.keys().collect::<Vec<_>>(),
            before.creatures.keys().collect::<Vec<_>>()
        );
        let (_, record) = after.partner().unwrap();
        assert_eq!(record.level, 16);
        assert_eq!(record.attack, 505);
        assert!(after.inventory.coins > before.inventory.coins);

        assert_eq!(background.recv().await, Some(GameEvent::BattleClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_wild_turn_cancels_it() {
        let (handle, _background, _task) = start(charmander(5, 0, 15), vec![0.0, 0.5]);
        handle.dispatch(Intent::StartBattle).await.unwrap();

        let (attack_events, close_events) = tokio::join!(
            handle.dispatch(Intent::Battle(BattleAction::Attack)),
            handle.dispatch(Intent::CloseBattle),
        );
        let attack_events = attack_events.unwrap();
        assert_eq!(messages(&attack_events), vec!["You hit for 15!".to_string()]);
        assert_eq!(attack_events.last(), Some(&GameEvent::BattleClosed));
        assert!(close_events.unwrap().contains(&GameEvent::BattleClosed));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(partner_hp(&handle).await, 140);
        assert!(handle.status().await.unwrap().battle.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pokestop_claim_then_cooldown() {
        let (handle, _background, _task) = start(ledger(), vec![0.5, 0.6, 0.0, 0.99, 0.99]);

        let events = handle.dispatch(Intent::ClaimPokestop).await.unwrap();
        match &events[..] {
            [GameEvent::PokestopClaimed(reward)] => {
                assert_eq!(reward.ball, BallKind::Great);
                assert_eq!(reward.quantity, 4);
                assert_eq!(reward.coins, 10);
                assert!(!reward.master_ball);
            }
            other => panic!("unexpected events: {:?}", other),
        }

        let events = handle.dispatch(Intent::ClaimPokestop).await.unwrap();
        match &events[..] {
            [GameEvent::ClaimRejected { reason, remaining_ms }] => {
                assert!(reason.starts_with("PokéStop will be ready in "));
                assert!(*remaining_ms > 290_000 && *remaining_ms <= 300_000);
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_starter_and_partner_swaps() {
        let (handle, _background, _task) = start(ledger(), vec![0.0]);

        let starter = Intent::ChooseStarter("Pikachu".to_string());
        let events = handle.dispatch(starter).await.unwrap();
        assert_eq!(
            events,
            vec![GameEvent::StarterChosen {
                species: "pikachu".to_string(),
            }]
        );

        let again = handle.dispatch(Intent::ChooseStarter("eevee".to_string())).await.unwrap();
        assert!(matches!(&again[..], [GameEvent::ActionRefused { .. }]));

        handle.dispatch(Intent::StartBattle).await.unwrap();
        let swap = handle.dispatch(Intent::SetActive("pikachu".to_string())).await.unwrap();
        assert_eq!(
            swap,
            vec![GameEvent::ActionRefused {
                reason: "Can't do that right now (finish the battle first).".to_string(),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_starter_refused_while_first_loads() {
        let (handle, _background, _task) = start(ledger(), vec![]);

        let (first, second) = tokio::join!(
            handle.dispatch(Intent::ChooseStarter("pikachu".to_string())),
            handle.dispatch(Intent::ChooseStarter("eevee".to_string())),
        );
        let chosen = GameEvent::StarterChosen {
            species: "pikachu".to_string(),
        };
        assert_eq!(
            second.unwrap(),
            vec![
                GameEvent::ActionRefused {
                    reason: "Can't do that right now (starter lookup in progress).".to_string(),
                },
                chosen.clone(),
            ]
        );
        assert!(first.unwrap().contains(&chosen));
        let status = handle.status().await.unwrap();
        assert_eq!(status.save.active_partner.as_deref(), Some("pikachu"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_battle_fires_in_background() {
        let ledger = charmander(5, 0, 15);
        let (handle, mut background, _task) = start(ledger, vec![0.0, 0.0, 0.0]);

        let events = handle.dispatch(Intent::SetRandomBattles(true)).await.unwrap();
        assert!(matches!(
            events[0],
            GameEvent::SettingsChanged(ref settings) if settings.random_battles
        ));
        assert_eq!(events[1], GameEvent::RandomBattleScheduled { in_secs: 60 });

        let started = Instant::now();
        assert_eq!(
            background.recv().await,
            Some(GameEvent::RandomBattleScheduled { in_secs: 60 })
        );
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(background.recv().await, Some(GameEvent::EncounterLoading));
        assert!(matches!(
            background.recv().await,
            Some(GameEvent::EncounterStarted { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_save() {
        let (handle, _background, _task) = start(charmander(5, 0, 15), vec![0.0]);
        handle.dispatch(Intent::StartBattle).await.unwrap();

        let events = handle.dispatch(Intent::Reset).await.unwrap();
        assert_eq!(events, vec![GameEvent::BattleClosed, GameEvent::SaveReset]);
        let status = handle.status().await.unwrap();
        assert!(status.save.active_partner.is_none());
        assert!(status.battle.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_is_reported() {
        let (handle, _background, task) = start(ledger(), vec![]);
        task.abort();
        let _ = task.await;
        assert!(matches!(
            handle.dispatch(Intent::StartBattle).await,
            Err(GameError::SessionClosed)
        ));
    }
}
