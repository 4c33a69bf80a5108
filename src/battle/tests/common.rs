use crate::battle::engine::{BattleEngine, EncounterRequest, NextStep, TurnReport};
use crate::battle::state::{BattleAction, GameEvent, Ticket, TurnRng};
use crate::config::EngineConfig;
use crate::ledger::Ledger;
use crate::save::{CreatureRecord, Inventory, MemoryStore, SaveData};
use schema::{BallKind, BaseStat, SpeciesData};

pub const PARTNER: &str = "charmander";

/// Species data as a provider would return it.
pub fn wild_species(name: &str, base_hp: u16) -> SpeciesData {
    SpeciesData {
        id: 19,
        name: name.to_string(),
        base_hp,
        types: vec!["normal".to_string()],
        abilities: vec!["guts".to_string()],
        stats: vec![BaseStat {
            name: "hp".to_string(),
            value: base_hp,
        }],
        sprite_ref: None,
        evolution_chain_ref: None,
    }
}

/// A builder for a ledger with an active partner and an idle engine.
///
/// # Example
/// ```
/// let mut battle = TestBattleBuilder::new()
///     .with_level(10)
///     .with_balls(BallKind::Master, 1)
///     .build();
/// battle.start(wild_species("rattata", 20));
/// ```
pub struct TestBattleBuilder {
    partner: CreatureRecord,
    balls: Vec<(BallKind, u32)>,
    potions: Option<u32>,
}

impl TestBattleBuilder {
    /// Level 5, 140 HP, attack 15.
    pub fn new() -> Self {
        Self {
            partner: CreatureRecord {
                level: 5,
                xp: 0,
                max_hp: 140,
                attack: 15,
                current_hp: 140,
            },
            balls: Vec::new(),
            potions: None,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.partner.level = level;
        self
    }

    pub fn with_attack(mut self, attack: u32) -> Self {
        self.partner.attack = attack;
        self
    }

    /// Sets the partner's current HP. Max HP is unchanged.
    pub fn with_hp(mut self, hp: u32) -> Self {
        self.partner.current_hp = hp;
        self
    }

    pub fn with_balls(mut self, kind: BallKind, count: u32) -> Self {
        self.balls.push((kind, count));
        self
    }

    pub fn with_potions(mut self, count: u32) -> Self {
        self.potions = Some(count);
        self
    }

    pub fn build(self) -> TestBattle {
        let mut ledger = Ledger::open(MemoryStore::new(), EngineConfig::default())
            .unwrap_or_else(|err| panic!("Failed to open test ledger: {}", err));
        ledger
            .transact(|data| {
                data.creatures.insert(PARTNER.to_string(), self.partner);
                data.active_partner = Some(PARTNER.to_string());
                for (kind, count) in self.balls {
                    *data.inventory.balls_mut(kind) = count;
                }
                if let Some(potions) = self.potions {
                    data.inventory.potions = potions;
                }
                Ok(())
            })
            .unwrap_or_else(|err| panic!("Failed to seed test ledger: {}", err));

        TestBattle {
            engine: BattleEngine::new(EngineConfig::default()),
            ledger,
        }
    }
}

pub struct TestBattle {
    pub engine: BattleEngine,
    pub ledger: Ledger<MemoryStore>,
}

impl TestBattle {
    /// Request an encounter and hand back its species request.
    pub fn request(&mut self) -> EncounterRequest {
        let mut rng = TurnRng::new_for_test(vec![0.0]);
        self.engine
            .request_encounter(&self.ledger, &mut rng)
            .unwrap_or_else(|err| panic!("Encounter request failed: {}", err))
    }

    /// Start a battle against `wild` and return the encounter events.
    pub fn start(&mut self, wild: SpeciesData) -> Vec<GameEvent> {
        let request = self.request();
        self.engine
            .complete_encounter(request.ticket, Ok(wild), &self.ledger)
    }

    pub fn submit(&mut self, action: BattleAction, rolls: Vec<f64>) -> TurnReport {
        let mut rng = TurnRng::new_for_test(rolls);
        self.engine
            .submit(action, &mut self.ledger, &mut rng)
            .unwrap_or_else(|err| panic!("{:?} was refused: {}", action, err))
    }

    /// Run the wild turn scheduled by `report`.
    pub fn retaliate(&mut self, report: &TurnReport, rolls: Vec<f64>) -> TurnReport {
        let ticket = retaliation_ticket(report);
        let mut rng = TurnRng::new_for_test(rolls);
        self.engine
            .retaliate(ticket, &mut self.ledger, &mut rng)
            .unwrap_or_else(|err| panic!("Retaliation failed: {}", err))
            .unwrap_or_else(|| panic!("Retaliation ticket {} was stale", ticket))
    }

    pub fn set_wild_hp(&mut self, hp: u32) {
        match self.engine.wild_mut() {
            Some(wild) => wild.current_hp = hp,
            None => panic!("No wild creature to adjust"),
        }
    }

    pub fn save(&self) -> SaveData {
        self.ledger
            .snapshot()
            .unwrap_or_else(|err| panic!("Failed to read save: {}", err))
    }

    pub fn partner(&self) -> CreatureRecord {
        self.save()
            .creature(PARTNER)
            .cloned()
            .unwrap_or_else(|| panic!("Partner record missing"))
    }

    pub fn inventory(&self) -> Inventory {
        self.save().inventory
    }
}

pub fn retaliation_ticket(report: &TurnReport) -> Ticket {
    match &report.next {
        NextStep::Retaliation { ticket, .. } => *ticket,
        other => panic!("Expected a scheduled retaliation, got {:?}", other),
    }
}

pub fn closing_ticket(report: &TurnReport) -> Ticket {
    match &report.next {
        NextStep::Closing { ticket, .. } => *ticket,
        other => panic!("Expected the battle to be closing, got {:?}", other),
    }
}

/// Text of every `TurnResolved` event, in order.
pub fn turn_messages(events: &[GameEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            GameEvent::TurnResolved { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
