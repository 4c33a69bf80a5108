use crate::battle::engine::BattleEngine;
use crate::battle::state::{BattleAction, BattlePhase, GameEvent, TurnRng};
use crate::battle::tests::common::{
    closing_ticket, retaliation_ticket, wild_species, TestBattleBuilder, PARTNER,
};
use crate::config::EngineConfig;
use crate::errors::{GameError, ProviderError};
use crate::ledger::Ledger;
use crate::save::MemoryStore;
use pretty_assertions::assert_eq;
use schema::RarityTier;

#[test]
fn test_retaliation_after_abandon_is_a_no_op() {
    let mut battle = TestBattleBuilder::new().build();
    battle.start(wild_species("rattata", 20));
    let attack = battle.submit(BattleAction::Attack, vec![0.5]);
    let ticket = retaliation_ticket(&attack);

    assert_eq!(battle.engine.abandon(), vec![GameEvent::BattleClosed]);

    let mut rng = TurnRng::new_for_test(vec![]);
    let result = battle
        .engine
        .retaliate(ticket, &mut battle.ledger, &mut rng)
        .unwrap();
    assert_eq!(result, None);
    assert_eq!(battle.partner().current_hp, 140);
    assert_eq!(battle.engine.phase(), BattlePhase::Idle);
}

#[test]
fn test_old_battle_ticket_is_stale_in_new_battle() {
    let mut battle = TestBattleBuilder::new().build();
    battle.start(wild_species("rattata", 20));
    let first = retaliation_ticket(&battle.submit(BattleAction::Attack, vec![0.5]));
    battle.engine.abandon();

    battle.start(wild_species("pidgey", 20));
    let second = retaliation_ticket(&battle.submit(BattleAction::Attack, vec![0.5]));
    assert_ne!(first, second);

    let mut rng = TurnRng::new_for_test(vec![0.5]);
    let stale = battle
        .engine
        .retaliate(first, &mut battle.ledger, &mut rng)
        .unwrap();
    assert_eq!(stale, None);
    assert_eq!(battle.partner().current_hp, 140);

    let live = battle
        .engine
        .retaliate(second, &mut battle.ledger, &mut rng)
        .unwrap();
    assert!(live.is_some());
    assert_eq!(battle.partner().current_hp, 128);
}

#[test]
fn test_retaliation_cannot_fire_twice() {
    let mut battle = TestBattleBuilder::new().build();
    battle.start(wild_species("rattata", 20));
    let attack = battle.submit(BattleAction::Attack, vec![0.5]);
    battle.retaliate(&attack, vec![0.5]);

    let mut rng = TurnRng::new_for_test(vec![]);
    let again = battle
        .engine
        .retaliate(retaliation_ticket(&attack), &mut battle.ledger, &mut rng)
        .unwrap();
    assert_eq!(again, None);
    assert_eq!(battle.partner().current_hp, 128);
}

#[test]
fn test_encounter_response_after_abandon_is_dropped() {
    let mut battle = TestBattleBuilder::new().build();
    let request = battle.request();
    battle.engine.abandon();

    let events = battle.engine.complete_encounter(
        request.ticket,
        Ok(wild_species("rattata", 20)),
        &battle.ledger,
    );
    assert!(events.is_empty());
    assert_eq!(battle.engine.phase(), BattlePhase::Idle);
    assert!(battle.engine.wild().is_none());
}

#[test]
fn test_provider_failure_cancels_encounter() {
    let mut battle = TestBattleBuilder::new().build();
    let before = battle.save();
    let request = battle.request();

    let events = battle.engine.complete_encounter(
        request.ticket,
        Err(ProviderError::Unreachable("timed out".to_string())),
        &battle.ledger,
    );

    assert_eq!(
        events,
        vec![GameEvent::EncounterCancelled {
            reason: "Species data unavailable: provider unreachable: timed out".to_string(),
        }]
    );
    assert_eq!(battle.engine.phase(), BattlePhase::Idle);
    assert_eq!(battle.save(), before);
}

#[test]
fn test_close_with_wrong_ticket_keeps_battle_open() {
    let mut battle = TestBattleBuilder::new().build();
    battle.start(wild_species("rattata", 20));
    let attack = battle.submit(BattleAction::Attack, vec![0.5]);
    battle.retaliate(&attack, vec![0.5]);
    assert!(battle.engine.close(retaliation_ticket(&attack)).is_empty());
    assert_eq!(battle.engine.phase(), BattlePhase::PlayerChoice);

    let run = battle.submit(BattleAction::Run, vec![]);
    assert!(battle.engine.close(retaliation_ticket(&attack)).is_empty());
    assert!(matches!(battle.engine.phase(), BattlePhase::Ended { .. }));
    assert_eq!(battle.engine.close(closing_ticket(&run)), vec![GameEvent::BattleClosed]);
}

#[test]
fn test_encounter_scales_wild_hp_by_partner_level() {
    let mut battle = TestBattleBuilder::new().with_level(7).with_hp(80).build();
    let events = battle.start(wild_species("bulbasaur", 45));
    assert_eq!(
        events[0],
        GameEvent::EncounterStarted {
            wild: "bulbasaur".to_string(),
            rarity: RarityTier::Common,
            wild_max_hp: 101,
            partner: PARTNER.to_string(),
            partner_hp: 80,
            partner_max_hp: 140,
        }
    );
}

#[test]
fn test_encounter_requires_partner() {
    let ledger = Ledger::open(MemoryStore::new(), EngineConfig::default()).unwrap();
    let mut engine = BattleEngine::new(EngineConfig::default());
    let mut rng = TurnRng::new_for_test(vec![]);
    assert!(matches!(
        engine.request_encounter(&ledger, &mut rng),
        Err(GameError::NoPartner)
    ));
    assert_eq!(engine.phase(), BattlePhase::Idle);
}
