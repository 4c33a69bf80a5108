use crate::save::CreatureRecord;
use serde::{Deserialize, Serialize};

const XP_BASE: u32 = 50;
const XP_PER_LEVEL: u32 = 25;
const HP_PER_LEVEL: u32 = 10;
const ATTACK_PER_LEVEL: u32 = 5;

/// XP needed to advance from `level` to `level + 1`.
pub fn xp_threshold(level: u32) -> u32 {
    XP_BASE.saturating_add(level.saturating_mul(XP_PER_LEVEL))
}

/// One step of the leveling loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub new_level: u32,
    pub max_hp: u32,
    pub attack: u32,
}

/// Add `amount` XP and level up as many times as it pays for.
///
/// Each pass subtracts the current threshold, raises the level by one and
/// adds +10 max HP and +5 attack. Current HP is left alone. Afterwards
/// `record.xp < xp_threshold(record.level)` always holds.
pub fn gain_xp(record: &mut CreatureRecord, amount: u32) -> Vec<LevelUp> {
    record.xp = record.xp.saturating_add(amount);
    let mut level_ups = Vec::new();
    while record.xp >= xp_threshold(record.level) {
        record.xp -= xp_threshold(record.level);
        record.level += 1;
        record.max_hp = record.max_hp.saturating_add(HP_PER_LEVEL);
        record.attack = record.attack.saturating_add(ATTACK_PER_LEVEL);
        level_ups.push(LevelUp {
            new_level: record.level,
            max_hp: record.max_hp,
            attack: record.attack,
        });
    }
    level_ups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn record_at(level: u32, xp: u32) -> CreatureRecord {
        CreatureRecord {
            level,
            xp,
            max_hp: 100,
            attack: 15,
            current_hp: 40,
        }
    }

    #[rstest]
    #[case(1, 75)]
    #[case(2, 100)]
    #[case(10, 300)]
    #[case(40, 1050)]
    fn test_threshold_curve(#[case] level: u32, #[case] expected: u32) {
        assert_eq!(xp_threshold(level), expected);
    }

    #[test]
    fn test_below_threshold_only_accumulates() {
        let mut record = record_at(1, 0);
        assert!(gain_xp(&mut record, 74).is_empty());
        assert_eq!(record.xp, 74);
        assert_eq!(record.level, 1);
    }

    #[test]
    fn test_exact_threshold_levels_once() {
        let mut record = record_at(1, 0);
        let ups = gain_xp(&mut record, 75);
        assert_eq!(
            ups,
            vec![LevelUp {
                new_level: 2,
                max_hp: 110,
                attack: 20
            }]
        );
        assert_eq!(record.xp, 0);
        assert_eq!(record.current_hp, 40);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(7)]
    #[case(25)]
    fn test_triple_threshold_grant_fires_every_level(#[case] level: u32) {
        let mut record = record_at(level, 0);
        let grant = 3 * xp_threshold(level);
        let ups = gain_xp(&mut record, grant);

        // Replay the curve by hand to count the expected level-ups.
        let (mut lvl, mut xp, mut expected) = (level, grant, 0);
        while xp >= xp_threshold(lvl) {
            xp -= xp_threshold(lvl);
            lvl += 1;
            expected += 1;
        }

        assert_eq!(ups.len(), expected);
        assert!(ups.len() >= 2);
        assert_eq!(record.level, level + expected as u32);
        assert_eq!(record.xp, xp);
        assert!(record.xp < xp_threshold(record.level));
        let levels: Vec<u32> = ups.iter().map(|u| u.new_level).collect();
        let consecutive: Vec<u32> = (level + 1..=record.level).collect();
        assert_eq!(levels, consecutive);
    }

    #[test]
    fn test_level_up_stat_gains_accumulate() {
        let mut record = record_at(1, 0);
        // 75 + 100 + 125 = 300 buys three levels exactly.
        let ups = gain_xp(&mut record, 300);
        assert_eq!(ups.len(), 3);
        assert_eq!(record.max_hp, 130);
        assert_eq!(record.attack, 30);
        assert_eq!(record.xp, 0);
    }
}
