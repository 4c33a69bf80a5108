use super::Ledger;
use crate::battle::state::TurnRng;
use crate::errors::{GameError, GameResult, StoreResult};
use crate::save::KeyValueStore;
use schema::BallKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const MINUTE_MS: u64 = 60_000;

/// Wall-clock time in epoch milliseconds.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokestopReward {
    pub ball: BallKind,
    pub quantity: u32,
    pub coins: u32,
    pub master_ball: bool,
    /// Epoch milliseconds at which the next claim opens.
    pub next_claim_ms: u64,
}

impl fmt::Display for PokestopReward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PokéStop reward: +{} coins, +{} {}",
            self.coins,
            self.quantity,
            self.ball.label()
        )?;
        if self.master_ball {
            write!(f, ", +1 Master Ball!")?;
        }
        Ok(())
    }
}

impl<S: KeyValueStore> Ledger<S> {
    /// Claim the timed PokéStop reward.
    ///
    /// Open from the cooldown timestamp onward, inclusive. A claim before
    /// that is refused with the remaining time and changes nothing.
    pub fn claim_pokestop(&mut self, now_ms: u64, rng: &mut TurnRng) -> GameResult<PokestopReward> {
        let stop = self.config().pokestop.clone();
        let reward = self.transact(|data| {
            if now_ms < data.pokestop_cooldown_ms {
                let remaining_ms = data.pokestop_cooldown_ms - now_ms;
                debug!(remaining_ms, "pokestop not ready");
                return Err(GameError::NotReady { remaining_ms });
            }

            let ball = rng
                .pick(&BallKind::POKESTOP_REWARDS, "pokestop ball")
                .unwrap_or(BallKind::Poke);
            let (lo, hi) = stop.ball_quantity;
            let quantity = rng.uniform_inclusive(lo, hi, "pokestop ball quantity");
            let (lo, hi) = stop.coins;
            let coins = rng.uniform_inclusive(lo, hi, "pokestop coins");
            let master_ball = rng.chance(stop.master_ball_chance, "pokestop master ball");
            let (lo, hi) = stop.cooldown_minutes;
            let minutes = rng.uniform_inclusive(lo, hi, "pokestop cooldown");

            let balls = data.inventory.balls_mut(ball);
            *balls = balls.saturating_add(quantity);
            data.inventory.coins = data.inventory.coins.saturating_add(coins);
            if master_ball {
                data.inventory.master_balls += 1;
            }
            data.pokestop_cooldown_ms = now_ms.saturating_add(u64::from(minutes) * MINUTE_MS);

            Ok(PokestopReward {
                ball,
                quantity,
                coins,
                master_ball,
                next_claim_ms: data.pokestop_cooldown_ms,
            })
        })?;
        info!(
            ball = %reward.ball,
            quantity = reward.quantity,
            coins = reward.coins,
            master_ball = reward.master_ball,
            "pokestop claimed"
        );
        Ok(reward)
    }

    /// Milliseconds until the next claim opens, `None` if it is open now.
    pub fn pokestop_remaining(&self, now_ms: u64) -> StoreResult<Option<u64>> {
        let cooldown = self.snapshot()?.pokestop_cooldown_ms;
        Ok((now_ms < cooldown).then(|| cooldown - now_ms))
    }
}
