use serde::{Deserialize, Serialize};
use std::fmt;
use strum::Display;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BattleOutcome {
    Victory,
    Defeat,
    Fled,
    Caught,
}

impl fmt::Display for BattleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_name = match self {
            BattleOutcome::Victory => "Victory",
            BattleOutcome::Defeat => "Defeat",
            BattleOutcome::Fled => "Fled",
            BattleOutcome::Caught => "Caught",
        };
        write!(f, "{}", display_name)
    }
}

/// Audio hints attached to engine events. Playback is the front-end's business.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SoundCue {
    Start,
    Hit,
    Ball,
    Catch,
    Run,
    Victory,
    Lose,
}

impl SoundCue {
    pub fn asset_name(self) -> &'static str {
        match self {
            SoundCue::Start => "wildbattle.mp3",
            SoundCue::Hit => "hit.mp3",
            SoundCue::Ball => "Throw.mp3",
            SoundCue::Catch => "06-caught-a-pokemon.mp3",
            SoundCue::Run => "runaway.mp3",
            SoundCue::Victory => "victory.mp3",
            SoundCue::Lose => "lose.mp3",
        }
    }
}
