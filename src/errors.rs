use thiserror::Error;

/// Main error type for the companion engine.
///
/// Every variant is recoverable: intents that fail are refused without
/// mutating the save or consuming a battle turn, and the `Display` text is
/// what the presentation layer shows to the player.
#[derive(Debug, Error)]
pub enum GameError {
    /// No balls or potions of the requested kind, or not enough coins.
    #[error("No {resource} left!")]
    ResourceExhausted { resource: String },
    /// A cooldown has not elapsed yet.
    #[error("Not ready yet, {} remaining", format_remaining(*remaining_ms))]
    NotReady { remaining_ms: u64 },
    /// The species data provider could not answer.
    #[error("Species data unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),
    /// Sell, swap or lookup on a species the player does not hold.
    #[error("You don't have a {species}.")]
    InvalidSelection { species: String },
    /// An action that needs an active partner was issued without one.
    #[error("Choose a starter partner first.")]
    NoPartner,
    /// A battle intent arrived while the battle is not waiting for one.
    #[error("Can't do that right now ({phase}).")]
    OutOfTurn { phase: String },
    #[error("Save data error: {0}")]
    Storage(#[from] StoreError),
    #[error("The game session has shut down.")]
    SessionClosed,
}

/// Failures reported by a species data provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("species not found: {0}")]
    NotFound(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Failures of the persistent key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt save data under '{key}': {details}")]
    Corrupt { key: String, details: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            ProviderError::NotFound(err.to_string())
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }
}

impl GameError {
    pub fn exhausted(resource: impl Into<String>) -> Self {
        GameError::ResourceExhausted {
            resource: resource.into(),
        }
    }

    pub fn invalid_selection(species: impl Into<String>) -> Self {
        GameError::InvalidSelection {
            species: species.into(),
        }
    }

    /// True for refusals the player can fix by doing something else, as
    /// opposed to I/O trouble underneath the engine.
    pub fn is_refusal(&self) -> bool {
        !matches!(
            self,
            GameError::Storage(_) | GameError::ProviderUnavailable(_) | GameError::SessionClosed
        )
    }
}

/// "2m 05s" style rendering used by cooldown messages.
pub fn format_remaining(remaining_ms: u64) -> String {
    let total_secs = remaining_ms.div_ceil(1000);
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Type alias for Results using GameError
pub type GameResult<T> = Result<T, GameError>;

/// Type alias for Results using ProviderError
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Type alias for Results using StoreError
pub type StoreResult<T> = Result<T, StoreError>;
