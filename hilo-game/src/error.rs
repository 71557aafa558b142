use bitcoin::Network;
use chrono::{DateTime, Utc};
use hilo_core::{GameId, HiloError, Identity, RequestId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Core error: {0}")]
    Core(#[from] HiloError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    // creation
    #[error("End time must be at least {min_seconds}s in the future")]
    EndTimeTooSoon { min_seconds: u64 },

    #[error("Minimum stake {got} sats is below the floor of {floor} sats")]
    StakeFloorViolation { floor: u64, got: u64 },

    #[error("Reward pool {got} sats is below the floor of {floor} sats")]
    RewardFloorViolation { floor: u64, got: u64 },

    #[error("Funded {funded} sats but reward pool is {reward_pool} sats")]
    FundingMismatch { reward_pool: u64, funded: u64 },

    #[error("Ciphertext input rejected: {0}")]
    InvalidInput(String),

    // joining
    #[error("Game {0} no longer accepts participants")]
    MatchClosed(GameId),

    #[error("Game {0} is being settled")]
    SettlementInProgress(GameId),

    #[error("The creator cannot join their own game")]
    CreatorCannotJoin,

    #[error("{0} has already joined this game")]
    AlreadyJoined(Identity),

    #[error("Stake {got} sats is below the minimum of {min} sats")]
    InsufficientStake { min: u64, got: u64 },

    // claims
    #[error("Game {0} is not settled yet")]
    NotSettled(GameId),

    #[error("Only the creator can claim the creator share")]
    Unauthorized,

    #[error("{0} did not take part in this game")]
    NotParticipant(Identity),

    #[error("Only winning participants can claim winnings")]
    NotEligible,

    #[error("Already claimed")]
    AlreadyClaimed,

    #[error("Nothing to claim")]
    NothingToClaim,

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    // settlement
    #[error("Round is still active until {ends_at}")]
    RoundStillActive { ends_at: DateTime<Utc> },

    #[error("Game {0} is already settled")]
    AlreadySettled(GameId),

    #[error("Game {0} already has a decryption pending")]
    RevealAlreadyPending(GameId),

    #[error("No pending decryption for request {0}")]
    UnknownRequest(RequestId),

    #[error("Decryption proof rejected for request {0}")]
    InvalidDecryptionProof(RequestId),

    #[error("Malformed cleartexts: {0}")]
    MalformedCleartexts(String),

    #[error("Expected {expected} guesses, got {got}")]
    MismatchGuessCount { expected: usize, got: usize },

    #[error("Revealed secret does not match the commitment")]
    HashMismatch,

    #[error("Only the creator can reveal this game")]
    UnauthorizedReveal,

    #[error("Secret {0} is outside 1..=10")]
    InvalidSecret(u8),

    #[error("Guesses must be disclosed by the oracle before a fair reveal")]
    GuessesNotDisclosed,

    #[error("Guesses for game {0} were already disclosed")]
    AlreadyDisclosed(GameId),

    #[error("Game has no participants")]
    NoParticipants,

    #[error("Debug reveal is disabled on {0}")]
    DebugRevealDisabled(Network),

    #[error("Reentrant call rejected")]
    Reentrancy,
}

impl GameError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the same call may succeed later without changing its inputs
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GameError::RoundStillActive { .. }
                | GameError::RevealAlreadyPending(_)
                | GameError::SettlementInProgress(_)
                | GameError::NotSettled(_)
                | GameError::TransferFailed(_)
                | GameError::Reentrancy
        )
    }
}
