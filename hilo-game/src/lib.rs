//! Sealed-guess HiLo wagering
//!
//! A creator seals a secret number in `1..=10` and funds a reward pool.
//! Participants stake on whether it is big (`6..=10`) or small (`1..=5`)
//! with their guesses sealed too. After the round closes the secret and
//! guesses are revealed once and the pot is split: half to the creator,
//! half shared by the winners.

pub mod commitment;
pub mod config;
pub mod error;
pub mod game;
pub mod house;
pub mod ledger;
pub mod settlement;
pub mod store;

#[cfg(test)]
mod testing;

pub use commitment::{generate_salt, parse_salt, SecretCommitment, SALT_SIZE};
pub use config::{HouseConfig, MIN_DURATION};
pub use error::{GameError, Result};
pub use game::{
    CreateGame, DecryptionPurpose, Game, GameStatus, JoinGame, Participant, PendingDecryption,
    RevealPath, Settlement,
};
pub use house::{Clock, GameHouse, ManualClock, SystemClock};
pub use ledger::{GameLedger, TxContext};
pub use settlement::{split_pot, CallbackOutcome, PotSplit, SettlementEngine};
pub use store::LedgerStore;
