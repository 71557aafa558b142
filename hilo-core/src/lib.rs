//! HiLo core - shared types and external collaborators for sealed-guess games
//!
//! This crate holds what the game ledger consumes rather than owns: the
//! oracle that seals and decrypts values, the treasury that moves funds, and
//! the SQLite storage both persist into.

pub mod error;
pub mod oracle;
pub mod storage;
pub mod treasury;
pub mod types;

pub use error::{HiloError, Result};
pub use oracle::{LocalOracle, Oracle, Plaintext};
pub use treasury::{MemoryTreasury, Treasury};
pub use types::{
    CiphertextHandle, DecryptionProof, DecryptionResponse, GameId, Identity, InputProof, Receipt,
    RequestId,
};

pub use ::bitcoin::Amount;
pub use ::bitcoin::Network;
