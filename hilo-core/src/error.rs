use crate::types::RequestId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HiloError>;

#[derive(Error, Debug)]
pub enum HiloError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Unknown ciphertext handle: {0}")]
    UnknownHandle(String),

    #[error("Input proof rejected for handle {0}")]
    InvalidInputProof(String),

    #[error("Decryption proof rejected for request {0}")]
    InvalidDecryptionProof(RequestId),

    #[error("Malformed cleartexts: {0}")]
    MalformedCleartexts(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Insufficient funds: need {need} sats, have {available} sats")]
    InsufficientFunds { need: u64, available: u64 },

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HiloError {
    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedCleartexts(msg.into())
    }

    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
