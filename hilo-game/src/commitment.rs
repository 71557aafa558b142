use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const SALT_SIZE: usize = 32;

/// Hash binding a creator to `secret ‖ salt` before any guesses are made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretCommitment(pub [u8; 32]);

impl SecretCommitment {
    pub fn commit(secret: u8, salt: &[u8; SALT_SIZE]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([secret]);
        hasher.update(salt);
        Self(hasher.finalize().into())
    }

    pub fn verify(&self, secret: u8, salt: &[u8; SALT_SIZE]) -> bool {
        Self::commit(secret, salt) == *self
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        Some(Self(bytes.try_into().ok()?))
    }
}

impl fmt::Display for SecretCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Random salt for a commitment
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

pub fn parse_salt(s: &str) -> Option<[u8; SALT_SIZE]> {
    hex::decode(s).ok()?.try_into().ok()
}
