use crate::error::{HiloError, Result};
use serde::{Deserialize, Serialize};

/// A value the oracle can seal: the creator's secret number or a big/small guess
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plaintext {
    U8(u8),
    Bool(bool),
}

impl Plaintext {
    /// Tagged form used inside sealed blobs
    pub fn to_tagged(self) -> [u8; 2] {
        match self {
            Plaintext::U8(v) => [0, v],
            Plaintext::Bool(b) => [1, b as u8],
        }
    }

    pub fn from_tagged(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [0, v] => Ok(Plaintext::U8(*v)),
            [1, 0] => Ok(Plaintext::Bool(false)),
            [1, 1] => Ok(Plaintext::Bool(true)),
            _ => Err(HiloError::crypto("Unrecognised sealed value")),
        }
    }

    /// Wire byte in a cleartext batch
    pub fn to_wire(self) -> u8 {
        match self {
            Plaintext::U8(v) => v,
            Plaintext::Bool(b) => b as u8,
        }
    }
}

pub fn encode_cleartexts(values: &[Plaintext]) -> Vec<u8> {
    values.iter().map(|v| v.to_wire()).collect()
}

fn decode_bool(byte: u8, index: usize) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(HiloError::malformed(format!(
            "value {} at position {} is not a boolean",
            other, index
        ))),
    }
}

/// Decode `expected` booleans
pub fn decode_guesses(cleartexts: &[u8], expected: usize) -> Result<Vec<bool>> {
    if cleartexts.len() != expected {
        return Err(HiloError::malformed(format!(
            "expected {} guesses, got {} values",
            expected,
            cleartexts.len()
        )));
    }

    cleartexts
        .iter()
        .enumerate()
        .map(|(i, b)| decode_bool(*b, i))
        .collect()
}

/// Decode a secret followed by `participants` guesses
pub fn decode_secret_and_guesses(cleartexts: &[u8], participants: usize) -> Result<(u8, Vec<bool>)> {
    let (secret, rest) = cleartexts
        .split_first()
        .ok_or_else(|| HiloError::malformed("empty cleartext batch"))?;

    if participants == 0 && !rest.is_empty() {
        return Err(HiloError::malformed(format!(
            "expected a lone secret, got {} trailing values",
            rest.len()
        )));
    }

    let guesses = decode_guesses(rest, participants)?;
    Ok((*secret, guesses))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_secret_only() {
        let (secret, guesses) = decode_secret_and_guesses(&[7], 0).unwrap();
        assert_eq!(secret, 7);
        assert!(guesses.is_empty());

        assert!(decode_secret_and_guesses(&[7, 1], 0).is_err());
        assert!(decode_secret_and_guesses(&[], 0).is_err());
    }

    #[test]
    fn test_decode_secret_and_guesses() {
        let bytes = encode_cleartexts(&[
            Plaintext::U8(6),
            Plaintext::Bool(true),
            Plaintext::Bool(false),
        ]);
        let (secret, guesses) = decode_secret_and_guesses(&bytes, 2).unwrap();
        assert_eq!(secret, 6);
        assert_eq!(guesses, vec![true, false]);
    }

    #[test]
    fn test_rejects_non_boolean_guess() {
        let err = decode_guesses(&[1, 2], 2).unwrap_err();
        assert!(matches!(err, HiloError::MalformedCleartexts(_)));
    }

    #[test]
    fn test_rejects_wrong_guess_count() {
        assert!(decode_secret_and_guesses(&[3, 1], 2).is_err());
    }

    #[test]
    fn test_tagged_values() {
        assert_eq!(Plaintext::from_tagged(&[0, 9]).unwrap(), Plaintext::U8(9));
        assert_eq!(
            Plaintext::from_tagged(&Plaintext::Bool(true).to_tagged()).unwrap(),
            Plaintext::Bool(true)
        );
        assert!(Plaintext::from_tagged(&[1, 5]).is_err());
    }
}
