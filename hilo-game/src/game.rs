use crate::commitment::SecretCommitment;
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use hilo_core::{CiphertextHandle, GameId, Identity, InputProof, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters a creator opens a round with
#[derive(Debug, Clone)]
pub struct CreateGame {
    pub encrypted_secret: CiphertextHandle,
    pub input_proof: InputProof,
    pub commitment: SecretCommitment,
    pub min_stake: Amount,
    pub end_time: DateTime<Utc>,
    pub reward_pool: Amount,
    pub auto_settle: bool,
}

/// A participant's sealed big/small guess
#[derive(Debug, Clone)]
pub struct JoinGame {
    pub encrypted_choice: CiphertextHandle,
    pub input_proof: InputProof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub identity: Identity,
    pub encrypted_choice: CiphertextHandle,
    pub stake: Amount,
    pub joined_at: DateTime<Utc>,
    pub won: bool,
    pub claimed: bool,
    pub choice_revealed: bool,
    pub guessed_big: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecryptionPurpose {
    /// Secret plus every guess, settles the game
    Settlement,
    /// Guesses only, feeds a later fair reveal
    GuessDisclosure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecryption {
    pub request_id: RequestId,
    pub purpose: DecryptionPurpose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealPath {
    Oracle,
    FairReveal,
    Debug,
}

/// Post-reveal fields, written exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub revealed_number: u8,
    pub number_is_big: bool,
    pub winners_count: u32,
    pub creator_share: Amount,
    pub payout_per_winner: Amount,
    pub creator_bonus_remainder: Amount,
    pub settled_at: DateTime<Utc>,
    pub settled_via: RevealPath,
}

impl Settlement {
    /// What the creator walks away with
    pub fn creator_payout(&self) -> Amount {
        self.creator_share + self.creator_bonus_remainder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Open,
    AwaitingReveal,
    DisclosingGuesses,
    RevealPending,
    Settled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub creator: Identity,
    pub min_stake: Amount,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub reward_pool: Amount,
    pub total_pot: Amount,
    pub secret_commitment: SecretCommitment,
    pub encrypted_secret: CiphertextHandle,
    pub auto_settle_enabled: bool,
    pub creator_claimed: bool,
    pub pending: Option<PendingDecryption>,
    pub disclosed_guesses: Option<Vec<bool>>,
    pub settlement: Option<Settlement>,
    pub participant_list: Vec<Identity>,
    pub participants: HashMap<Identity, Participant>,
}

impl Game {
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    /// Any decryption outstanding with the oracle
    pub fn is_reveal_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    pub fn status(&self, now: DateTime<Utc>) -> GameStatus {
        if self.is_settled() {
            return GameStatus::Settled;
        }

        match self.pending.map(|p| p.purpose) {
            Some(DecryptionPurpose::Settlement) => GameStatus::RevealPending,
            Some(DecryptionPurpose::GuessDisclosure) => GameStatus::DisclosingGuesses,
            None if self.has_ended(now) => GameStatus::AwaitingReveal,
            None => GameStatus::Open,
        }
    }

    pub fn participant_count(&self) -> usize {
        self.participant_list.len()
    }

    /// Participants in join order
    pub fn ordered_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participant_list
            .iter()
            .filter_map(|id| self.participants.get(id))
    }

    /// Amount `identity` could still claim
    pub fn claimable(&self, identity: &Identity) -> Amount {
        let Some(settlement) = &self.settlement else {
            return Amount::ZERO;
        };

        if identity == &self.creator {
            return if self.creator_claimed {
                Amount::ZERO
            } else {
                settlement.creator_payout()
            };
        }

        match self.participants.get(identity) {
            Some(p) if p.won && !p.claimed => settlement.payout_per_winner,
            _ => Amount::ZERO,
        }
    }
}
