//! Reveal paths and the one settlement computation they share.
//!
//! A game moves `Open → RevealPending → Settled` and never leaves `Settled`.
//! Three paths can get it there: the oracle callback, the creator's fair
//! reveal against the stored commitment, and a debug reveal that only exists
//! on regtest. Each of them only sources `(revealed_number, guesses)` and
//! hands off to [`split_pot`].

use crate::error::{GameError, Result};
use crate::game::{DecryptionPurpose, Game, RevealPath, Settlement};
use crate::ledger::{GameLedger, TxContext};
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use hilo_core::oracle::codec::{decode_guesses, decode_secret_and_guesses};
use hilo_core::{CiphertextHandle, DecryptionResponse, GameId, HiloError, Receipt, RequestId};

pub const MIN_NUMBER: u8 = 1;
pub const MAX_NUMBER: u8 = 10;

/// Result of splitting a pot between the creator and the winners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotSplit {
    pub is_big: bool,
    /// Per-guess outcome, index-aligned with the guesses
    pub won: Vec<bool>,
    pub winners_count: u32,
    pub creator_share: Amount,
    pub payout_per_winner: Amount,
    pub creator_bonus_remainder: Amount,
}

/// Half the pot goes to the creator, the other half is shared by the
/// winners. Division leftovers go to the creator; with no winners the
/// creator takes everything.
pub fn split_pot(revealed_number: u8, guesses: &[bool], total_pot: Amount) -> Result<PotSplit> {
    if !(MIN_NUMBER..=MAX_NUMBER).contains(&revealed_number) {
        return Err(GameError::InvalidSecret(revealed_number));
    }

    let is_big = revealed_number > 5;
    let won: Vec<bool> = guesses.iter().map(|guess| *guess == is_big).collect();
    let winners = won.iter().filter(|w| **w).count() as u64;

    let pot = total_pot.to_sat();
    let (creator_share, payout_per_winner, remainder) = if winners == 0 {
        (pot, 0, 0)
    } else {
        let creator_share = pot / 2;
        let winners_portion = pot - creator_share;
        let payout = winners_portion / winners;
        (creator_share, payout, winners_portion - payout * winners)
    };

    Ok(PotSplit {
        is_big,
        won,
        winners_count: winners as u32,
        creator_share: Amount::from_sat(creator_share),
        payout_per_winner: Amount::from_sat(payout_per_winner),
        creator_bonus_remainder: Amount::from_sat(remainder),
    })
}

#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    Settled {
        game_id: GameId,
        settlement: Settlement,
        creator_payout: Option<Receipt>,
    },
    GuessesDisclosed {
        game_id: GameId,
        count: usize,
    },
}

pub struct SettlementEngine<'l> {
    ledger: &'l mut GameLedger,
}

impl<'l> SettlementEngine<'l> {
    pub fn new(ledger: &'l mut GameLedger) -> Self {
        Self { ledger }
    }

    /// Ask the oracle for the secret and every guess, secret first
    pub fn request_reveal(&mut self, ctx: &TxContext<'_>, game_id: GameId) -> Result<RequestId> {
        let game = self.ledger.game(game_id)?;
        ensure_decryptable(game, ctx.now)?;

        let handles: Vec<CiphertextHandle> = std::iter::once(game.encrypted_secret)
            .chain(game.ordered_participants().map(|p| p.encrypted_choice))
            .collect();

        let request_id = ctx.oracle.request_decryption(&handles)?;
        self.ledger
            .register_pending(game_id, request_id, DecryptionPurpose::Settlement)?;

        tracing::info!(
            "Reveal requested for game {} by {} ({})",
            game_id,
            ctx.caller,
            request_id
        );
        Ok(request_id)
    }

    /// Ask the oracle for the guesses only, ahead of a fair reveal
    pub fn request_guess_disclosure(
        &mut self,
        ctx: &TxContext<'_>,
        game_id: GameId,
    ) -> Result<RequestId> {
        let game = self.ledger.game(game_id)?;
        if ctx.caller != game.creator {
            return Err(GameError::UnauthorizedReveal);
        }
        ensure_decryptable(game, ctx.now)?;

        if game.disclosed_guesses.is_some() {
            return Err(GameError::AlreadyDisclosed(game_id));
        }
        if game.participant_list.is_empty() {
            return Err(GameError::NoParticipants);
        }

        let handles: Vec<CiphertextHandle> = game
            .ordered_participants()
            .map(|p| p.encrypted_choice)
            .collect();

        let request_id = ctx.oracle.request_decryption(&handles)?;
        self.ledger
            .register_pending(game_id, request_id, DecryptionPurpose::GuessDisclosure)?;

        tracing::info!("Guess disclosure requested for game {} ({})", game_id, request_id);
        Ok(request_id)
    }

    /// Resume a game once the oracle answers
    pub fn on_decryption_callback(
        &mut self,
        ctx: &TxContext<'_>,
        response: &DecryptionResponse,
    ) -> Result<CallbackOutcome> {
        let request_id = response.request_id;
        let game_id = self
            .ledger
            .pending_game(request_id)
            .ok_or(GameError::UnknownRequest(request_id))?;

        if let Err(e) = ctx
            .oracle
            .verify_decryption(request_id, &response.cleartexts, &response.proof)
        {
            tracing::warn!("Rejected callback for {} on game {}: {}", request_id, game_id, e);
            return Err(GameError::InvalidDecryptionProof(request_id));
        }

        let game = self.ledger.game(game_id)?;
        let pending = game
            .pending
            .filter(|p| p.request_id == request_id)
            .ok_or(GameError::UnknownRequest(request_id))?;
        let participants = game.participant_count();

        match pending.purpose {
            DecryptionPurpose::Settlement => {
                let (secret, guesses) =
                    decode_secret_and_guesses(&response.cleartexts, participants)
                        .map_err(malformed)?;
                let auto_settle = game.auto_settle_enabled;
                let before = game.clone();

                let settlement =
                    self.settle(game_id, secret, &guesses, RevealPath::Oracle, ctx.now)?;

                let creator_payout = if auto_settle {
                    match self.ledger.pay_creator(ctx, game_id) {
                        Ok(receipt) => Some(receipt),
                        Err(GameError::NothingToClaim) => None,
                        Err(e) => {
                            // all or nothing: the game goes back to pending
                            self.ledger.rollback(before);
                            return Err(e);
                        }
                    }
                } else {
                    None
                };

                Ok(CallbackOutcome::Settled {
                    game_id,
                    settlement,
                    creator_payout,
                })
            }
            DecryptionPurpose::GuessDisclosure => {
                let guesses =
                    decode_guesses(&response.cleartexts, participants).map_err(malformed)?;

                let game = self.ledger.game_mut(game_id)?;
                for (identity, guess) in game.participant_list.iter().zip(&guesses) {
                    if let Some(p) = game.participants.get_mut(identity) {
                        p.choice_revealed = true;
                        p.guessed_big = *guess;
                    }
                }
                let count = guesses.len();
                game.disclosed_guesses = Some(guesses);
                self.ledger.clear_pending(game_id)?;

                tracing::info!("Disclosed {} guesses for game {}", count, game_id);
                Ok(CallbackOutcome::GuessesDisclosed { game_id, count })
            }
        }
    }

    /// Settle against the creator's commitment.
    ///
    /// Guesses come from an earlier oracle disclosure, so the creator never
    /// gets to supply them.
    pub fn fair_reveal(
        &mut self,
        ctx: &TxContext<'_>,
        game_id: GameId,
        secret: u8,
        salt: &[u8; 32],
    ) -> Result<Settlement> {
        let production = self.ledger.config().is_production();
        let game = self.ledger.game(game_id)?;

        if game.is_settled() {
            return Err(GameError::AlreadySettled(game_id));
        }
        if ctx.caller != game.creator {
            return Err(GameError::UnauthorizedReveal);
        }
        if !game.has_ended(ctx.now) {
            return Err(GameError::RoundStillActive {
                ends_at: game.end_time,
            });
        }
        if game.is_reveal_pending() && production {
            return Err(GameError::RevealAlreadyPending(game_id));
        }

        if !game.secret_commitment.verify(secret, salt) {
            tracing::warn!("Fair reveal for game {} does not match commitment", game_id);
            return Err(GameError::HashMismatch);
        }

        let guesses = if game.participant_list.is_empty() {
            Vec::new()
        } else {
            game.disclosed_guesses
                .clone()
                .ok_or(GameError::GuessesNotDisclosed)?
        };

        if let Some(p) = game.pending {
            tracing::info!("Fair reveal supersedes {} on game {}", p.request_id, game_id);
        }

        self.settle(game_id, secret, &guesses, RevealPath::FairReveal, ctx.now)
    }

    /// Regtest-only shortcut straight to settlement
    pub fn debug_reveal(
        &mut self,
        ctx: &TxContext<'_>,
        game_id: GameId,
        revealed_number: u8,
        guesses: &[bool],
    ) -> Result<Settlement> {
        let config = self.ledger.config();
        if !config.debug_reveal_enabled() {
            return Err(GameError::DebugRevealDisabled(config.network));
        }

        let game = self.ledger.game(game_id)?;
        if game.is_settled() {
            return Err(GameError::AlreadySettled(game_id));
        }
        if !game.has_ended(ctx.now) {
            return Err(GameError::RoundStillActive {
                ends_at: game.end_time,
            });
        }

        tracing::warn!("Debug reveal on game {} by {}", game_id, ctx.caller);
        self.settle(game_id, revealed_number, guesses, RevealPath::Debug, ctx.now)
    }

    fn settle(
        &mut self,
        game_id: GameId,
        revealed_number: u8,
        guesses: &[bool],
        via: RevealPath,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let game = self.ledger.game(game_id)?;
        if game.is_settled() {
            return Err(GameError::AlreadySettled(game_id));
        }

        let expected = game.participant_count();
        let guesses = if expected == 0 {
            &[][..]
        } else if guesses.len() != expected {
            return Err(GameError::MismatchGuessCount {
                expected,
                got: guesses.len(),
            });
        } else {
            guesses
        };

        let split = split_pot(revealed_number, guesses, game.total_pot)?;
        let settlement = Settlement {
            revealed_number,
            number_is_big: split.is_big,
            winners_count: split.winners_count,
            creator_share: split.creator_share,
            payout_per_winner: split.payout_per_winner,
            creator_bonus_remainder: split.creator_bonus_remainder,
            settled_at: now,
            settled_via: via,
        };

        let game = self.ledger.game_mut(game_id)?;
        for (i, identity) in game.participant_list.iter().enumerate() {
            if let Some(p) = game.participants.get_mut(identity) {
                p.choice_revealed = true;
                p.guessed_big = guesses[i];
                p.won = split.won[i];
            }
        }
        game.settlement = Some(settlement.clone());
        self.ledger.clear_pending(game_id)?;

        tracing::info!(
            "Game {} settled via {:?}: number {} ({}), {} winner(s), {} sats each, creator {} sats",
            game_id,
            via,
            revealed_number,
            if split.is_big { "big" } else { "small" },
            split.winners_count,
            split.payout_per_winner.to_sat(),
            settlement.creator_payout().to_sat()
        );
        Ok(settlement)
    }
}

fn ensure_decryptable(game: &Game, now: DateTime<Utc>) -> Result<()> {
    if game.is_settled() {
        return Err(GameError::AlreadySettled(game.id));
    }
    if game.is_reveal_pending() {
        return Err(GameError::RevealAlreadyPending(game.id));
    }
    if !game.has_ended(now) {
        return Err(GameError::RoundStillActive {
            ends_at: game.end_time,
        });
    }
    Ok(())
}

fn malformed(e: HiloError) -> GameError {
    match e {
        HiloError::MalformedCleartexts(msg) => GameError::MalformedCleartexts(msg),
        other => other.into(),
    }
}
