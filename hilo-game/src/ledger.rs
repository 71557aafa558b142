use crate::config::HouseConfig;
use crate::error::{GameError, Result};
use crate::game::{CreateGame, DecryptionPurpose, Game, JoinGame, Participant, PendingDecryption};
use crate::settlement::SettlementEngine;
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use hilo_core::{GameId, HiloError, Identity, Oracle, Receipt, RequestId, Treasury};
use std::collections::{BTreeMap, HashMap};

/// Who is calling, when, and through which collaborators
pub struct TxContext<'a> {
    pub caller: Identity,
    pub now: DateTime<Utc>,
    pub oracle: &'a dyn Oracle,
    pub treasury: &'a dyn Treasury,
}

/// Owns every game record and the bookkeeping around them.
///
/// All value movement goes through the [`Treasury`] in the caller's
/// [`TxContext`]; the ledger only decides who may move what and when.
#[derive(Debug, Clone)]
pub struct GameLedger {
    config: HouseConfig,
    games: BTreeMap<GameId, Game>,
    next_game_id: GameId,
    pending: HashMap<RequestId, GameId>,
}

impl GameLedger {
    pub fn new(config: HouseConfig) -> Self {
        Self {
            config,
            games: BTreeMap::new(),
            next_game_id: 0,
            pending: HashMap::new(),
        }
    }

    /// Rebuild a ledger from persisted records
    pub fn restore(
        config: HouseConfig,
        games: Vec<Game>,
        pending: Vec<(RequestId, GameId)>,
        next_game_id: GameId,
    ) -> Result<Self> {
        let games: BTreeMap<GameId, Game> = games.into_iter().map(|g| (g.id, g)).collect();

        if let Some(max_id) = games.keys().next_back() {
            if *max_id >= next_game_id {
                return Err(HiloError::internal(format!(
                    "game {} exists but next id is {}",
                    max_id, next_game_id
                ))
                .into());
            }
        }

        for (request_id, game_id) in &pending {
            let tracked = games
                .get(game_id)
                .and_then(|g| g.pending)
                .map(|p| p.request_id);
            if tracked != Some(*request_id) {
                return Err(HiloError::internal(format!(
                    "request {} is not pending on game {}",
                    request_id, game_id
                ))
                .into());
            }
        }

        Ok(Self {
            config,
            games,
            next_game_id,
            pending: pending.into_iter().collect(),
        })
    }

    pub fn config(&self) -> &HouseConfig {
        &self.config
    }

    pub fn settlement(&mut self) -> SettlementEngine<'_> {
        SettlementEngine::new(self)
    }

    /// Open a new round funded with its reward pool
    pub fn create_game(
        &mut self,
        ctx: &TxContext<'_>,
        params: CreateGame,
        funded: Amount,
    ) -> Result<GameId> {
        let min_duration = chrono::Duration::from_std(self.config.min_duration)
            .map_err(|e| GameError::config(format!("Invalid minimum duration: {}", e)))?;
        if params.end_time <= ctx.now + min_duration {
            return Err(GameError::EndTimeTooSoon {
                min_seconds: self.config.min_duration.as_secs(),
            });
        }

        if params.min_stake < self.config.min_stake_floor {
            return Err(GameError::StakeFloorViolation {
                floor: self.config.min_stake_floor.to_sat(),
                got: params.min_stake.to_sat(),
            });
        }

        if params.reward_pool < self.config.min_reward_floor {
            return Err(GameError::RewardFloorViolation {
                floor: self.config.min_reward_floor.to_sat(),
                got: params.reward_pool.to_sat(),
            });
        }

        if funded != params.reward_pool {
            return Err(GameError::FundingMismatch {
                reward_pool: params.reward_pool.to_sat(),
                funded: funded.to_sat(),
            });
        }

        ctx.oracle
            .verify_input(&params.encrypted_secret, &params.input_proof, &ctx.caller)
            .map_err(|e| GameError::InvalidInput(e.to_string()))?;

        ctx.treasury.collect(&ctx.caller, funded)?;

        let id = self.next_game_id;
        self.next_game_id += 1;

        self.games.insert(
            id,
            Game {
                id,
                creator: ctx.caller.clone(),
                min_stake: params.min_stake,
                end_time: params.end_time,
                created_at: ctx.now,
                reward_pool: params.reward_pool,
                total_pot: params.reward_pool,
                secret_commitment: params.commitment,
                encrypted_secret: params.encrypted_secret,
                auto_settle_enabled: params.auto_settle,
                creator_claimed: false,
                pending: None,
                disclosed_guesses: None,
                settlement: None,
                participant_list: Vec::new(),
                participants: HashMap::new(),
            },
        );

        tracing::info!(
            "Game {} created by {} (reward pool {} sats, ends {})",
            id,
            ctx.caller,
            params.reward_pool.to_sat(),
            params.end_time
        );
        Ok(id)
    }

    /// Add the caller's sealed guess and stake to an open round
    pub fn join_game(
        &mut self,
        ctx: &TxContext<'_>,
        game_id: GameId,
        join: JoinGame,
        stake: Amount,
    ) -> Result<()> {
        let game = self.game(game_id)?;

        if game.has_ended(ctx.now) {
            return Err(GameError::MatchClosed(game_id));
        }

        if game.is_reveal_pending() || game.is_settled() {
            return Err(GameError::SettlementInProgress(game_id));
        }

        if ctx.caller == game.creator {
            return Err(GameError::CreatorCannotJoin);
        }

        if game.participants.contains_key(&ctx.caller) {
            return Err(GameError::AlreadyJoined(ctx.caller.clone()));
        }

        if stake < game.min_stake {
            return Err(GameError::InsufficientStake {
                min: game.min_stake.to_sat(),
                got: stake.to_sat(),
            });
        }

        let total_pot = game
            .total_pot
            .checked_add(stake)
            .ok_or_else(|| HiloError::internal("pot overflow"))?;

        ctx.oracle
            .verify_input(&join.encrypted_choice, &join.input_proof, &ctx.caller)
            .map_err(|e| GameError::InvalidInput(e.to_string()))?;

        ctx.treasury.collect(&ctx.caller, stake)?;

        let game = self.game_mut(game_id)?;
        game.participants.insert(
            ctx.caller.clone(),
            Participant {
                identity: ctx.caller.clone(),
                encrypted_choice: join.encrypted_choice,
                stake,
                joined_at: ctx.now,
                won: false,
                claimed: false,
                choice_revealed: false,
                guessed_big: false,
            },
        );
        game.participant_list.push(ctx.caller.clone());
        game.total_pot = total_pot;

        tracing::info!(
            "{} joined game {} with {} sats (pot now {} sats)",
            ctx.caller,
            game_id,
            stake.to_sat(),
            total_pot.to_sat()
        );
        Ok(())
    }

    /// Pay the creator share plus rounding remainder to the creator
    pub fn claim_creator_share(&mut self, ctx: &TxContext<'_>, game_id: GameId) -> Result<Receipt> {
        let game = self.game(game_id)?;
        if !game.is_settled() {
            return Err(GameError::NotSettled(game_id));
        }
        if ctx.caller != game.creator {
            return Err(GameError::Unauthorized);
        }

        self.pay_creator(ctx, game_id)
    }

    /// Pay a winning participant their share
    pub fn claim_winnings(&mut self, ctx: &TxContext<'_>, game_id: GameId) -> Result<Receipt> {
        let game = self.game_mut(game_id)?;
        let payout = game
            .settlement
            .as_ref()
            .map(|s| s.payout_per_winner)
            .ok_or(GameError::NotSettled(game_id))?;

        let participant = game
            .participants
            .get_mut(&ctx.caller)
            .ok_or_else(|| GameError::NotParticipant(ctx.caller.clone()))?;

        if participant.claimed {
            return Err(GameError::AlreadyClaimed);
        }
        if !participant.won {
            return Err(GameError::NotEligible);
        }
        if payout == Amount::ZERO {
            return Err(GameError::NothingToClaim);
        }

        // flag first, the transfer may call back into us
        participant.claimed = true;

        match ctx.treasury.transfer(&ctx.caller, payout) {
            Ok(receipt) => {
                tracing::info!(
                    "{} claimed {} sats from game {}",
                    ctx.caller,
                    payout.to_sat(),
                    game_id
                );
                Ok(receipt)
            }
            Err(e) => {
                participant.claimed = false;
                tracing::warn!("Winnings transfer for game {} failed: {}", game_id, e);
                Err(GameError::TransferFailed(e.to_string()))
            }
        }
    }

    /// Creator payout without the caller check, shared with auto-settlement
    pub(crate) fn pay_creator(&mut self, ctx: &TxContext<'_>, game_id: GameId) -> Result<Receipt> {
        let game = self.game_mut(game_id)?;
        let amount = game
            .settlement
            .as_ref()
            .map(|s| s.creator_payout())
            .ok_or(GameError::NotSettled(game_id))?;

        if game.creator_claimed {
            return Err(GameError::AlreadyClaimed);
        }
        if amount == Amount::ZERO {
            return Err(GameError::NothingToClaim);
        }

        game.creator_claimed = true;

        match ctx.treasury.transfer(&game.creator, amount) {
            Ok(receipt) => {
                tracing::info!(
                    "Creator {} received {} sats from game {}",
                    game.creator,
                    amount.to_sat(),
                    game_id
                );
                Ok(receipt)
            }
            Err(e) => {
                game.creator_claimed = false;
                tracing::warn!("Creator transfer for game {} failed: {}", game_id, e);
                Err(GameError::TransferFailed(e.to_string()))
            }
        }
    }

    pub fn game(&self, game_id: GameId) -> Result<&Game> {
        self.games
            .get(&game_id)
            .ok_or(GameError::GameNotFound(game_id))
    }

    pub(crate) fn game_mut(&mut self, game_id: GameId) -> Result<&mut Game> {
        self.games
            .get_mut(&game_id)
            .ok_or(GameError::GameNotFound(game_id))
    }

    pub fn get_participant(&self, game_id: GameId, identity: &Identity) -> Result<&Participant> {
        self.game(game_id)?
            .participants
            .get(identity)
            .ok_or_else(|| GameError::NotParticipant(identity.clone()))
    }

    /// Amount `identity` could still claim from a settled game
    pub fn claimable(&self, game_id: GameId, identity: &Identity) -> Result<Amount> {
        Ok(self.game(game_id)?.claimable(identity))
    }

    pub fn list_participants(&self, game_id: GameId) -> Result<Vec<&Participant>> {
        Ok(self.game(game_id)?.ordered_participants().collect())
    }

    pub fn total_games(&self) -> u64 {
        self.next_game_id
    }

    pub fn games(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    pub fn pending_requests(&self) -> Vec<(RequestId, GameId)> {
        let mut pending: Vec<_> = self.pending.iter().map(|(r, g)| (*r, *g)).collect();
        pending.sort();
        pending
    }

    pub(crate) fn pending_game(&self, request_id: RequestId) -> Option<GameId> {
        self.pending.get(&request_id).copied()
    }

    pub(crate) fn register_pending(
        &mut self,
        game_id: GameId,
        request_id: RequestId,
        purpose: DecryptionPurpose,
    ) -> Result<()> {
        let game = self.game_mut(game_id)?;
        game.pending = Some(PendingDecryption {
            request_id,
            purpose,
        });
        self.pending.insert(request_id, game_id);
        Ok(())
    }

    pub(crate) fn clear_pending(&mut self, game_id: GameId) -> Result<Option<PendingDecryption>> {
        let taken = self.game_mut(game_id)?.pending.take();
        if let Some(p) = taken {
            self.pending.remove(&p.request_id);
        }
        Ok(taken)
    }

    /// Put back a record captured before a failed multi-step operation
    pub(crate) fn rollback(&mut self, game: Game) {
        if let Some(p) = game.pending {
            self.pending.insert(p.request_id, game.id);
        }
        self.games.insert(game.id, game);
    }
}
