//! Transaction boundary around the ledger.
//!
//! [`GameHouse`] owns the ledger together with its collaborators and runs
//! every entry point inside a non-reentrant gate. Calls from other threads
//! queue up behind it; a nested call from the same thread, such as a
//! treasury recipient calling back during a payout, is rejected with
//! [`GameError::Reentrancy`].

use crate::config::HouseConfig;
use crate::error::{GameError, Result};
use crate::game::{CreateGame, Game, GameStatus, JoinGame, Participant, Settlement};
use crate::ledger::{GameLedger, TxContext};
use crate::settlement::CallbackOutcome;
use bitcoin::Amount;
use chrono::{DateTime, Duration, Utc};
use hilo_core::{DecryptionResponse, GameId, Identity, Oracle, Receipt, RequestId, Treasury};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::cell::Cell;
use std::sync::Arc;

/// Identity recorded for oracle-driven callbacks
pub const ORACLE_CALLER: &str = "oracle";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.write() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Clears the gate flag even if the guarded call unwinds
struct Entered<'a>(&'a Cell<bool>);

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct GameHouse {
    config: HouseConfig,
    gate: ReentrantMutex<Cell<bool>>,
    ledger: Mutex<GameLedger>,
    oracle: Arc<dyn Oracle>,
    treasury: Arc<dyn Treasury>,
    clock: Arc<dyn Clock>,
}

impl GameHouse {
    pub fn new(
        config: HouseConfig,
        oracle: Arc<dyn Oracle>,
        treasury: Arc<dyn Treasury>,
    ) -> Result<Self> {
        Self::with_clock(config, oracle, treasury, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: HouseConfig,
        oracle: Arc<dyn Oracle>,
        treasury: Arc<dyn Treasury>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_ledger(
            GameLedger::new(config),
            oracle,
            treasury,
            clock,
        ))
    }

    /// Wrap a ledger restored from storage
    pub fn from_ledger(
        ledger: GameLedger,
        oracle: Arc<dyn Oracle>,
        treasury: Arc<dyn Treasury>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::debug!(
            "Game house ready on {} with {} games",
            ledger.config().network,
            ledger.total_games()
        );
        Self {
            config: ledger.config().clone(),
            gate: ReentrantMutex::new(Cell::new(false)),
            ledger: Mutex::new(ledger),
            oracle,
            treasury,
            clock,
        }
    }

    fn enter<T>(
        &self,
        caller: &Identity,
        f: impl FnOnce(&mut GameLedger, &TxContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let gate = self.gate.lock();
        if gate.get() {
            tracing::warn!("Rejected reentrant call from {}", caller);
            return Err(GameError::Reentrancy);
        }
        gate.set(true);
        let _entered = Entered(&*gate);

        let ctx = TxContext {
            caller: caller.clone(),
            now: self.clock.now(),
            oracle: self.oracle.as_ref(),
            treasury: self.treasury.as_ref(),
        };
        let mut ledger = self.ledger.lock();
        f(&mut ledger, &ctx)
    }

    fn view<T>(&self, f: impl FnOnce(&GameLedger, DateTime<Utc>) -> Result<T>) -> Result<T> {
        let gate = self.gate.lock();
        if gate.get() {
            return Err(GameError::Reentrancy);
        }
        let ledger = self.ledger.lock();
        f(&ledger, self.clock.now())
    }

    pub fn create_game(
        &self,
        caller: &Identity,
        params: CreateGame,
        funded: Amount,
    ) -> Result<GameId> {
        self.enter(caller, |ledger, ctx| ledger.create_game(ctx, params, funded))
    }

    pub fn join_game(
        &self,
        caller: &Identity,
        game_id: GameId,
        join: JoinGame,
        stake: Amount,
    ) -> Result<()> {
        self.enter(caller, |ledger, ctx| {
            ledger.join_game(ctx, game_id, join, stake)
        })
    }

    pub fn request_reveal(&self, caller: &Identity, game_id: GameId) -> Result<RequestId> {
        self.enter(caller, |ledger, ctx| {
            ledger.settlement().request_reveal(ctx, game_id)
        })
    }

    pub fn request_guess_disclosure(&self, caller: &Identity, game_id: GameId) -> Result<RequestId> {
        self.enter(caller, |ledger, ctx| {
            ledger.settlement().request_guess_disclosure(ctx, game_id)
        })
    }

    pub fn on_decryption_callback(&self, response: &DecryptionResponse) -> Result<CallbackOutcome> {
        self.enter(&Identity::new(ORACLE_CALLER), |ledger, ctx| {
            ledger.settlement().on_decryption_callback(ctx, response)
        })
    }

    pub fn fair_reveal(
        &self,
        caller: &Identity,
        game_id: GameId,
        secret: u8,
        salt: &[u8; 32],
    ) -> Result<Settlement> {
        self.enter(caller, |ledger, ctx| {
            ledger.settlement().fair_reveal(ctx, game_id, secret, salt)
        })
    }

    pub fn debug_reveal(
        &self,
        caller: &Identity,
        game_id: GameId,
        revealed_number: u8,
        guesses: &[bool],
    ) -> Result<Settlement> {
        self.enter(caller, |ledger, ctx| {
            ledger
                .settlement()
                .debug_reveal(ctx, game_id, revealed_number, guesses)
        })
    }

    pub fn claim_creator_share(&self, caller: &Identity, game_id: GameId) -> Result<Receipt> {
        self.enter(caller, |ledger, ctx| ledger.claim_creator_share(ctx, game_id))
    }

    pub fn claim_winnings(&self, caller: &Identity, game_id: GameId) -> Result<Receipt> {
        self.enter(caller, |ledger, ctx| ledger.claim_winnings(ctx, game_id))
    }

    pub fn game(&self, game_id: GameId) -> Result<Game> {
        self.view(|ledger, _| ledger.game(game_id).cloned())
    }

    pub fn status(&self, game_id: GameId) -> Result<GameStatus> {
        self.view(|ledger, now| Ok(ledger.game(game_id)?.status(now)))
    }

    pub fn get_participant(&self, game_id: GameId, identity: &Identity) -> Result<Participant> {
        self.view(|ledger, _| ledger.get_participant(game_id, identity).cloned())
    }

    pub fn list_participants(&self, game_id: GameId) -> Result<Vec<Participant>> {
        self.view(|ledger, _| {
            Ok(ledger
                .list_participants(game_id)?
                .into_iter()
                .cloned()
                .collect())
        })
    }

    pub fn claimable(&self, game_id: GameId, identity: &Identity) -> Result<Amount> {
        self.view(|ledger, _| ledger.claimable(game_id, identity))
    }

    pub fn games(&self) -> Result<Vec<Game>> {
        self.view(|ledger, _| Ok(ledger.games().cloned().collect()))
    }

    pub fn total_games(&self) -> Result<u64> {
        self.view(|ledger, _| Ok(ledger.total_games()))
    }

    /// Copy of the ledger for persistence
    pub fn snapshot(&self) -> Result<GameLedger> {
        self.view(|ledger, _| Ok(ledger.clone()))
    }

    pub fn config(&self) -> &HouseConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{generate_salt, SecretCommitment};
    use crate::testing::test_config;
    use hilo_core::{LocalOracle, MemoryTreasury, Plaintext};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{OnceLock, Weak};

    struct Setup {
        house: Arc<GameHouse>,
        oracle: Arc<LocalOracle>,
        clock: Arc<ManualClock>,
    }

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_732_800, 0).unwrap()
    }

    fn setup(treasury: Arc<dyn Treasury>) -> Setup {
        let oracle = Arc::new(LocalOracle::from_seed([7u8; 32]));
        let clock = Arc::new(ManualClock::new(start()));
        let house = GameHouse::with_clock(test_config(), oracle.clone(), treasury, clock.clone())
            .unwrap();
        Setup {
            house: Arc::new(house),
            oracle,
            clock,
        }
    }

    fn open_game(s: &Setup, creator: &Identity, secret: u8, reward: u64) -> (GameId, [u8; 32]) {
        let salt = generate_salt();
        let (encrypted_secret, input_proof) =
            s.oracle.encrypt(Plaintext::U8(secret), creator).unwrap();
        let params = CreateGame {
            encrypted_secret,
            input_proof,
            commitment: SecretCommitment::commit(secret, &salt),
            min_stake: Amount::from_sat(10),
            end_time: start() + Duration::hours(1),
            reward_pool: Amount::from_sat(reward),
            auto_settle: false,
        };
        let id = s
            .house
            .create_game(creator, params, Amount::from_sat(reward))
            .unwrap();
        (id, salt)
    }

    fn join(s: &Setup, id: GameId, who: &Identity, big: bool, stake: u64) -> Result<()> {
        let (encrypted_choice, input_proof) = s.oracle.encrypt(Plaintext::Bool(big), who).unwrap();
        s.house.join_game(
            who,
            id,
            JoinGame {
                encrypted_choice,
                input_proof,
            },
            Amount::from_sat(stake),
        )
    }

    fn settle_through_oracle(s: &Setup, id: GameId) {
        s.clock.advance(Duration::hours(2));
        s.house.request_reveal(&Identity::new("anyone"), id).unwrap();
        for response in s.oracle.process_pending() {
            s.house.on_decryption_callback(&response).unwrap();
        }
    }

    #[test]
    fn test_full_round() {
        let treasury = Arc::new(MemoryTreasury::new());
        let s = setup(treasury.clone());
        let creator = Identity::new("creator");
        let alice = Identity::new("alice");
        let bob = Identity::new("bob");
        treasury.fund(&creator, Amount::from_sat(100)).unwrap();
        treasury.fund(&alice, Amount::from_sat(10)).unwrap();
        treasury.fund(&bob, Amount::from_sat(10)).unwrap();

        let (id, _) = open_game(&s, &creator, 8, 100);
        join(&s, id, &alice, true, 10).unwrap();
        join(&s, id, &bob, false, 10).unwrap();
        assert_eq!(s.house.status(id).unwrap(), GameStatus::Open);

        s.clock.advance(Duration::hours(2));
        assert_eq!(s.house.status(id).unwrap(), GameStatus::AwaitingReveal);
        s.house.request_reveal(&bob, id).unwrap();
        assert_eq!(s.house.status(id).unwrap(), GameStatus::RevealPending);

        let responses = s.oracle.process_pending();
        let outcome = s.house.on_decryption_callback(&responses[0]).unwrap();
        assert!(matches!(outcome, CallbackOutcome::Settled { game_id, .. } if game_id == id));
        assert_eq!(s.house.status(id).unwrap(), GameStatus::Settled);

        let won = s.house.claim_winnings(&alice, id).unwrap();
        let share = s.house.claim_creator_share(&creator, id).unwrap();
        assert_eq!(won.amount, Amount::from_sat(60));
        assert_eq!(share.amount, Amount::from_sat(60));
        assert!(matches!(
            s.house.claim_winnings(&bob, id),
            Err(GameError::NotEligible)
        ));

        assert_eq!(treasury.balance_of(&alice), Amount::from_sat(60));
        assert_eq!(treasury.balance_of(&bob), Amount::ZERO);
        assert_eq!(treasury.escrow(), Amount::ZERO);
    }

    #[test]
    fn test_concurrent_joins_are_serialized() {
        let treasury = Arc::new(MemoryTreasury::new());
        let s = setup(treasury.clone());
        let creator = Identity::new("creator");
        treasury.fund(&creator, Amount::from_sat(100)).unwrap();
        let (id, _) = open_game(&s, &creator, 3, 100);

        let players: Vec<Identity> = (0..8).map(|i| Identity::new(format!("p{}", i))).collect();
        for p in &players {
            treasury.fund(p, Amount::from_sat(15)).unwrap();
        }

        std::thread::scope(|scope| {
            for p in &players {
                let s = &s;
                scope.spawn(move || join(s, id, p, true, 15).unwrap());
            }
        });

        let game = s.house.game(id).unwrap();
        assert_eq!(game.participant_count(), 8);
        assert_eq!(game.total_pot, Amount::from_sat(100 + 8 * 15));
        assert_eq!(treasury.escrow(), game.total_pot);
    }

    /// Pays out like a normal treasury, but first tries to claim again
    struct ReentrantTreasury {
        inner: MemoryTreasury,
        house: OnceLock<Weak<GameHouse>>,
        game_id: AtomicU64,
        nested: Mutex<Vec<GameError>>,
    }

    impl Treasury for ReentrantTreasury {
        fn collect(&self, from: &Identity, amount: Amount) -> hilo_core::Result<Receipt> {
            self.inner.collect(from, amount)
        }

        fn transfer(&self, to: &Identity, amount: Amount) -> hilo_core::Result<Receipt> {
            if let Some(house) = self.house.get().and_then(Weak::upgrade) {
                let game_id = self.game_id.load(Ordering::SeqCst);
                if let Err(e) = house.claim_winnings(to, game_id) {
                    self.nested.lock().push(e);
                }
                if let Err(e) = house.game(game_id) {
                    self.nested.lock().push(e);
                }
            }
            self.inner.transfer(to, amount)
        }
    }

    #[test]
    fn test_reentrant_claim_rejected() {
        let treasury = Arc::new(ReentrantTreasury {
            inner: MemoryTreasury::new(),
            house: OnceLock::new(),
            game_id: AtomicU64::new(0),
            nested: Mutex::new(Vec::new()),
        });
        let s = setup(treasury.clone());
        treasury.house.set(Arc::downgrade(&s.house)).unwrap();

        let creator = Identity::new("creator");
        let alice = Identity::new("alice");
        treasury.inner.fund(&creator, Amount::from_sat(100)).unwrap();
        treasury.inner.fund(&alice, Amount::from_sat(10)).unwrap();

        let (id, _) = open_game(&s, &creator, 9, 100);
        treasury.game_id.store(id, Ordering::SeqCst);
        join(&s, id, &alice, true, 10).unwrap();
        settle_through_oracle(&s, id);

        let receipt = s.house.claim_winnings(&alice, id).unwrap();
        assert_eq!(receipt.amount, Amount::from_sat(55));

        let nested = treasury.nested.lock();
        assert_eq!(nested.len(), 2);
        assert!(nested.iter().all(|e| matches!(e, GameError::Reentrancy)));
        assert_eq!(treasury.inner.balance_of(&alice), Amount::from_sat(55));

        // the gate is open again afterwards
        assert!(matches!(
            s.house.claim_winnings(&alice, id),
            Err(GameError::AlreadyClaimed)
        ));
    }

    /// Refuses payouts while `failing` is set
    struct FlakyTreasury {
        inner: MemoryTreasury,
        failing: AtomicBool,
    }

    impl Treasury for FlakyTreasury {
        fn collect(&self, from: &Identity, amount: Amount) -> hilo_core::Result<Receipt> {
            self.inner.collect(from, amount)
        }

        fn transfer(&self, to: &Identity, amount: Amount) -> hilo_core::Result<Receipt> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(hilo_core::HiloError::transfer("recipient rejected payment"));
            }
            self.inner.transfer(to, amount)
        }
    }

    #[test]
    fn test_failed_transfer_leaves_claim_open() {
        let treasury = Arc::new(FlakyTreasury {
            inner: MemoryTreasury::new(),
            failing: AtomicBool::new(true),
        });
        let s = setup(treasury.clone());
        let creator = Identity::new("creator");
        let alice = Identity::new("alice");
        treasury.inner.fund(&creator, Amount::from_sat(100)).unwrap();
        treasury.inner.fund(&alice, Amount::from_sat(20)).unwrap();

        let (id, _) = open_game(&s, &creator, 2, 100);
        join(&s, id, &alice, false, 20).unwrap();
        settle_through_oracle(&s, id);

        let err = s.house.claim_winnings(&alice, id).unwrap_err();
        assert!(matches!(err, GameError::TransferFailed(_)));
        assert!(err.is_retryable());
        assert!(!s.house.get_participant(id, &alice).unwrap().claimed);

        assert!(matches!(
            s.house.claim_creator_share(&creator, id),
            Err(GameError::TransferFailed(_))
        ));
        assert!(!s.house.game(id).unwrap().creator_claimed);

        treasury.failing.store(false, Ordering::SeqCst);
        assert_eq!(
            s.house.claim_winnings(&alice, id).unwrap().amount,
            Amount::from_sat(60)
        );
        assert_eq!(
            s.house.claim_creator_share(&creator, id).unwrap().amount,
            Amount::from_sat(60)
        );
        assert_eq!(treasury.inner.escrow(), Amount::ZERO);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = test_config();
        config.min_stake_floor = Amount::ZERO;
        let result = GameHouse::new(
            config,
            Arc::new(LocalOracle::from_seed([1u8; 32])),
            Arc::new(MemoryTreasury::new()),
        );
        assert!(matches!(result, Err(GameError::Config(_))));
    }
}
