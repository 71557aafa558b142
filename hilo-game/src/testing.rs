//! Shared fixture for ledger and settlement tests

use crate::commitment::{generate_salt, SecretCommitment, SALT_SIZE};
use crate::config::HouseConfig;
use crate::error::Result;
use crate::game::{CreateGame, JoinGame};
use crate::ledger::{GameLedger, TxContext};
use bitcoin::Amount;
use chrono::{DateTime, Duration, Utc};
use hilo_core::{GameId, Identity, LocalOracle, MemoryTreasury, Plaintext};

pub(crate) fn test_config() -> HouseConfig {
    let mut config = HouseConfig::default();
    config.min_stake_floor = Amount::from_sat(10);
    config.min_reward_floor = Amount::from_sat(100);
    config
}

pub(crate) struct Fixture {
    pub oracle: LocalOracle,
    pub treasury: MemoryTreasury,
    pub config: HouseConfig,
    pub start: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: HouseConfig) -> Self {
        let start = DateTime::from_timestamp(1_735_732_800, 0).unwrap();
        Self {
            oracle: LocalOracle::from_seed([42u8; 32]),
            treasury: MemoryTreasury::new(),
            config,
            start,
            now: start,
        }
    }

    pub fn ledger(&self) -> GameLedger {
        GameLedger::new(self.config.clone())
    }

    pub fn ctx(&self, caller: &str) -> TxContext<'_> {
        TxContext {
            caller: Identity::new(caller),
            now: self.now,
            oracle: &self.oracle,
            treasury: &self.treasury,
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start + Duration::hours(1)
    }

    pub fn advance_past_end(&mut self) {
        self.now = self.end_time() + Duration::seconds(1);
    }

    /// Parameters with the secret sealed for `owner`
    pub fn game_params(&self, owner: &Identity, secret: u8, reward: u64) -> CreateGame {
        self.game_params_with_salt(owner, secret, reward, &generate_salt())
    }

    pub fn game_params_with_salt(
        &self,
        owner: &Identity,
        secret: u8,
        reward: u64,
        salt: &[u8; SALT_SIZE],
    ) -> CreateGame {
        let (encrypted_secret, input_proof) =
            self.oracle.encrypt(Plaintext::U8(secret), owner).unwrap();
        CreateGame {
            encrypted_secret,
            input_proof,
            commitment: SecretCommitment::commit(secret, salt),
            min_stake: Amount::from_sat(10),
            end_time: self.end_time(),
            reward_pool: Amount::from_sat(reward),
            auto_settle: false,
        }
    }

    /// Fund `creator`, open a game and hand back its id and salt
    pub fn create_game(
        &self,
        ledger: &mut GameLedger,
        creator: &str,
        secret: u8,
        reward: u64,
        auto_settle: bool,
    ) -> (GameId, [u8; SALT_SIZE]) {
        let ctx = self.ctx(creator);
        self.treasury.fund(&ctx.caller, Amount::from_sat(reward)).unwrap();

        let salt = generate_salt();
        let mut params = self.game_params_with_salt(&ctx.caller, secret, reward, &salt);
        params.auto_settle = auto_settle;

        let id = ledger
            .create_game(&ctx, params, Amount::from_sat(reward))
            .unwrap();
        (id, salt)
    }

    pub fn join(
        &self,
        ledger: &mut GameLedger,
        game_id: GameId,
        who: &str,
        big: bool,
        stake: u64,
    ) -> Result<()> {
        let ctx = self.ctx(who);
        self.treasury.fund(&ctx.caller, Amount::from_sat(stake)).unwrap();

        let (encrypted_choice, input_proof) =
            self.oracle.encrypt(Plaintext::Bool(big), &ctx.caller).unwrap();
        ledger.join_game(
            &ctx,
            game_id,
            JoinGame {
                encrypted_choice,
                input_proof,
            },
            Amount::from_sat(stake),
        )
    }
}
