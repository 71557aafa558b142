use crate::config::CliConfig;
use anyhow::{Context, Result};
use dialoguer::Password;
use hilo_core::storage::{AccountStore, Storage, VaultStore};
use hilo_core::{Identity, LocalOracle, MemoryTreasury};
use hilo_game::{GameHouse, HouseConfig, LedgerStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

const ORACLE_SALT: &[u8] = b"hilo/local-oracle/v1";

/// Everything a command needs, loaded from and saved back to one database
pub struct Session {
    storage: Storage,
    pub treasury: Arc<MemoryTreasury>,
    pub oracle: Arc<LocalOracle>,
    pub house: GameHouse,
    /// Oracle responses that hit a retryable error
    pub undelivered_dir: PathBuf,
}

impl Session {
    pub async fn open(config: &CliConfig) -> Result<Self> {
        let network = config.network()?;
        let storage = Storage::new(&config.db_path())
            .await
            .context("Failed to open database")?;

        let treasury = Arc::new(MemoryTreasury::new());
        treasury.import_state(AccountStore::new(&storage).load_state().await?);

        let passphrase = match &config.oracle_passphrase {
            Some(p) => p.clone(),
            None => Password::new()
                .with_prompt("Oracle passphrase")
                .interact()
                .context("Failed to read passphrase")?,
        };
        let oracle = Arc::new(LocalOracle::from_passphrase(&passphrase, ORACLE_SALT));
        oracle.import_state(VaultStore::new(&storage).load_state().await?);

        let house_config = HouseConfig::new(network);
        house_config.validate()?;
        let ledger = LedgerStore::new(&storage).load_ledger(house_config).await?;
        let house = GameHouse::from_ledger(
            ledger,
            oracle.clone(),
            treasury.clone(),
            Arc::new(SystemClock),
        );

        tracing::debug!("Opened session at {}", config.db_path().display());
        Ok(Self {
            storage,
            treasury,
            oracle,
            house,
            undelivered_dir: config.data_dir.join("undelivered").join(&config.network),
        })
    }

    pub async fn save(&self) -> Result<()> {
        AccountStore::new(&self.storage)
            .save_state(&self.treasury.export_state())
            .await?;
        VaultStore::new(&self.storage)
            .save_state(&self.oracle.export_state())
            .await?;
        LedgerStore::new(&self.storage)
            .save_ledger(&self.house.snapshot()?)
            .await?;
        Ok(())
    }

    pub fn identity(name: &str) -> Identity {
        Identity::new(name)
    }
}
