use anyhow::{anyhow, Result};
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub network: String,
    pub oracle_passphrase: Option<String>,
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hilo"),
            network: "regtest".to_string(),
            oracle_passphrase: None,
            verbose: false,
        }
    }
}

impl CliConfig {
    pub fn network(&self) -> Result<Network> {
        match self.network.as_str() {
            "mainnet" => Ok(Network::Bitcoin),
            other => other
                .parse::<Network>()
                .map_err(|_| anyhow!("Unsupported network: {}", other)),
        }
    }

    /// Each network keeps its own database
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.network))
    }
}
