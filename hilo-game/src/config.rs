use crate::error::{GameError, Result};
use bitcoin::{Amount, Network};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest round a creator may open
pub const MIN_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseConfig {
    pub network: Network,
    pub min_duration: Duration,
    pub min_stake_floor: Amount,
    pub min_reward_floor: Amount,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            network: Network::Regtest,
            min_duration: MIN_DURATION,
            min_stake_floor: Amount::from_sat(1_000),
            min_reward_floor: Amount::from_sat(10_000),
        }
    }
}

impl HouseConfig {
    pub fn new(network: Network) -> Self {
        let mut config = Self::default();
        config.network = network;
        config
    }

    /// Mainnet deployments never allow supersedable or debug reveals
    pub fn is_production(&self) -> bool {
        self.network == Network::Bitcoin
    }

    pub fn debug_reveal_enabled(&self) -> bool {
        self.network == Network::Regtest
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_duration < MIN_DURATION {
            return Err(GameError::config(format!(
                "Minimum round duration must be at least {}s",
                MIN_DURATION.as_secs()
            )));
        }

        if self.min_stake_floor == Amount::ZERO {
            return Err(GameError::config("Stake floor must be greater than 0"));
        }

        if self.min_reward_floor == Amount::ZERO {
            return Err(GameError::config("Reward floor must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_gates() {
        assert!(HouseConfig::default().debug_reveal_enabled());
        assert!(!HouseConfig::default().is_production());

        let signet = HouseConfig::new(Network::Signet);
        assert!(!signet.debug_reveal_enabled());
        assert!(!signet.is_production());

        let mainnet = HouseConfig::new(Network::Bitcoin);
        assert!(mainnet.is_production());
        assert!(!mainnet.debug_reveal_enabled());
    }

    #[test]
    fn test_validate() {
        assert!(HouseConfig::default().validate().is_ok());

        let mut config = HouseConfig::default();
        config.min_duration = Duration::from_secs(10);
        assert!(config.validate().is_err());

        let mut config = HouseConfig::default();
        config.min_stake_floor = Amount::ZERO;
        assert!(config.validate().is_err());
    }
}
