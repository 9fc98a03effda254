//! Engine configuration from environment variables.
//!
//! Controls the Bitcoin network type, the fee-estimation endpoint and the
//! background polling cadences. Defaults to Signet.

use std::env;
use std::time::Duration;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
const DEFAULT_FEE_REFRESH_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Bitcoin network type (address validation).
    pub bitcoin_network: bitcoin::Network,
    /// Recommended-fees endpoint returning `{fastestFee, halfHourFee, hourFee}`.
    pub fee_endpoint: String,
    /// Period of the repeating sync trigger, independent of sync duration.
    pub sync_interval: Duration,
    /// Period of the fee tier refresh.
    pub fee_refresh_interval: Duration,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// - `BITCOIN_NETWORK`: "signet" (default), "testnet", "regtest" or "mainnet"
    /// - `FEE_ENDPOINT`: recommended-fees URL (has a per-network default)
    /// - `SYNC_INTERVAL_SECS`: sync cadence, default 60
    /// - `FEE_REFRESH_SECS`: fee tier refresh cadence, default 60
    pub fn from_env() -> Self {
        let network_str = env::var("BITCOIN_NETWORK")
            .unwrap_or_else(|_| "signet".to_string())
            .to_lowercase();

        let bitcoin_network = match network_str.as_str() {
            "mainnet" | "bitcoin" => bitcoin::Network::Bitcoin,
            "testnet" => bitcoin::Network::Testnet,
            "regtest" => bitcoin::Network::Regtest,
            "signet" | "" => bitcoin::Network::Signet,
            other => {
                log::warn!("unknown network '{}', defaulting to signet", other);
                bitcoin::Network::Signet
            }
        };

        let fee_endpoint = env::var("FEE_ENDPOINT")
            .unwrap_or_else(|_| default_fee_endpoint(bitcoin_network).to_string());

        let sync_interval =
            Duration::from_secs(env_secs("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS));
        let fee_refresh_interval =
            Duration::from_secs(env_secs("FEE_REFRESH_SECS", DEFAULT_FEE_REFRESH_SECS));

        log::info!(
            "engine config: network {:?}, fee endpoint {}, sync every {:?}",
            bitcoin_network,
            fee_endpoint,
            sync_interval
        );

        Self {
            bitcoin_network,
            fee_endpoint,
            sync_interval,
            fee_refresh_interval,
        }
    }
}

fn default_fee_endpoint(network: bitcoin::Network) -> &'static str {
    match network {
        bitcoin::Network::Bitcoin => "https://mempool.space/api/v1/fees/recommended",
        bitcoin::Network::Testnet => "https://mempool.space/testnet/api/v1/fees/recommended",
        _ => "https://mempool.space/signet/api/v1/fees/recommended",
    }
}

fn env_secs(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            log::warn!("invalid {}='{}', using {}s", var, value, default);
            default
        }),
        Err(_) => default,
    }
}

impl Default for EngineConfig {
    /// Default configuration (Signet).
    fn default() -> Self {
        Self {
            bitcoin_network: bitcoin::Network::Signet,
            fee_endpoint: default_fee_endpoint(bitcoin::Network::Signet).to_string(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            fee_refresh_interval: Duration::from_secs(DEFAULT_FEE_REFRESH_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_signet() {
        let config = EngineConfig::default();
        assert!(matches!(config.bitcoin_network, bitcoin::Network::Signet));
        assert_eq!(config.sync_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_fee_endpoint_per_network() {
        assert!(default_fee_endpoint(bitcoin::Network::Bitcoin).contains("mempool.space/api"));
        assert!(default_fee_endpoint(bitcoin::Network::Signet).contains("signet"));
    }
}
