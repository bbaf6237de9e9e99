//! Presale configuration.
//!
//! Every address the purchase instruction touches is configuration handed to
//! [`crate::Presale`] at construction. The defaults point at the deployed
//! presale; tests and devnet deployments substitute their own.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::amount::AmountPolicy;
use crate::error::PresaleError;
use crate::types::{Address, Commitment};

/// Presale program: `DY5LZb7nuNzaJeKrrxo3UbUE2qN8nMrXJprYJqHvCmTD`
pub const PRESALE_PROGRAM_ID: Address = Address::new_from_array([
    0xba, 0x42, 0x27, 0x01, 0x9d, 0x73, 0xf0, 0xca, 0x46, 0x73, 0xd1, 0x38, 0x72, 0x46, 0xc1,
    0xc3, 0x3c, 0x2e, 0xf3, 0x32, 0x91, 0xd7, 0xd9, 0x25, 0xa6, 0x65, 0xf3, 0x0d, 0xe2, 0x6c,
    0x51, 0xa8,
]);

/// Treasury receiving the SOL: `9457hfGKDSKk2oM1qe4qpuchjXFa5CHENzWDvLC3otUs`
pub const SOL_RECEIVER: Address = Address::new_from_array([
    0x77, 0xa6, 0xe4, 0x2b, 0x78, 0x4f, 0x46, 0xcc, 0x85, 0x49, 0x68, 0x9d, 0xf7, 0xdf, 0x7d,
    0xea, 0x72, 0x4d, 0xfc, 0x53, 0x76, 0xee, 0x8b, 0xb7, 0x47, 0x9d, 0xf0, 0xe6, 0xdb, 0xdd,
    0x1c, 0xec,
]);

/// Token being sold: `2EqGuqPAipp9kPCrRbgxf5njgZ9NgCpzpiCZQJ6wYjN6`
pub const TOKEN_MINT: Address = Address::new_from_array([
    0x12, 0x66, 0xd2, 0x47, 0x38, 0xd1, 0xf5, 0xf3, 0x59, 0x66, 0xa9, 0xb8, 0xc9, 0xb6, 0xe8,
    0x5f, 0xf2, 0x52, 0xea, 0x71, 0xd3, 0x1e, 0x32, 0xd8, 0x7b, 0x5a, 0x5c, 0x17, 0xdd, 0x14,
    0x0a, 0xc7,
]);

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

pub const ENV_RPC_URL: &str = "PRESALE_RPC_URL";
pub const ENV_COMMITMENT: &str = "PRESALE_COMMITMENT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresaleConfig {
    pub program_id: Address,
    pub sol_receiver: Address,
    pub mint: Address,
    pub token_program_id: Address,
    pub associated_token_program_id: Address,
    pub system_program_id: Address,
    pub amount: AmountPolicy,
    pub network: NetworkConfig,
}

impl Default for PresaleConfig {
    fn default() -> Self {
        Self {
            program_id: PRESALE_PROGRAM_ID,
            sol_receiver: SOL_RECEIVER,
            mint: TOKEN_MINT,
            token_program_id: Address::new_from_array(chain_sol::TOKEN_PROGRAM_ID),
            associated_token_program_id: Address::new_from_array(
                chain_sol::ASSOCIATED_TOKEN_PROGRAM_ID,
            ),
            system_program_id: Address::new_from_array(chain_sol::SYSTEM_PROGRAM_ID),
            amount: AmountPolicy::default(),
            network: NetworkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Level `purchase` waits for after submission.
    pub commitment: Commitment,
    /// Level used for the blockhash fetch and the preflight simulation.
    pub preflight_commitment: Commitment,
    pub rpc_timeout_ms: u64,
    pub confirm_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            commitment: Commitment::Processed,
            preflight_commitment: Commitment::Processed,
            rpc_timeout_ms: 10_000,
            confirm_timeout_ms: 30_000,
            poll_interval_ms: 500,
        }
    }
}

impl NetworkConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl PresaleConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PresaleError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PresaleError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PresaleError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PresaleError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Optional JSON file, then `PRESALE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, PresaleError> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), PresaleError> {
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.network.rpc_url = url;
        }
        if let Some(level) = lookup(ENV_COMMITMENT) {
            self.network.commitment = level.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PresaleError> {
        self.amount.check()?;

        let net = &self.network;
        if !(net.rpc_url.starts_with("http://") || net.rpc_url.starts_with("https://")) {
            return Err(PresaleError::Config(format!(
                "rpc_url must be an http(s) URL, got {:?}",
                net.rpc_url
            )));
        }
        if net.rpc_timeout_ms == 0 || net.confirm_timeout_ms == 0 || net.poll_interval_ms == 0 {
            return Err(PresaleError::Config("timeouts and poll interval must be non-zero".into()));
        }
        if net.poll_interval_ms > net.confirm_timeout_ms {
            return Err(PresaleError::Config(format!(
                "poll interval {} ms exceeds confirmation timeout {} ms",
                net.poll_interval_ms, net.confirm_timeout_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Lamports;

    #[test]
    fn default_addresses_match_deployment() {
        let config = PresaleConfig::default();
        assert_eq!(config.program_id.to_string(), "DY5LZb7nuNzaJeKrrxo3UbUE2qN8nMrXJprYJqHvCmTD");
        assert_eq!(config.sol_receiver.to_string(), "9457hfGKDSKk2oM1qe4qpuchjXFa5CHENzWDvLC3otUs");
        assert_eq!(config.mint.to_string(), "2EqGuqPAipp9kPCrRbgxf5njgZ9NgCpzpiCZQJ6wYjN6");
        assert_eq!(
            config.associated_token_program_id.to_string(),
            "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PresaleConfig::from_json_str(
            r#"{
                "mint": "So11111111111111111111111111111111111111112",
                "network": { "rpc_url": "http://127.0.0.1:8899", "commitment": "confirmed" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.mint.to_string(), "So11111111111111111111111111111111111111112");
        assert_eq!(config.program_id, PRESALE_PROGRAM_ID);
        assert_eq!(config.network.commitment, Commitment::Confirmed);
        assert_eq!(config.network.confirm_timeout_ms, 30_000);
    }

    #[test]
    fn amount_policy_from_json() {
        let config = PresaleConfig::from_json_str(
            r#"{ "amount": { "min_lamports": 5000, "max_lamports": 1000000000 } }"#,
        )
        .unwrap();
        assert_eq!(config.amount.min_lamports, Lamports::new(5000));
    }

    #[test]
    fn bad_address_in_json_is_rejected() {
        let err = PresaleConfig::from_json_str(r#"{ "mint": "not-base58!" }"#).unwrap_err();
        assert!(matches!(err, PresaleError::Config(_)));
    }

    #[test]
    fn inconsistent_network_settings_rejected() {
        let mut config = PresaleConfig::default();
        config.network.poll_interval_ms = 60_000;
        assert!(config.validate().is_err());

        let mut config = PresaleConfig::default();
        config.network.rpc_url = "ws://localhost".into();
        assert!(config.validate().is_err());

        let mut config = PresaleConfig::default();
        config.network.rpc_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_apply() {
        let mut config = PresaleConfig::default();
        config
            .apply_overrides(|key| match key {
                ENV_RPC_URL => Some("http://localhost:8899".into()),
                ENV_COMMITMENT => Some("finalized".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.network.rpc_url, "http://localhost:8899");
        assert_eq!(config.network.commitment, Commitment::Finalized);
    }

    #[test]
    fn bad_commitment_override_rejected() {
        let mut config = PresaleConfig::default();
        let result = config.apply_overrides(|key| (key == ENV_COMMITMENT).then(|| "max".into()));
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = PresaleConfig::from_json_file(Path::new("/nonexistent/presale.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/presale.json"));
    }
}
