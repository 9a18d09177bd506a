use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::tx::GasPrice;

use super::loader::ConfigError;

/// compass 客户端配置，对应 `compass.yaml`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// 默认签名身份名称，找不到时回退到密钥库中的第一个身份。
    #[serde(default = "super::default_key")]
    pub key: String,
    #[serde(default = "super::default_chain_id")]
    pub chain_id: String,
    #[serde(default = "super::default_rpc_addr")]
    pub rpc_addr: String,
    #[serde(default = "super::default_account_prefix")]
    pub account_prefix: String,
    #[serde(default = "super::default_gas_adjustment")]
    pub gas_adjustment: Decimal,
    #[serde(default = "super::default_gas_prices")]
    pub gas_prices: String,
    #[serde(default)]
    pub min_gas_amount: u64,
    #[serde(default = "super::default_gas_limit")]
    pub default_gas_limit: u64,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub timeout_height: u64,
    #[serde(default = "super::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "super::default_pubkey_type_url")]
    pub pubkey_type_url: String,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationConfig {
    #[serde(default = "super::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "super::default_deadline_ms")]
    pub deadline_ms: u64,
}

impl ConfirmationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

impl ClientConfig {
    fn preset(chain_id: &str, rpc_addr: &str, account_prefix: &str, gas_prices: &str) -> Self {
        Self {
            key: super::default_key(),
            chain_id: chain_id.to_string(),
            rpc_addr: rpc_addr.to_string(),
            account_prefix: account_prefix.to_string(),
            gas_adjustment: super::default_gas_adjustment(),
            gas_prices: gas_prices.to_string(),
            min_gas_amount: 0,
            default_gas_limit: super::default_gas_limit(),
            memo: String::new(),
            timeout_height: 0,
            request_timeout_ms: super::default_request_timeout_ms(),
            pubkey_type_url: super::default_pubkey_type_url(),
            confirmation: ConfirmationConfig::default(),
            logging: LoggingConfig::default(),
            prometheus: PrometheusConfig::default(),
        }
    }

    pub fn cosmoshub() -> Self {
        Self::preset(
            "cosmoshub-4",
            "https://cosmoshub-4.technofractal.com:443",
            "cosmos",
            "0.01uatom",
        )
    }

    pub fn osmosis() -> Self {
        Self::preset(
            "osmosis-1",
            "https://osmosis-1.technofractal.com:443",
            "osmo",
            "0.01uosmo",
        )
    }

    /// 本地 simd 节点。
    pub fn simd() -> Self {
        Self::preset("cosmoshub-4", "http://127.0.0.1:26657", "cosmos", "0.01uatom")
    }

    pub fn from_preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cosmoshub" | "cosmoshub-4" => Some(Self::cosmoshub()),
            "osmosis" | "osmosis-1" => Some(Self::osmosis()),
            "simd" | "local" => Some(Self::simd()),
            _ => None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn gas_price(&self) -> Result<GasPrice, ConfigError> {
        GasPrice::parse(&self.gas_prices)
            .map_err(|reason| ConfigError::invalid("gas_prices", reason))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::invalid("chain_id", "must not be empty"));
        }
        Url::parse(&self.rpc_addr)
            .map_err(|err| ConfigError::invalid("rpc_addr", err.to_string()))?;
        self.gas_price()?;
        if self.gas_adjustment <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "gas_adjustment",
                format!("expected a positive number, got {}", self.gas_adjustment),
            ));
        }
        if self.default_gas_limit == 0 {
            return Err(ConfigError::invalid("default_gas_limit", "must be non-zero"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("request_timeout_ms", "must be non-zero"));
        }
        if self.confirmation.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "confirmation.poll_interval_ms",
                "must be non-zero",
            ));
        }
        if self.confirmation.deadline_ms < self.confirmation.poll_interval_ms {
            return Err(ConfigError::invalid(
                "confirmation.deadline_ms",
                "must not be shorter than the poll interval",
            ));
        }
        if !self.pubkey_type_url.starts_with('/') {
            return Err(ConfigError::invalid(
                "pubkey_type_url",
                "type url must start with '/'",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for cfg in [
            ClientConfig::cosmoshub(),
            ClientConfig::osmosis(),
            ClientConfig::simd(),
        ] {
            cfg.validate().expect("preset should be valid");
        }
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let yaml = "chain_id: testing\nrpc_addr: http://localhost:26657\n";
        let cfg: ClientConfig = serde_yaml::from_str(yaml).expect("parse yaml");
        assert_eq!(cfg.chain_id, "testing");
        assert_eq!(cfg.key, "default");
        assert_eq!(cfg.confirmation.poll_interval_ms, 1_000);
        assert_eq!(cfg.confirmation.deadline_ms, 10_000);
        assert_eq!(cfg.default_gas_limit, 200_000);
        assert!(!cfg.logging.json);
    }

    #[test]
    fn rejects_bad_gas_prices() {
        let mut cfg = ClientConfig::simd();
        cfg.gas_prices = "uatom".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("gas_prices"));
    }

    #[test]
    fn gas_adjustment_parses_as_exact_decimal() {
        let yaml = "chain_id: testing\ngas_adjustment: 1.1\n";
        let cfg: ClientConfig = serde_yaml::from_str(yaml).expect("parse yaml");
        assert_eq!(cfg.gas_adjustment, Decimal::new(11, 1));

        let mut cfg = ClientConfig::simd();
        cfg.gas_adjustment = Decimal::ZERO;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "gas_adjustment", .. }));
    }

    #[test]
    fn rejects_deadline_shorter_than_poll_interval() {
        let mut cfg = ClientConfig::simd();
        cfg.confirmation.poll_interval_ms = 2_000;
        cfg.confirmation.deadline_ms = 1_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn preset_lookup_is_case_insensitive() {
        let cfg = ClientConfig::from_preset("Osmosis").expect("known preset");
        assert_eq!(cfg.chain_id, "osmosis-1");
        assert!(ClientConfig::from_preset("unknown").is_none());
    }
}
