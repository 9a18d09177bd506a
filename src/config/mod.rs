pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use rust_decimal::Decimal;

use self::types as cfg;

pub(crate) fn default_key() -> String {
    "default".to_string()
}

pub(crate) fn default_chain_id() -> String {
    "cosmoshub-4".to_string()
}

pub(crate) fn default_rpc_addr() -> String {
    "http://127.0.0.1:26657".to_string()
}

pub(crate) fn default_account_prefix() -> String {
    "cosmos".to_string()
}

pub(crate) fn default_gas_adjustment() -> Decimal {
    Decimal::new(12, 1)
}

pub(crate) fn default_gas_prices() -> String {
    "0.01uatom".to_string()
}

pub(crate) fn default_gas_limit() -> u64 {
    200_000
}

pub(crate) fn default_request_timeout_ms() -> u64 {
    30_000
}

pub(crate) fn default_pubkey_type_url() -> String {
    "/cosmos.crypto.secp256k1.PubKey".to_string()
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    1_000
}

pub(crate) fn default_deadline_ms() -> u64 {
    10_000
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

impl Default for cfg::ClientConfig {
    fn default() -> Self {
        cfg::ClientConfig::simd()
    }
}

impl Default for cfg::ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
        }
    }
}

impl Default for cfg::PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: default_prometheus_listen(),
        }
    }
}
