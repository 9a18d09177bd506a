//! 与远端节点交互的传输层契约。核心只依赖 [`Transport`]，具体实现（如
//! CometBFT JSON-RPC）可以替换。

mod comet;
mod serde_helpers;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::account::Account;

pub use comet::CometRpcTransport;

/// cosmos-sdk 中 "incorrect account sequence" 的错误码。
pub const INCORRECT_ACCOUNT_SEQUENCE_CODE: u32 = 32;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("RPC 返回错误 {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("响应解析失败: {0}")]
    Decode(String),
    #[error("账户 {0} 不存在")]
    AccountNotFound(String),
    #[error("不支持的账户类型: {0}")]
    UnknownAccountType(String),
    #[error("{0}")]
    Unavailable(String),
}

impl TransportError {
    pub fn decode(reason: impl fmt::Display) -> Self {
        Self::Decode(reason.to_string())
    }

    pub fn unavailable(reason: impl fmt::Display) -> Self {
        Self::Unavailable(reason.to_string())
    }
}

/// `broadcast_tx_sync` 的结果：`code == 0` 表示已进入节点 mempool。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub hash: String,
    pub code: u32,
    pub codespace: String,
    pub log: String,
}

impl SubmitResponse {
    pub fn accepted(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            code: 0,
            codespace: String::new(),
            log: String::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }

    pub fn is_sequence_mismatch(&self) -> bool {
        self.code == INCORRECT_ACCOUNT_SEQUENCE_CODE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    NotFound,
    Committed(TxResult),
}

/// 已上链交易的执行结果，`code != 0` 表示链上执行失败但 sequence 已被消耗。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub height: u64,
    pub code: u32,
    pub log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, tx_bytes: Vec<u8>) -> Result<SubmitResponse, TransportError>;

    async fn query_tx_status(&self, hash: &str) -> Result<TxStatus, TransportError>;

    async fn query_account(&self, address: &str) -> Result<Account, TransportError>;

    async fn unconfirmed_txs(&self, limit: Option<usize>) -> Result<Vec<Vec<u8>>, TransportError>;
}
