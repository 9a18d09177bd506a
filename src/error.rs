use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::keyring::KeyringError;
use crate::transport::TransportError;
use crate::tx::SignerError;

#[derive(Debug, Error)]
pub enum CompassError {
    #[error("账户查询失败 {address}: {source}")]
    AccountLookupFailed {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("交易不包含任何消息")]
    EmptyTransaction,
    #[error("交易签名失败: {0}")]
    SigningFailed(#[from] SignerError),
    #[error("交易提交被拒绝: {reason}")]
    SubmissionRejected { code: Option<u32>, reason: String },
    /// 超时只说明客户端没有观察到确认，交易仍可能在之后上链。
    #[error("交易 {hash} 在截止时间内未确认（结果未知）")]
    ConfirmationTimedOut { hash: String },
    #[error("交易 {hash} 的确认轮询已取消")]
    Canceled { hash: String },
    #[error("第 {index} 笔交易解码失败: {reason}")]
    DecodeFailed { index: usize, reason: String },
    #[error("内部不变量被破坏: {0}")]
    InternalInvariantViolation(String),
    #[error("未知签名身份: {0}")]
    UnknownIdentity(String),
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    #[error("密钥库错误: {0}")]
    Keyring(#[from] KeyringError),
    #[error("节点请求失败: {0}")]
    Transport(#[from] TransportError),
}

impl CompassError {
    pub fn invariant(reason: impl fmt::Display) -> Self {
        Self::InternalInvariantViolation(reason.to_string())
    }

    pub fn rejected(code: Option<u32>, reason: impl fmt::Display) -> Self {
        Self::SubmissionRejected {
            code,
            reason: reason.to_string(),
        }
    }

    /// 超时与取消都不代表交易失败，调用方应自行决定是否重新查询。
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::ConfirmationTimedOut { .. } | Self::Canceled { .. })
    }
}

pub type CompassResult<T> = Result<T, CompassError>;
