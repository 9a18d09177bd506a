use tendermint_proto::google::protobuf::Any;
use tracing::debug;

use crate::account::SequenceLease;
use crate::config::ClientConfig;
use crate::error::{CompassError, CompassResult};
use crate::transport::Transport;

use super::envelope::UnsignedEnvelope;
use super::fee::FeeParams;

/// 把消息、手续费与账户信息拼成 [`UnsignedEnvelope`]。
#[derive(Debug, Clone)]
pub struct TransactionAssembler {
    chain_id: String,
    memo: String,
    timeout_height: u64,
}

impl TransactionAssembler {
    pub fn new(chain_id: impl Into<String>, memo: impl Into<String>, timeout_height: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            memo: memo.into(),
            timeout_height,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.chain_id, &config.memo, config.timeout_height)
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// 空消息列表在任何网络请求之前被拒绝。
    pub async fn build(
        &self,
        lease: &mut SequenceLease,
        transport: &dyn Transport,
        messages: Vec<Any>,
        fee: FeeParams,
    ) -> CompassResult<UnsignedEnvelope> {
        if messages.is_empty() {
            return Err(CompassError::EmptyTransaction);
        }

        let account = lease.prepare(transport).await?;
        debug!(
            target: "compass::tx",
            identity = %lease.identity().name,
            messages = messages.len(),
            account_number = %account.number,
            sequence = %account.sequence,
            gas_limit = fee.gas_limit,
            "unsigned envelope built"
        );

        Ok(UnsignedEnvelope::new(
            messages,
            fee,
            self.chain_id.clone(),
            self.memo.clone(),
            self.timeout_height,
            account,
        ))
    }
}
