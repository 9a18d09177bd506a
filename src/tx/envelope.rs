use tendermint_proto::google::protobuf::Any;

use crate::account::Account;

use super::fee::FeeParams;

/// 待签名的交易，构建后不可修改。
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedEnvelope {
    messages: Vec<Any>,
    fee: FeeParams,
    chain_id: String,
    memo: String,
    timeout_height: u64,
    account: Account,
}

impl UnsignedEnvelope {
    pub(crate) fn new(
        messages: Vec<Any>,
        fee: FeeParams,
        chain_id: String,
        memo: String,
        timeout_height: u64,
        account: Account,
    ) -> Self {
        Self {
            messages,
            fee,
            chain_id,
            memo,
            timeout_height,
            account,
        }
    }

    pub fn messages(&self) -> &[Any] {
        &self.messages
    }

    pub fn fee(&self) -> &FeeParams {
        &self.fee
    }

    pub fn gas_limit(&self) -> u64 {
        self.fee.gas_limit
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn timeout_height(&self) -> u64 {
        self.timeout_height
    }

    pub fn account(&self) -> Account {
        self.account
    }
}

/// 已签名的交易：body、auth info 的 protobuf 字节加签名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
    pub signatures: Vec<Vec<u8>>,
}
