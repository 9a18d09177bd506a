//! 单元测试共用的替身：可编排的传输层、签名器与示例消息。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ibc_proto::cosmos::tx::v1beta1::{AuthInfo, SignerInfo, TxBody, TxRaw};
use tendermint_proto::google::protobuf::Any;
use parking_lot::Mutex;
use prost::Message;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::account::Account;
use crate::keyring::SigningIdentity;
use crate::registry::{MessageSchema, ProtoSchema};
use crate::transport::{SubmitResponse, Transport, TransportError, TxResult, TxStatus};
use crate::tx::{KeySigner, SignerError, tx_hash};

pub const MSG_PING_TYPE_URL: &str = "/compass.test.v1.MsgPing";

#[derive(Clone, PartialEq, Message, Serialize)]
pub struct MsgPing {
    #[prost(string, tag = "1")]
    pub from: String,
    #[prost(uint64, tag = "2")]
    pub count: u64,
    #[prost(fixed64, tag = "3")]
    pub weight: u64,
    #[prost(bytes = "vec", tag = "4")]
    pub payload: Vec<u8>,
}

pub fn ping(count: u64) -> Any {
    Any {
        type_url: MSG_PING_TYPE_URL.to_string(),
        value: MsgPing {
            from: "cosmos1tester".to_string(),
            count,
            weight: 1,
            payload: vec![0xab],
        }
        .encode_to_vec(),
    }
}

pub fn ping_schema() -> Arc<dyn MessageSchema> {
    ProtoSchema::<MsgPing>::shared(MSG_PING_TYPE_URL)
}

pub fn identity(name: &str) -> SigningIdentity {
    SigningIdentity::new(name, vec![2; 33], format!("cosmos1{name}"))
}

/// 构造一笔已"签名"的原始交易，供解码测试使用。
pub fn raw_tx(messages: Vec<Any>, memo: &str, sequence: u64) -> Vec<u8> {
    let body = TxBody {
        messages,
        memo: memo.to_string(),
        ..Default::default()
    };
    let auth_info = AuthInfo {
        signer_infos: vec![SignerInfo {
            public_key: None,
            mode_info: None,
            sequence,
        }],
        fee: None,
        ..Default::default()
    };
    TxRaw {
        body_bytes: body.encode_to_vec(),
        auth_info_bytes: auth_info.encode_to_vec(),
        signatures: vec![vec![1; 64]],
    }
    .encode_to_vec()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accept,
    CheckTxFailure(u32),
    TransportFailure,
}

/// 脚本化的传输层：提交结果按队列依次返回，队列为空时一律接受。
pub struct MockTransport {
    account: Mutex<Account>,
    fail_accounts: AtomicBool,
    submit_script: Mutex<VecDeque<SubmitOutcome>>,
    confirm_after: Mutex<Option<usize>>,
    committed_code: Mutex<u32>,
    status_counts: Mutex<HashMap<String, usize>>,
    submitted: Mutex<Vec<Vec<u8>>>,
    mempool: Mutex<Vec<Vec<u8>>>,
    account_queries: AtomicUsize,
    submit_calls: AtomicUsize,
    status_queries: AtomicUsize,
    mempool_queries: AtomicUsize,
}

impl MockTransport {
    pub fn new(account: Account) -> Self {
        Self {
            account: Mutex::new(account),
            fail_accounts: AtomicBool::new(false),
            submit_script: Mutex::new(VecDeque::new()),
            confirm_after: Mutex::new(Some(1)),
            committed_code: Mutex::new(0),
            status_counts: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            mempool: Mutex::new(Vec::new()),
            account_queries: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            status_queries: AtomicUsize::new(0),
            mempool_queries: AtomicUsize::new(0),
        }
    }

    pub fn set_account(&self, account: Account) {
        *self.account.lock() = account;
    }

    pub fn fail_account_queries(&self, fail: bool) {
        self.fail_accounts.store(fail, Ordering::SeqCst);
    }

    pub fn script_submits(&self, outcomes: impl IntoIterator<Item = SubmitOutcome>) {
        self.submit_script.lock().extend(outcomes);
    }

    /// 第 `n` 次状态查询时返回已上链；`None` 表示永远查不到。
    pub fn confirm_after(&self, n: Option<usize>) {
        *self.confirm_after.lock() = n;
    }

    pub fn set_committed_code(&self, code: u32) {
        *self.committed_code.lock() = code;
    }

    pub fn set_mempool(&self, txs: Vec<Vec<u8>>) {
        *self.mempool.lock() = txs;
    }

    pub fn account_queries(&self) -> usize {
        self.account_queries.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.account_queries()
            + self.submit_calls()
            + self.status_queries()
            + self.mempool_queries.load(Ordering::SeqCst)
    }

    /// 按提交顺序返回每笔交易签名者的 sequence。
    pub fn submitted_sequences(&self) -> Vec<u64> {
        self.submitted
            .lock()
            .iter()
            .map(|bytes| {
                let raw = TxRaw::decode(bytes.as_slice()).expect("tx raw");
                let auth = AuthInfo::decode(raw.auth_info_bytes.as_slice()).expect("auth info");
                auth.signer_infos[0].sequence
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn submit(&self, tx_bytes: Vec<u8>) -> Result<SubmitResponse, TransportError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .submit_script
            .lock()
            .pop_front()
            .unwrap_or(SubmitOutcome::Accept);
        let hash = tx_hash(&tx_bytes);
        match outcome {
            SubmitOutcome::Accept => {
                self.submitted.lock().push(tx_bytes);
                Ok(SubmitResponse::accepted(hash))
            }
            SubmitOutcome::CheckTxFailure(code) => Ok(SubmitResponse {
                hash,
                code,
                codespace: "sdk".to_string(),
                log: format!("check tx failed with code {code}"),
            }),
            SubmitOutcome::TransportFailure => {
                Err(TransportError::unavailable("connection reset by peer"))
            }
        }
    }

    async fn query_tx_status(&self, hash: &str) -> Result<TxStatus, TransportError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let seen = {
            let mut counts = self.status_counts.lock();
            let seen = counts.entry(hash.to_string()).or_default();
            *seen += 1;
            *seen
        };
        match *self.confirm_after.lock() {
            Some(after) if seen >= after => Ok(TxStatus::Committed(TxResult {
                height: 100 + seen as u64,
                code: *self.committed_code.lock(),
                log: String::new(),
                gas_wanted: 200_000,
                gas_used: 80_000,
            })),
            _ => Ok(TxStatus::NotFound),
        }
    }

    async fn query_account(&self, address: &str) -> Result<Account, TransportError> {
        self.account_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_accounts.load(Ordering::SeqCst) {
            return Err(TransportError::unavailable(format!(
                "node unreachable while querying {address}"
            )));
        }
        Ok(*self.account.lock())
    }

    async fn unconfirmed_txs(&self, limit: Option<usize>) -> Result<Vec<Vec<u8>>, TransportError> {
        self.mempool_queries.fetch_add(1, Ordering::SeqCst);
        let mempool = self.mempool.lock();
        let take = limit.unwrap_or(mempool.len());
        Ok(mempool.iter().take(take).cloned().collect())
    }
}

/// 用 SHA-256 充当签名的确定性签名器，并记录每次签名的原文。
#[derive(Clone, Default)]
pub struct StaticKeySigner {
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl StaticKeySigner {
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().clone()
    }
}

#[async_trait]
impl KeySigner for StaticKeySigner {
    async fn sign_bytes(
        &self,
        _identity: &SigningIdentity,
        payload: &[u8],
    ) -> Result<Vec<u8>, SignerError> {
        self.payloads.lock().push(payload.to_vec());
        Ok(Sha256::digest(payload).to_vec())
    }
}

pub struct FailingKeySigner;

#[async_trait]
impl KeySigner for FailingKeySigner {
    async fn sign_bytes(
        &self,
        identity: &SigningIdentity,
        _payload: &[u8],
    ) -> Result<Vec<u8>, SignerError> {
        Err(SignerError::MissingKey(identity.name.clone()))
    }
}
