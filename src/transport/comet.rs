use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ibc_proto::cosmos::auth::v1beta1::{
    BaseAccount, EthAccount, QueryAccountRequest, QueryAccountResponse,
};
use prost::Message;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::account::Account;

use super::serde_helpers::{string_or_null, u64_from_string_or_number};
use super::{SubmitResponse, Transport, TransportError, TxResult, TxStatus};

const ACCOUNT_QUERY_PATH: &str = "/cosmos.auth.v1beta1.Query/Account";
const BASE_ACCOUNT_TYPE_URL: &str = "/cosmos.auth.v1beta1.BaseAccount";

/// 基于 CometBFT JSON-RPC（HTTP POST）的传输实现。
pub struct CometRpcTransport {
    client: reqwest::Client,
    endpoint: Url,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorBody {
    fn detail(&self) -> String {
        match &self.data {
            Some(Value::String(data)) if !data.is_empty() => format!("{}: {data}", self.message),
            Some(Value::Null) | None => self.message.clone(),
            Some(other) => format!("{}: {other}", self.message),
        }
    }

    fn is_not_found(&self) -> bool {
        self.detail().contains("not found")
    }
}

#[derive(Deserialize)]
struct BroadcastResult {
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    code: u64,
    #[serde(default, deserialize_with = "string_or_null")]
    codespace: String,
    #[serde(default, deserialize_with = "string_or_null")]
    log: String,
    hash: String,
}

#[derive(Deserialize)]
struct TxQueryResult {
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    height: u64,
    tx_result: ExecTxResult,
}

#[derive(Deserialize)]
struct ExecTxResult {
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    code: u64,
    #[serde(default, deserialize_with = "string_or_null")]
    log: String,
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    gas_wanted: u64,
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    gas_used: u64,
}

#[derive(Deserialize)]
struct UnconfirmedTxsResult {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct AbciQueryResult {
    response: AbciQueryResponse,
}

#[derive(Deserialize)]
struct AbciQueryResponse {
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    code: u64,
    #[serde(default, deserialize_with = "string_or_null")]
    log: String,
    #[serde(default, deserialize_with = "string_or_null")]
    value: String,
}

impl CometRpcTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| TransportError::unavailable(format!("invalid rpc address: {err}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Result<T, RpcErrorBody>, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let envelope: RpcEnvelope<T> = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (envelope.result, envelope.error) {
            (_, Some(error)) => Ok(Err(error)),
            (Some(result), None) => Ok(Ok(result)),
            (None, None) => Err(TransportError::decode(format!(
                "{method}: response carries neither result nor error"
            ))),
        }
    }

    async fn call_ok<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, TransportError> {
        self.call(method, params).await?.map_err(|error| TransportError::Rpc {
            code: error.code,
            message: error.detail(),
        })
    }
}

#[async_trait]
impl Transport for CometRpcTransport {
    async fn submit(&self, tx_bytes: Vec<u8>) -> Result<SubmitResponse, TransportError> {
        let result: BroadcastResult = self
            .call_ok("broadcast_tx_sync", json!({ "tx": BASE64.encode(&tx_bytes) }))
            .await?;
        let code = u32::try_from(result.code)
            .map_err(|_| TransportError::decode(format!("check tx code {} out of range", result.code)))?;

        info!(
            target: "compass::transport",
            endpoint = %self.endpoint,
            hash = %result.hash,
            code,
            "broadcast_tx_sync returned"
        );

        Ok(SubmitResponse {
            hash: result.hash.to_ascii_uppercase(),
            code,
            codespace: result.codespace,
            log: result.log,
        })
    }

    async fn query_tx_status(&self, hash: &str) -> Result<TxStatus, TransportError> {
        let raw_hash = hex::decode(hash)
            .map_err(|err| TransportError::decode(format!("invalid tx hash {hash}: {err}")))?;
        let response = self
            .call::<TxQueryResult>(
                "tx",
                json!({ "hash": BASE64.encode(raw_hash), "prove": false }),
            )
            .await?;

        match response {
            Ok(found) => {
                let code = u32::try_from(found.tx_result.code).map_err(|_| {
                    TransportError::decode(format!("tx code {} out of range", found.tx_result.code))
                })?;
                Ok(TxStatus::Committed(TxResult {
                    height: found.height,
                    code,
                    log: found.tx_result.log,
                    gas_wanted: found.tx_result.gas_wanted,
                    gas_used: found.tx_result.gas_used,
                }))
            }
            Err(error) if error.is_not_found() => {
                debug!(target: "compass::transport", hash, "tx not yet indexed");
                Ok(TxStatus::NotFound)
            }
            Err(error) => Err(TransportError::Rpc {
                code: error.code,
                message: error.detail(),
            }),
        }
    }

    async fn query_account(&self, address: &str) -> Result<Account, TransportError> {
        let request = QueryAccountRequest {
            address: address.to_string(),
        };
        let result: AbciQueryResult = self
            .call_ok(
                "abci_query",
                json!({
                    "path": ACCOUNT_QUERY_PATH,
                    "data": hex::encode(request.encode_to_vec()),
                    "prove": false,
                }),
            )
            .await?;

        if result.response.code != 0 {
            debug!(
                target: "compass::transport",
                address,
                code = result.response.code,
                log = %result.response.log,
                "account query returned non-zero code"
            );
            return Err(TransportError::AccountNotFound(address.to_string()));
        }

        let value = BASE64
            .decode(result.response.value.as_bytes())
            .map_err(TransportError::decode)?;
        decode_account_response(address, &value)
    }

    async fn unconfirmed_txs(&self, limit: Option<usize>) -> Result<Vec<Vec<u8>>, TransportError> {
        let params = match limit {
            Some(limit) => json!({ "limit": limit.to_string() }),
            None => json!({}),
        };
        let result: UnconfirmedTxsResult = self.call_ok("unconfirmed_txs", params).await?;
        result
            .txs
            .unwrap_or_default()
            .iter()
            .map(|encoded| BASE64.decode(encoded.as_bytes()).map_err(TransportError::decode))
            .collect()
    }
}

fn decode_account_response(address: &str, value: &[u8]) -> Result<Account, TransportError> {
    let response = QueryAccountResponse::decode(value).map_err(TransportError::decode)?;
    let account = response
        .account
        .ok_or_else(|| TransportError::AccountNotFound(address.to_string()))?;

    if account.type_url == BASE_ACCOUNT_TYPE_URL {
        let base = BaseAccount::decode(account.value.as_slice()).map_err(TransportError::decode)?;
        Ok(Account::from(base))
    } else if account.type_url.ends_with(".EthAccount") {
        // Ethermint 系链：账户编号与 sequence 在内嵌的 base_account 中。
        let base = EthAccount::decode(account.value.as_slice())
            .map_err(TransportError::decode)?
            .base_account
            .ok_or_else(|| TransportError::AccountNotFound(address.to_string()))?;
        Ok(Account::from(base))
    } else {
        Err(TransportError::UnknownAccountType(account.type_url))
    }
}
