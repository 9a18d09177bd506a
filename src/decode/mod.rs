//! 批量解码原始交易（通常来自 mempool）。单笔失败不影响其它交易，除非要求严格模式。

use std::sync::Arc;

use ibc_proto::cosmos::tx::v1beta1::{AuthInfo, TxBody, TxRaw};
use prost::Message;
use serde::Serialize;
use tracing::warn;

use crate::error::{CompassError, CompassResult};
use crate::monitoring::events;
use crate::registry::{DecodedMessage, TypeRegistry};
use crate::tx::tx_hash;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedTransaction {
    /// 在输入批次中的位置。
    pub index: usize,
    pub hash: String,
    pub messages: Vec<DecodedMessage>,
    pub memo: String,
    pub timeout_height: u64,
    pub fee: Option<DecodedFee>,
    pub signer_sequences: Vec<u64>,
    pub signature_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedFee {
    pub amount: Vec<DecodedCoin>,
    pub gas_limit: u64,
    pub payer: String,
    pub granter: String,
}

/// 链上金额可能超过 u128，按字符串原样保留。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedCoin {
    pub denom: String,
    pub amount: String,
}

pub struct BatchDecoder {
    registry: Arc<TypeRegistry>,
}

impl BatchDecoder {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    /// 非严格模式跳过无法解码的交易并保持其余交易的输入顺序；
    /// 严格模式遇到第一个失败即返回 [`CompassError::DecodeFailed`]。
    pub fn decode_all<T: AsRef<[u8]>>(
        &self,
        raw_txs: &[T],
        strict: bool,
    ) -> CompassResult<Vec<DecodedTransaction>> {
        let mut decoded = Vec::with_capacity(raw_txs.len());
        let mut skipped = 0usize;

        for (index, raw) in raw_txs.iter().enumerate() {
            match self.decode_one(index, raw.as_ref(), strict) {
                Ok(tx) => decoded.push(tx),
                Err(reason) if strict => {
                    events::decode_batch_finished(raw_txs.len(), decoded.len(), skipped, true);
                    return Err(CompassError::DecodeFailed { index, reason });
                }
                Err(reason) => {
                    skipped += 1;
                    events::decode_item_skipped(index, &reason);
                }
            }
        }

        events::decode_batch_finished(raw_txs.len(), decoded.len(), skipped, false);
        Ok(decoded)
    }

    fn decode_one(&self, index: usize, raw: &[u8], strict: bool) -> Result<DecodedTransaction, String> {
        let tx = TxRaw::decode(raw).map_err(|err| format!("tx raw: {err}"))?;
        let body = TxBody::decode(tx.body_bytes.as_slice()).map_err(|err| format!("tx body: {err}"))?;
        let auth_info = AuthInfo::decode(tx.auth_info_bytes.as_slice())
            .map_err(|err| format!("auth info: {err}"))?;

        let mut messages = Vec::with_capacity(body.messages.len());
        for (position, any) in body.messages.iter().enumerate() {
            let decodable = self.registry.resolve(&any.type_url);
            let message = match decodable.decode(&any.value) {
                Ok(message) => message,
                Err(err) if decodable.is_known() && !strict => {
                    warn!(
                        target: "compass::decode",
                        index,
                        position,
                        type_url = %any.type_url,
                        error = %err,
                        "registered schema failed, keeping generic representation"
                    );
                    decodable
                        .fallback()
                        .decode(&any.value)
                        .map_err(|err| format!("message {position} ({}): {err}", any.type_url))?
                }
                Err(err) => return Err(format!("message {position} ({}): {err}", any.type_url)),
            };
            messages.push(message);
        }

        let fee = auth_info.fee.map(|fee| DecodedFee {
            amount: fee
                .amount
                .into_iter()
                .map(|coin| DecodedCoin {
                    denom: coin.denom,
                    amount: coin.amount,
                })
                .collect(),
            gas_limit: fee.gas_limit,
            payer: fee.payer,
            granter: fee.granter,
        });

        Ok(DecodedTransaction {
            index,
            hash: tx_hash(raw),
            messages,
            memo: body.memo,
            timeout_height: body.timeout_height,
            fee,
            signer_sequences: auth_info
                .signer_infos
                .iter()
                .map(|info| info.sequence)
                .collect(),
            signature_count: tx.signatures.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use tendermint_proto::google::protobuf::Any;

    use super::*;
    use crate::registry::default_seed;
    use crate::test_support::{MSG_PING_TYPE_URL, ping, ping_schema, raw_tx};

    fn decoder() -> BatchDecoder {
        let registry = TypeRegistry::with_seed(default_seed()).unwrap();
        BatchDecoder::new(Arc::new(registry))
    }

    fn batch_with_malformed_third() -> Vec<Vec<u8>> {
        (0..5)
            .map(|i| {
                if i == 3 {
                    vec![0xff, 0xff, 0xff]
                } else {
                    raw_tx(vec![ping(i)], &format!("tx-{i}"), i)
                }
            })
            .collect()
    }

    #[test]
    fn skips_malformed_items_and_keeps_order() {
        let decoded = decoder()
            .decode_all(&batch_with_malformed_third(), false)
            .unwrap();

        assert_eq!(decoded.len(), 4);
        let indices: Vec<usize> = decoded.iter().map(|tx| tx.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 4]);
        let memos: Vec<&str> = decoded.iter().map(|tx| tx.memo.as_str()).collect();
        assert_eq!(memos, vec!["tx-0", "tx-1", "tx-2", "tx-4"]);
        assert_eq!(decoded[3].signer_sequences, vec![4]);
        assert_eq!(decoded[0].signature_count, 1);
    }

    #[test]
    fn strict_mode_reports_the_failing_index() {
        let err = decoder()
            .decode_all(&batch_with_malformed_third(), true)
            .unwrap_err();
        assert!(matches!(err, CompassError::DecodeFailed { index: 3, .. }));
    }

    #[test]
    fn unregistered_messages_decode_generically() {
        let decoded = decoder()
            .decode_all(&[raw_tx(vec![ping(1)], "", 0)], true)
            .unwrap();
        let message = &decoded[0].messages[0];
        assert!(!message.is_known());
        assert_eq!(message.type_url(), MSG_PING_TYPE_URL);
    }

    #[test]
    fn registered_messages_decode_structurally() {
        let registry = TypeRegistry::with_seed([ping_schema()]).unwrap();
        let decoder = BatchDecoder::new(Arc::new(registry));
        let decoded = decoder.decode_all(&[raw_tx(vec![ping(7)], "", 0)], true).unwrap();

        let known = decoded[0].messages[0].as_known().expect("known");
        assert_eq!(known.value["count"], 7);
    }

    #[test]
    fn broken_registered_message_degrades_to_generic() {
        // valid protobuf for the fallback, wrong wire type for MsgPing.count
        let broken = Any {
            type_url: MSG_PING_TYPE_URL.to_string(),
            value: vec![0x15, 0x01, 0x00, 0x00, 0x00],
        };
        let registry = TypeRegistry::with_seed([ping_schema()]).unwrap();
        let decoder = BatchDecoder::new(Arc::new(registry));
        let raw = [raw_tx(vec![ping(1), broken], "", 0)];

        let decoded = decoder.decode_all(&raw, false).unwrap();
        assert!(decoded[0].messages[0].is_known());
        assert!(!decoded[0].messages[1].is_known());

        let err = decoder.decode_all(&raw, true).unwrap_err();
        assert!(matches!(err, CompassError::DecodeFailed { index: 0, .. }));
    }

    #[test]
    fn hash_matches_raw_bytes() {
        let raw = raw_tx(vec![ping(2)], "", 0);
        let decoded = decoder().decode_all(&[raw.clone()], false).unwrap();
        assert_eq!(decoded[0].hash, tx_hash(&raw));
    }

    #[test]
    fn output_serializes_with_message_kind() {
        let decoded = decoder()
            .decode_all(&[raw_tx(vec![ping(3)], "memo", 0)], false)
            .unwrap();
        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(json[0]["messages"][0]["kind"], "unknown");
        assert_eq!(json[0]["memo"], "memo");
    }
}
