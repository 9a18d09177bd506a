use ibc_proto::cosmos::tx::v1beta1::mode_info::{Single, Sum};
use ibc_proto::cosmos::tx::v1beta1::{AuthInfo, ModeInfo, SignDoc, SignerInfo, TxBody, TxRaw};
use tendermint_proto::google::protobuf::Any;
use prost::Message;
use sha2::{Digest, Sha256};

use crate::account::AccountNumber;
use crate::error::{CompassError, CompassResult};

use super::envelope::{SignedEnvelope, UnsignedEnvelope};

/// `cosmos.tx.signing.v1beta1.SignMode.SIGN_MODE_DIRECT`
const SIGN_MODE_DIRECT: i32 = 1;

pub fn encode_body(envelope: &UnsignedEnvelope) -> Vec<u8> {
    TxBody {
        messages: envelope.messages().to_vec(),
        memo: envelope.memo().to_string(),
        timeout_height: envelope.timeout_height(),
        ..Default::default()
    }
    .encode_to_vec()
}

/// 单签名者、SIGN_MODE_DIRECT 的 auth info。
pub fn encode_auth_info(
    envelope: &UnsignedEnvelope,
    public_key: &[u8],
    pubkey_type_url: &str,
) -> Vec<u8> {
    let public_key = Any {
        type_url: pubkey_type_url.to_string(),
        value: public_key.to_vec().encode_to_vec(),
    };
    let signer_info = SignerInfo {
        public_key: Some(public_key),
        mode_info: Some(ModeInfo {
            sum: Some(Sum::Single(Single {
                mode: SIGN_MODE_DIRECT,
            })),
        }),
        sequence: envelope.account().sequence.to_u64(),
    };

    AuthInfo {
        signer_infos: vec![signer_info],
        fee: Some(envelope.fee().to_proto()),
        ..Default::default()
    }
    .encode_to_vec()
}

pub fn sign_doc_bytes(
    body_bytes: &[u8],
    auth_info_bytes: &[u8],
    chain_id: &str,
    account_number: AccountNumber,
) -> Vec<u8> {
    SignDoc {
        body_bytes: body_bytes.to_vec(),
        auth_info_bytes: auth_info_bytes.to_vec(),
        chain_id: chain_id.to_string(),
        account_number: account_number.to_u64(),
    }
    .encode_to_vec()
}

pub fn encode_tx_raw(signed: &SignedEnvelope) -> CompassResult<Vec<u8>> {
    if signed.body_bytes.is_empty() {
        return Err(CompassError::invariant("signed envelope has an empty body"));
    }
    if signed.signatures.is_empty() || signed.signatures.iter().any(Vec::is_empty) {
        return Err(CompassError::invariant(
            "signed envelope is missing a signature",
        ));
    }

    Ok(TxRaw {
        body_bytes: signed.body_bytes.clone(),
        auth_info_bytes: signed.auth_info_bytes.clone(),
        signatures: signed.signatures.clone(),
    }
    .encode_to_vec())
}

/// CometBFT 的交易哈希：原始字节的 SHA-256，大写十六进制。
pub fn tx_hash(tx_bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(tx_bytes))
}
