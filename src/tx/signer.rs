use async_trait::async_trait;
use thiserror::Error;

use crate::keyring::SigningIdentity;

use super::encode::{encode_auth_info, encode_body, sign_doc_bytes};
use super::envelope::{SignedEnvelope, UnsignedEnvelope};

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("找不到身份 {0} 的私钥")]
    MissingKey(String),
    #[error("签名器拒绝签名: {0}")]
    Rejected(String),
}

/// 把待签名交易变成已签名交易。
#[async_trait]
pub trait TxSigner: Send + Sync {
    async fn sign(
        &self,
        envelope: &UnsignedEnvelope,
        identity: &SigningIdentity,
    ) -> Result<SignedEnvelope, SignerError>;
}

/// 外部签名原语：对任意字节给出该身份的签名。
#[async_trait]
pub trait KeySigner: Send + Sync {
    async fn sign_bytes(
        &self,
        identity: &SigningIdentity,
        payload: &[u8],
    ) -> Result<Vec<u8>, SignerError>;
}

/// SIGN_MODE_DIRECT：签名对象是 `SignDoc` 的 protobuf 编码。
pub struct DirectSigner<K> {
    key_signer: K,
    pubkey_type_url: String,
}

impl<K: KeySigner> DirectSigner<K> {
    pub fn new(key_signer: K, pubkey_type_url: impl Into<String>) -> Self {
        Self {
            key_signer,
            pubkey_type_url: pubkey_type_url.into(),
        }
    }
}

#[async_trait]
impl<K: KeySigner> TxSigner for DirectSigner<K> {
    async fn sign(
        &self,
        envelope: &UnsignedEnvelope,
        identity: &SigningIdentity,
    ) -> Result<SignedEnvelope, SignerError> {
        let body_bytes = encode_body(envelope);
        let auth_info_bytes =
            encode_auth_info(envelope, &identity.public_key, &self.pubkey_type_url);
        let sign_doc = sign_doc_bytes(
            &body_bytes,
            &auth_info_bytes,
            envelope.chain_id(),
            envelope.account().number,
        );
        let signature = self.key_signer.sign_bytes(identity, &sign_doc).await?;
        if signature.is_empty() {
            return Err(SignerError::Rejected(format!(
                "empty signature for {}",
                identity.name
            )));
        }

        Ok(SignedEnvelope {
            body_bytes,
            auth_info_bytes,
            signatures: vec![signature],
        })
    }
}
