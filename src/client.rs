//! 显式的客户端上下文：`Client::new` 校验配置并建立类型表，
//! `Client::connect` 绑定传输层、密钥库与签名器，得到可用的 [`Session`]。

use std::sync::Arc;

use tendermint_proto::google::protobuf::Any;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::account::{Account, SequenceTracker};
use crate::config::ClientConfig;
use crate::decode::{BatchDecoder, DecodedTransaction};
use crate::error::{CompassError, CompassResult};
use crate::keyring::{Keyring, KeyringError, SigningIdentity, select_active};
use crate::registry::{MessageSchema, TypeRegistry};
use crate::transport::Transport;
use crate::tx::{
    Broadcaster, ConfirmationSettings, FeeParams, TransactionAssembler, TxConfirmation, TxSigner,
};

pub struct Client {
    config: ClientConfig,
    registry: Arc<TypeRegistry>,
    tracker: Arc<SequenceTracker>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        seed: impl IntoIterator<Item = Arc<dyn MessageSchema>>,
    ) -> CompassResult<Self> {
        config.validate()?;
        let registry = TypeRegistry::with_seed(seed)?;
        info!(
            target: "compass::client",
            chain_id = %config.chain_id,
            rpc_addr = %config.rpc_addr,
            schemas = registry.len(),
            "client initialised"
        );
        Ok(Self {
            config,
            registry: Arc::new(registry),
            tracker: Arc::new(SequenceTracker::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn connect(
        &self,
        transport: Arc<dyn Transport>,
        keyring: Arc<dyn Keyring>,
        signer: Arc<dyn TxSigner>,
    ) -> CompassResult<Session> {
        let active = select_active(keyring.as_ref(), &self.config.key)?
            .ok_or_else(|| CompassError::UnknownIdentity(self.config.key.clone()))?;
        if active.name != self.config.key {
            warn!(
                target: "compass::client",
                configured = %self.config.key,
                selected = %active.name,
                "configured key not found, falling back to first keyring entry"
            );
        }

        let broadcaster = Broadcaster::new(
            self.tracker.clone(),
            TransactionAssembler::from_config(&self.config),
            signer,
            transport.clone(),
            ConfirmationSettings::from(&self.config.confirmation),
        )?;

        Ok(Session {
            config: self.config.clone(),
            transport,
            keyring,
            registry: self.registry.clone(),
            broadcaster,
            decoder: BatchDecoder::new(self.registry.clone()),
            active: RwLock::new(active),
        })
    }
}

/// 已连接的会话。可在多个任务间共享（`Arc<Session>`）。
pub struct Session {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    keyring: Arc<dyn Keyring>,
    registry: Arc<TypeRegistry>,
    broadcaster: Broadcaster,
    decoder: BatchDecoder,
    active: RwLock<SigningIdentity>,
}

impl Session {
    pub fn active_identity(&self) -> SigningIdentity {
        self.active.read().clone()
    }

    pub fn set_from_name(&self, name: &str) -> CompassResult<()> {
        let identity = self.keyring.get(name).map_err(|err| match err {
            KeyringError::NotFound(name) => CompassError::UnknownIdentity(name),
            other => CompassError::Keyring(other),
        })?;
        info!(
            target: "compass::client",
            identity = %identity.name,
            address = %identity.address,
            "active identity changed"
        );
        *self.active.write() = identity;
        Ok(())
    }

    pub fn identities(&self) -> CompassResult<Vec<SigningIdentity>> {
        Ok(self.keyring.list_identities()?)
    }

    pub fn key_exists(&self, name: &str) -> bool {
        self.keyring.contains(name)
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 按配置推导手续费。
    pub fn fee(&self, estimated_gas: Option<u64>) -> CompassResult<FeeParams> {
        Ok(FeeParams::from_config(&self.config, estimated_gas)?)
    }

    /// 以当前身份、配置推导的手续费发送交易并等待确认。
    pub async fn send_transaction(
        &self,
        messages: Vec<Any>,
        cancel: &CancellationToken,
    ) -> CompassResult<TxConfirmation> {
        let fee = self.fee(None)?;
        let identity = self.active_identity();
        self.broadcaster.send(&identity, messages, fee, cancel).await
    }

    pub async fn send_transaction_with_fee(
        &self,
        messages: Vec<Any>,
        fee: FeeParams,
        cancel: &CancellationToken,
    ) -> CompassResult<TxConfirmation> {
        let identity = self.active_identity();
        self.broadcaster.send(&identity, messages, fee, cancel).await
    }

    /// 以指定身份发送，不改变会话的当前身份。
    pub async fn send_transaction_as(
        &self,
        name: &str,
        messages: Vec<Any>,
        fee: FeeParams,
        cancel: &CancellationToken,
    ) -> CompassResult<TxConfirmation> {
        let identity = self.keyring.get(name).map_err(|err| match err {
            KeyringError::NotFound(name) => CompassError::UnknownIdentity(name),
            other => CompassError::Keyring(other),
        })?;
        self.broadcaster.send(&identity, messages, fee, cancel).await
    }

    pub async fn query_account(&self, address: &str) -> CompassResult<Account> {
        self.transport
            .query_account(address)
            .await
            .map_err(|source| CompassError::AccountLookupFailed {
                address: address.to_string(),
                source,
            })
    }

    pub async fn cached_account(&self, name: &str) -> Option<Account> {
        self.broadcaster.tracker().cached(name).await
    }

    pub async fn unconfirmed_transactions(&self, limit: Option<usize>) -> CompassResult<Vec<Vec<u8>>> {
        Ok(self.transport.unconfirmed_txs(limit).await?)
    }

    pub fn decode_transactions<T: AsRef<[u8]>>(
        &self,
        raw_txs: &[T],
        strict: bool,
    ) -> CompassResult<Vec<DecodedTransaction>> {
        self.decoder.decode_all(raw_txs, strict)
    }

    /// 拉取 mempool 中的交易并解码。
    pub async fn mempool(
        &self,
        limit: Option<usize>,
        strict: bool,
    ) -> CompassResult<Vec<DecodedTransaction>> {
        let raw = self.unconfirmed_transactions(limit).await?;
        self.decode_transactions(&raw, strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::MemoryKeyring;
    use crate::registry::default_seed;
    use crate::test_support::{MockTransport, StaticKeySigner, identity, ping, ping_schema, raw_tx};
    use crate::tx::DirectSigner;

    fn config() -> ClientConfig {
        let mut config = ClientConfig::simd();
        config.key = "alice".to_string();
        config.chain_id = "testing".to_string();
        config.confirmation.poll_interval_ms = 10;
        config.confirmation.deadline_ms = 1_000;
        config
    }

    fn session_with(
        config: ClientConfig,
        keyring: MemoryKeyring,
    ) -> (Arc<MockTransport>, CompassResult<Session>) {
        let transport = Arc::new(MockTransport::new(Account::new(1, 5)));
        let client = Client::new(config, default_seed()).expect("client");
        let signer = Arc::new(DirectSigner::new(
            StaticKeySigner::default(),
            "/cosmos.crypto.secp256k1.PubKey",
        ));
        let session = client.connect(transport.clone(), Arc::new(keyring), signer);
        (transport, session)
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = config();
        config.gas_prices = "free".to_string();
        assert!(matches!(
            Client::new(config, default_seed()),
            Err(CompassError::Config(_))
        ));
    }

    #[test]
    fn connect_requires_an_identity() {
        let (_, session) = session_with(config(), MemoryKeyring::new());
        assert!(matches!(session, Err(CompassError::UnknownIdentity(_))));
    }

    #[test]
    fn connect_falls_back_to_first_identity() {
        let keyring = MemoryKeyring::with_identities([identity("carol"), identity("dave")]);
        let (_, session) = session_with(config(), keyring);
        assert_eq!(session.expect("session").active_identity().name, "carol");
    }

    #[test]
    fn switching_identity_validates_the_name() {
        let keyring = MemoryKeyring::with_identities([identity("alice"), identity("bob")]);
        let (_, session) = session_with(config(), keyring);
        let session = session.expect("session");

        session.set_from_name("bob").expect("switch");
        assert_eq!(session.active_identity().name, "bob");
        assert!(matches!(
            session.set_from_name("mallory"),
            Err(CompassError::UnknownIdentity(_))
        ));
        assert_eq!(session.active_identity().name, "bob");
        assert!(session.key_exists("alice"));
        assert_eq!(session.identities().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sends_with_configured_fee() {
        let keyring = MemoryKeyring::with_identities([identity("alice")]);
        let (transport, session) = session_with(config(), keyring);
        let session = session.expect("session");

        let confirmation = session
            .send_transaction(vec![ping(1)], &CancellationToken::new())
            .await
            .expect("confirmed");
        assert!(confirmation.is_success());
        assert_eq!(confirmation.sequence.to_u64(), 5);
        assert_eq!(transport.submitted_sequences(), vec![5]);
        assert_eq!(session.cached_account("alice").await, Some(Account::new(1, 6)));
    }

    #[tokio::test]
    async fn identities_keep_independent_sequences() {
        let keyring = MemoryKeyring::with_identities([identity("alice"), identity("bob")]);
        let (_, session) = session_with(config(), keyring);
        let session = session.expect("session");
        let fee = session.fee(Some(100_000)).unwrap();

        session
            .send_transaction_as("bob", vec![ping(1)], fee.clone(), &CancellationToken::new())
            .await
            .expect("bob");
        assert_eq!(session.cached_account("bob").await, Some(Account::new(1, 6)));
        assert_eq!(session.cached_account("alice").await, None);

        let err = session
            .send_transaction_as("mallory", vec![ping(1)], fee, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::UnknownIdentity(_)));
    }

    #[tokio::test]
    async fn decodes_the_mempool() {
        let keyring = MemoryKeyring::with_identities([identity("alice")]);
        let (transport, session) = session_with(config(), keyring);
        let session = session.expect("session");
        session.registry().register(ping_schema()).unwrap();
        transport.set_mempool(vec![
            raw_tx(vec![ping(1)], "a", 0),
            vec![0xff],
            raw_tx(vec![ping(2)], "b", 1),
        ]);

        let decoded = session.mempool(None, false).await.unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(|tx| tx.messages[0].is_known()));

        let limited = session.mempool(Some(1), true).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn account_query_failures_are_lookup_failures() {
        let keyring = MemoryKeyring::with_identities([identity("alice")]);
        let (transport, session) = session_with(config(), keyring);
        let session = session.expect("session");
        assert_eq!(
            session.query_account("cosmos1alice").await.unwrap(),
            Account::new(1, 5)
        );

        transport.fail_account_queries(true);
        assert!(matches!(
            session.query_account("cosmos1alice").await,
            Err(CompassError::AccountLookupFailed { .. })
        ));
    }
}
