//! compass：Cosmos-SDK 交易生命周期客户端。
//!
//! 负责 sequence 取号与推进、签名广播与确认轮询，以及对未知消息类型容错的批量解码。

pub mod account;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod keyring;
pub mod monitoring;
pub mod registry;
pub mod transport;
pub mod tx;

#[cfg(test)]
pub(crate) mod test_support;

pub use account::{Account, AccountNumber, AccountSequence, SequenceLease, SequenceTracker};
pub use client::{Client, Session};
pub use config::{ClientConfig, ConfigError, load_config};
pub use decode::{BatchDecoder, DecodedTransaction};
pub use error::{CompassError, CompassResult};
pub use keyring::{Keyring, KeyringError, MemoryKeyring, SigningIdentity};
pub use registry::{
    Decodable, DecodedMessage, FieldMap, MessageSchema, ProtoSchema, TypeRegistry, default_seed,
};
pub use transport::{CometRpcTransport, Transport, TransportError, TxStatus};
pub use tx::{
    Broadcaster, DirectSigner, FeeParams, KeySigner, TransactionAssembler, TxConfirmation,
    TxSigner,
};
