//! 交易生命周期：组装、签名、编码、提交与确认轮询。

pub mod assembler;
pub mod broadcaster;
pub mod encode;
pub mod envelope;
pub mod fee;
pub mod signer;


pub use assembler::TransactionAssembler;
pub use broadcaster::{
    Broadcaster, ConfirmationHandle, ConfirmationSettings, TxConfirmation, TxStage,
};
pub use encode::tx_hash;
pub use envelope::{SignedEnvelope, UnsignedEnvelope};
pub use fee::{Coin, FeeParams, GasPrice};
pub use signer::{DirectSigner, KeySigner, SignerError, TxSigner};
