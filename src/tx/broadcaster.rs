use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tendermint_proto::google::protobuf::Any;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::account::{AccountSequence, SequenceTracker};
use crate::config::ConfirmationConfig;
use crate::error::{CompassError, CompassResult};
use crate::keyring::SigningIdentity;
use crate::monitoring::events;
use crate::transport::{Transport, TxResult, TxStatus};

use super::assembler::TransactionAssembler;
use super::encode::{encode_tx_raw, tx_hash};
use super::fee::FeeParams;
use super::signer::TxSigner;

/// 单笔交易在生命周期中的阶段，仅用于日志与指标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Built,
    Signed,
    Encoded,
    Submitted,
    Confirmed,
    TimedOut,
    Canceled,
    Rejected,
}

impl TxStage {
    pub fn as_str(self) -> &'static str {
        match self {
            TxStage::Built => "built",
            TxStage::Signed => "signed",
            TxStage::Encoded => "encoded",
            TxStage::Submitted => "submitted",
            TxStage::Confirmed => "confirmed",
            TxStage::TimedOut => "timed_out",
            TxStage::Canceled => "canceled",
            TxStage::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点接受交易后创建，轮询结束即丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationHandle {
    pub tx_hash: String,
    pub submitted_at: Instant,
}

/// 已观察到上链的交易。`is_success` 反映链上执行结果。
#[derive(Debug, Clone)]
pub struct TxConfirmation {
    pub handle: ConfirmationHandle,
    pub sequence: AccountSequence,
    pub result: TxResult,
    pub elapsed: Duration,
}

impl TxConfirmation {
    pub fn tx_hash(&self) -> &str {
        &self.handle.tx_hash
    }

    pub fn height(&self) -> u64 {
        self.result.height
    }

    pub fn is_success(&self) -> bool {
        self.result.code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationSettings {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl ConfirmationSettings {
    /// 轮询间隔必须非零，否则无法构造定时器。
    pub fn validate(&self) -> CompassResult<()> {
        if self.poll_interval.is_zero() {
            return Err(CompassError::invariant("confirmation poll interval must be non-zero"));
        }
        Ok(())
    }
}

impl From<&ConfirmationConfig> for ConfirmationSettings {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            deadline: config.deadline(),
        }
    }
}

/// 签名、编码、提交并轮询确认。同一身份的整个流程都持有该身份的 sequence 租约。
pub struct Broadcaster {
    tracker: Arc<SequenceTracker>,
    assembler: TransactionAssembler,
    signer: Arc<dyn TxSigner>,
    transport: Arc<dyn Transport>,
    settings: ConfirmationSettings,
}

impl Broadcaster {
    pub fn new(
        tracker: Arc<SequenceTracker>,
        assembler: TransactionAssembler,
        signer: Arc<dyn TxSigner>,
        transport: Arc<dyn Transport>,
        settings: ConfirmationSettings,
    ) -> CompassResult<Self> {
        settings.validate()?;
        Ok(Self {
            tracker,
            assembler,
            signer,
            transport,
            settings,
        })
    }

    pub fn tracker(&self) -> &Arc<SequenceTracker> {
        &self.tracker
    }

    pub fn settings(&self) -> ConfirmationSettings {
        self.settings
    }

    pub async fn send(
        &self,
        identity: &SigningIdentity,
        messages: Vec<Any>,
        fee: FeeParams,
        cancel: &CancellationToken,
    ) -> CompassResult<TxConfirmation> {
        if messages.is_empty() {
            return Err(CompassError::EmptyTransaction);
        }

        let mut lease = self.tracker.lease(identity).await;
        let envelope = self
            .assembler
            .build(&mut lease, self.transport.as_ref(), messages, fee)
            .await?;
        let sequence = envelope.account().sequence;
        events::tx_stage(&identity.name, TxStage::Built, sequence);

        let signed = match self.signer.sign(&envelope, identity).await {
            Ok(signed) => signed,
            Err(err) => {
                events::tx_signing_failed(&identity.name, sequence, &err);
                return Err(err.into());
            }
        };
        events::tx_stage(&identity.name, TxStage::Signed, sequence);

        let tx_bytes = encode_tx_raw(&signed)?;
        let local_hash = tx_hash(&tx_bytes);
        events::tx_stage(&identity.name, TxStage::Encoded, sequence);

        let response = match self.transport.submit(tx_bytes).await {
            Ok(response) => response,
            Err(err) => {
                events::tx_rejected(&identity.name, &local_hash, None, &err.to_string());
                return Err(CompassError::rejected(None, err));
            }
        };

        if !response.is_accepted() {
            if response.is_sequence_mismatch() {
                lease.invalidate();
            }
            let reason = if response.codespace.is_empty() {
                response.log.clone()
            } else {
                format!("{}: {}", response.codespace, response.log)
            };
            events::tx_rejected(&identity.name, &local_hash, Some(response.code), &reason);
            return Err(CompassError::rejected(Some(response.code), reason));
        }

        lease.commit()?;
        let tx_hash = if response.hash.is_empty() {
            local_hash
        } else {
            response.hash
        };
        let handle = ConfirmationHandle {
            tx_hash,
            submitted_at: Instant::now(),
        };
        events::tx_submitted(&identity.name, &handle.tx_hash, sequence);

        let result = self.await_confirmation(&handle, cancel).await?;
        let elapsed = handle.submitted_at.elapsed();
        events::tx_confirmed(&identity.name, &handle.tx_hash, &result, elapsed);

        Ok(TxConfirmation {
            handle,
            sequence,
            result,
            elapsed,
        })
    }

    /// 按固定间隔查询交易状态，直到上链、超过截止时间或被取消。
    ///
    /// 超时只说明截止前没有观察到确认，交易仍可能随后上链。
    pub async fn await_confirmation(
        &self,
        handle: &ConfirmationHandle,
        cancel: &CancellationToken,
    ) -> CompassResult<TxResult> {
        let deadline = sleep_until(handle.submitted_at + self.settings.deadline);
        tokio::pin!(deadline);

        let mut ticker = interval_at(
            handle.submitted_at + self.settings.poll_interval,
            self.settings.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts: u32 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.canceled(handle, attempts)),
                _ = deadline.as_mut() => return Err(self.timed_out(handle, attempts)),
                _ = ticker.tick() => {}
            }

            attempts += 1;
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.canceled(handle, attempts)),
                _ = deadline.as_mut() => return Err(self.timed_out(handle, attempts)),
                status = self.transport.query_tx_status(&handle.tx_hash) => status,
            };

            match status {
                Ok(TxStatus::Committed(result)) => return Ok(result),
                Ok(TxStatus::NotFound) => {
                    debug!(
                        target: "compass::tx",
                        hash = %handle.tx_hash,
                        attempts,
                        "tx not yet committed"
                    );
                }
                Err(err) => {
                    warn!(
                        target: "compass::tx",
                        hash = %handle.tx_hash,
                        attempts,
                        error = %err,
                        "tx status query failed, retrying on next tick"
                    );
                }
            }
        }
    }

    fn canceled(&self, handle: &ConfirmationHandle, attempts: u32) -> CompassError {
        events::tx_canceled(&handle.tx_hash, attempts, handle.submitted_at.elapsed());
        CompassError::Canceled {
            hash: handle.tx_hash.clone(),
        }
    }

    fn timed_out(&self, handle: &ConfirmationHandle, attempts: u32) -> CompassError {
        events::tx_timed_out(&handle.tx_hash, attempts, self.settings.deadline);
        CompassError::ConfirmationTimedOut {
            hash: handle.tx_hash.clone(),
        }
    }
}
