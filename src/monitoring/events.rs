use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::account::AccountSequence;
use crate::transport::TxResult;
use crate::tx::{SignerError, TxStage};

use super::metrics::{
    DECODE_BATCH_ABORTED_TOTAL, DECODE_TX_TOTAL, TX_CONFIRMATION_LATENCY_MS, TX_GAS_USED, TX_TOTAL,
    prometheus_enabled,
};

pub fn tx_stage(identity: &str, stage: TxStage, sequence: AccountSequence) {
    debug!(
        target: "monitoring::tx",
        event = "stage",
        identity,
        stage = %stage,
        sequence = %sequence,
        "tx stage reached"
    );
}

pub fn tx_signing_failed(identity: &str, sequence: AccountSequence, error: &SignerError) {
    warn!(
        target: "monitoring::tx",
        event = "signing_failed",
        identity,
        sequence = %sequence,
        error = %error,
        "tx signing failed"
    );

    if prometheus_enabled() {
        counter!(
            TX_TOTAL,
            "identity" => identity.to_string(),
            "stage" => "signing_failed"
        )
        .increment(1);
    }
}

pub fn tx_rejected(identity: &str, hash: &str, code: Option<u32>, reason: &str) {
    warn!(
        target: "monitoring::tx",
        event = "rejected",
        identity,
        hash,
        code = code.unwrap_or_default(),
        transport_error = code.is_none(),
        reason,
        "tx submission rejected"
    );

    if prometheus_enabled() {
        let code_label = code.map_or_else(|| "transport".to_string(), |code| code.to_string());
        counter!(
            TX_TOTAL,
            "identity" => identity.to_string(),
            "stage" => TxStage::Rejected.as_str(),
            "code" => code_label
        )
        .increment(1);
    }
}

pub fn tx_submitted(identity: &str, hash: &str, sequence: AccountSequence) {
    info!(
        target: "monitoring::tx",
        event = "submitted",
        identity,
        hash,
        sequence = %sequence,
        "tx accepted into mempool"
    );

    if prometheus_enabled() {
        counter!(
            TX_TOTAL,
            "identity" => identity.to_string(),
            "stage" => TxStage::Submitted.as_str()
        )
        .increment(1);
    }
}

pub fn tx_confirmed(identity: &str, hash: &str, result: &TxResult, elapsed: Duration) {
    let latency_ms = elapsed.as_secs_f64() * 1_000.0;
    if result.code == 0 {
        info!(
            target: "monitoring::tx",
            event = "confirmed",
            status = "success",
            identity,
            hash,
            height = result.height,
            gas_used = result.gas_used,
            gas_wanted = result.gas_wanted,
            latency_ms,
            "tx committed"
        );
    } else {
        warn!(
            target: "monitoring::tx",
            event = "confirmed",
            status = "failed",
            identity,
            hash,
            height = result.height,
            code = result.code,
            log = %result.log,
            latency_ms,
            "tx committed with non-zero code"
        );
    }

    if prometheus_enabled() {
        let status = if result.code == 0 { "success" } else { "failed" };
        counter!(
            TX_TOTAL,
            "identity" => identity.to_string(),
            "stage" => TxStage::Confirmed.as_str(),
            "status" => status
        )
        .increment(1);
        histogram!(
            TX_CONFIRMATION_LATENCY_MS,
            "identity" => identity.to_string()
        )
        .record(latency_ms);
        histogram!(
            TX_GAS_USED,
            "identity" => identity.to_string()
        )
        .record(result.gas_used as f64);
    }
}

pub fn tx_timed_out(hash: &str, attempts: u32, deadline: Duration) {
    warn!(
        target: "monitoring::tx",
        event = "timed_out",
        hash,
        attempts,
        deadline_ms = deadline.as_millis() as u64,
        "tx not observed before deadline, outcome unknown"
    );

    if prometheus_enabled() {
        counter!(TX_TOTAL, "stage" => TxStage::TimedOut.as_str()).increment(1);
    }
}

pub fn tx_canceled(hash: &str, attempts: u32, elapsed: Duration) {
    info!(
        target: "monitoring::tx",
        event = "canceled",
        hash,
        attempts,
        elapsed_ms = elapsed.as_millis() as u64,
        "tx confirmation polling canceled"
    );

    if prometheus_enabled() {
        counter!(TX_TOTAL, "stage" => TxStage::Canceled.as_str()).increment(1);
    }
}

pub fn decode_item_skipped(index: usize, reason: &str) {
    warn!(
        target: "monitoring::decode",
        event = "skipped",
        index,
        reason,
        "transaction skipped during batch decode"
    );
}

pub fn decode_batch_finished(total: usize, decoded: usize, skipped: usize, aborted: bool) {
    info!(
        target: "monitoring::decode",
        event = "batch",
        total,
        decoded,
        skipped,
        aborted,
        "batch decode finished"
    );

    if prometheus_enabled() {
        counter!(DECODE_TX_TOTAL, "result" => "decoded").increment(decoded as u64);
        counter!(DECODE_TX_TOTAL, "result" => "skipped").increment(skipped as u64);
        if aborted {
            counter!(DECODE_BATCH_ABORTED_TOTAL).increment(1);
        }
    }
}
