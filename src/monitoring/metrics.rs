use std::net::{AddrParseError, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::info;

use crate::config::PrometheusConfig;

pub(crate) const TX_TOTAL: &str = "compass_tx_total";
pub(crate) const TX_CONFIRMATION_LATENCY_MS: &str = "compass_tx_confirmation_latency_ms";
pub(crate) const TX_GAS_USED: &str = "compass_tx_gas_used";
pub(crate) const DECODE_TX_TOTAL: &str = "compass_decode_tx_total";
pub(crate) const DECODE_BATCH_ABORTED_TOTAL: &str = "compass_decode_batch_aborted_total";

/// 确认延迟的分桶（毫秒），覆盖 1s 轮询间隔到默认 10s 截止时间。
const LATENCY_BUCKETS_MS: &[f64] = &[
    250.0, 500.0, 1_000.0, 2_000.0, 3_000.0, 5_000.0, 7_500.0, 10_000.0, 15_000.0,
];

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus 监听地址无效 `{listen}`: {source}")]
    InvalidListen {
        listen: String,
        #[source]
        source: AddrParseError,
    },
    #[error("安装 prometheus exporter 失败: {0}")]
    Install(#[from] BuildError),
}

/// 按配置安装 Prometheus exporter。未启用时不做任何事并返回 `false`；
/// 已安装过则直接复用第一次的监听地址。
pub fn try_init_prometheus(config: &PrometheusConfig) -> Result<bool, MetricsError> {
    if !config.enable {
        return Ok(false);
    }

    let addr = EXPORTER.get_or_try_init(|| {
        let addr: SocketAddr =
            config
                .listen
                .parse()
                .map_err(|source| MetricsError::InvalidListen {
                    listen: config.listen.clone(),
                    source,
                })?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Full(TX_CONFIRMATION_LATENCY_MS.to_string()),
                LATENCY_BUCKETS_MS,
            )?
            .install()?;
        describe_metrics();
        PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
        Ok::<_, MetricsError>(addr)
    })?;

    info!(target: "monitoring::metrics", addr = %addr, "prometheus exporter listening");
    Ok(true)
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}

fn describe_metrics() {
    describe_counter!(TX_TOTAL, "交易生命周期各阶段计数，按 stage 标签区分");
    describe_histogram!(
        TX_CONFIRMATION_LATENCY_MS,
        Unit::Milliseconds,
        "从节点接受到观察到上链的耗时"
    );
    describe_histogram!(TX_GAS_USED, "已上链交易实际消耗的 gas");
    describe_counter!(DECODE_TX_TOTAL, "批量解码的交易数，按 result 标签区分");
    describe_counter!(DECODE_BATCH_ABORTED_TOTAL, "严格模式下中止的解码批次");
}
