pub mod events;
pub mod metrics;

pub use self::metrics::{MetricsError, prometheus_enabled, try_init_prometheus};
