use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const PREDICTIONS_TOTAL: &str = "dermascan_predictions_total";
pub const REJECTIONS_TOTAL: &str = "dermascan_rejections_total";
pub const PIPELINE_FAILURES_TOTAL: &str = "dermascan_pipeline_failures_total";
pub const INFERENCE_SECONDS: &str = "dermascan_inference_seconds";
pub const UPLOAD_BYTES: &str = "dermascan_upload_bytes";

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Installs the Prometheus recorder and returns the handle `/metrics` renders.
pub fn install_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
