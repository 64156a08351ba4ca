//! Logging and metrics setup

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_support_config::Settings;

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("voice_support={}", level).into()
    });

    // Console runs use stdout for the dialogue, so logs go to stderr
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Start the Prometheus exporter when metrics are enabled
///
/// Returns the address the exporter listens on. Must be called from inside
/// the Tokio runtime.
pub fn init_metrics(config: &Settings) -> anyhow::Result<Option<SocketAddr>> {
    if !config.observability.metrics_enabled {
        return Ok(None);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_default_metrics();
    Ok(Some(addr))
}

/// Zero-valued series so dashboards see them before the first call
fn register_default_metrics() {
    gauge!("voice_support_active_sessions").set(0.0);
    counter!("voice_support_turns_total").absolute(0);
    for outcome in ["goodbye", "transferred", "turn_limit", "time_limit"] {
        counter!("voice_support_sessions_total", "outcome" => outcome).absolute(0);
    }
    histogram!("voice_support_session_duration_seconds").record(0.0);
}
