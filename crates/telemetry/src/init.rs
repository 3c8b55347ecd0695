// Path: crates/telemetry/src/init.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global `tracing` subscriber: JSON lines on stderr with
/// event fields flattened to the top level, so log pipelines can index
/// `list_id`, `credential_id`, and friends without unwrapping a nested
/// `fields` object.
///
/// `RUST_LOG` wins when set; `default_directives` applies otherwise
/// (the node passes `"info"`). Calling this twice is tolerated so tests
/// and embedders can initialize unconditionally.
pub fn init_tracing(default_directives: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    let format = fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_writer(std::io::stderr);

    // Bridge `log` records from dependencies; ignore a repeat install.
    tracing_log::LogTracer::init().ok();
    if tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init()
        .is_err()
    {
        tracing::debug!(target: "telemetry", "tracing subscriber already installed");
    }
}
