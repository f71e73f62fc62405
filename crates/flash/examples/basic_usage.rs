//! Builds a console logger that hides credentials, then toggles debug mode.
//!
//! Run with `cargo run -p flash --example basic_usage`.

use anyhow::Result;
use flash::{EncoderType, Logger, MetricsRegistry};
use std::sync::Arc;

fn main() -> Result<()> {
    let registry = MetricsRegistry::new();
    let logger = Logger::builder()
        .encoder(EncoderType::Console)
        .color()
        .sinks(["stdout"])
        .stacktrace()
        .skip_keys(["password", "token"])
        .metrics("basic_usage", Arc::new(registry.clone()))
        .build()?;
    logger.install()?;

    let span = tracing::info_span!("session", user = "alice");
    let _guard = span.enter();

    tracing::info!(password = "hunter2", attempt = 1, "login");
    tracing::debug!("not shown at INFO");

    logger.set_debug(true);
    tracing::debug!(token = "abc123", "token refreshed");
    tracing::error!("error entries now carry a stacktrace");

    logger.flush()?;
    print!("{}", registry.render_prometheus());
    Ok(())
}
