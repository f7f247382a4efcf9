//! Logging setup for the word2vec CLI.
//!
//! Single stderr layer with an `EnvFilter`; unlike a long-lived server this is
//! a short batch job, so there is no rotating per-day log file to manage.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging at the given default level (overridable via `RUST_LOG`).
pub fn init_logging(default_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("word2vec={default_level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;

    Ok(())
}

/// Map the reference tool's `-debug` integer to a tracing level name.
///
/// `0` is quiet (warnings and errors only), `1` is informational, `2` and
/// above additionally emit the periodic progress lines from the training
/// loop at debug level.
pub fn debug_level_to_tracing(debug: u32) -> &'static str {
    match debug {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}
