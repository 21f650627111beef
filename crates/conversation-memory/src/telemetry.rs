// conversation-memory/src/telemetry.rs

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber for host processes.
///
/// Reads `RUST_LOG` when set, defaulting to `info`. Calling this more than
/// once keeps the first subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}
