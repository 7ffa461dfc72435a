//! Logging initialization.
//!
//! Thin wrapper over tracing-subscriber with `EnvFilter`. The `RUST_LOG`
//! environment variable takes precedence over the supplied default level:
//!
//! ```bash
//! RUST_LOG=debug codegraph index .
//! RUST_LOG=codegraph::indexing=trace codegraph query definitions ...
//! ```

use std::sync::Once;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: Once = Once::new();

/// Initialize logging with the given default filter directive.
///
/// Call once at startup. Safe to call multiple times (only the first call
/// takes effect).
pub fn init_with_level(default_level: &str) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(default_level)
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Initialize logging at the default `warn` level for quiet operation.
pub fn init() {
    init_with_level("warn");
}
