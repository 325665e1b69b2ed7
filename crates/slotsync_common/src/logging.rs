//! Logging setup shared by every slotsync binary and test.
//!
//! All crates log through `tracing` macros; this module only installs the
//! subscriber.

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Target used for events that should reach security alerting
/// (rejected webhook signatures, failed admin authentication).
pub const SECURITY_TARGET: &str = "security";

/// Initialize the tracing subscriber at INFO.
///
/// ```
/// use slotsync_common::logging;
///
/// logging::init();
/// // a second call is a no-op
/// logging::init_with_level(tracing::Level::DEBUG);
/// ```
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific level for the `slotsync` crates.
///
/// `RUST_LOG` directives are honoured on top of the level. Uses `try_init`, so
/// calling this when a subscriber is already installed does nothing.
pub fn init_with_level(level: Level) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("slotsync={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true),
        )
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}
