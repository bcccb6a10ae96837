//! Tracing subscriber setup

use tracing::Level;

use crate::config::Settings;
use crate::error::{BackpackError, BackpackResult};

/// Install the global fmt subscriber.
///
/// `debug_logging` enables trace output, which includes every skipped
/// "not ready this frame" lookup. Calling this again after a subscriber is
/// installed returns an error and leaves the first one in place.
pub fn init_logging(settings: &Settings) -> BackpackResult<()> {
    let level = if settings.debug_logging {
        Level::TRACE
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| BackpackError::Logging(e.to_string()))
}
