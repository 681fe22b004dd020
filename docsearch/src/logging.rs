//! Tracing subscriber setup.

use std::env;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). `LOG_FORMAT=json`
/// switches to one JSON object per line.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
