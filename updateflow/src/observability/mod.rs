//! Tracing subscriber setup.
//!
//! Library code only emits through `tracing`; binaries and tests call
//! [`init_tracing`] once to see the output.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "updateflow=info";

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter`. With `json` set, events are
/// written as JSON lines. Returns false if a global subscriber was already
/// installed.
pub fn init_tracing(default_filter: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = fmt().with_env_filter(filter).with_target(true);

    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
