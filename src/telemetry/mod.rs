//! Tracing subscriber setup for binaries and long-running pipelines.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the caller's choice. [`init`] wires up the conventional stack used by
//! the demo binaries: an `EnvFilter` honoring `RUST_LOG`, a compact fmt
//! layer, and `tracing-error`'s [`ErrorLayer`] so span traces attach to
//! diagnostics.

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the default tracing subscriber.
///
/// Filter resolution: `RUST_LOG` when set, otherwise `info`. Calling this
/// twice is harmless; the second installation attempt is ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(ErrorLayer::default())
        .try_init();
}
