//! Logging setup for hosts and tests.
//!
//! The SDK itself only emits `tracing` events: a `debug` event per API call
//! and waiter poll, `info` per applied mutation, `warn` for recoverable
//! surprises and `error` when a call aborts. Spans named `reconcile.present`,
//! `reconcile.absent` and `reconcile.describe` carry the resource type and
//! name. The helpers here install a subscriber that writes those events to
//! **stderr**.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `reconcile_sdk=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Show every API call and waiter poll
//! RUST_LOG=reconcile_sdk=debug ./my-engine
//!
//! # Only waiter activity
//! RUST_LOG=reconcile_sdk::waiter=debug ./my-engine
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber at `info` unless `RUST_LOG`
/// says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use reconcile_sdk::init_logging;
///
/// fn main() {
///     init_logging();
///     tracing::info!("engine starting");
/// }
/// ```
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`], with a custom level used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if a subscriber is already set.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

/// Route logs through the test harness's captured output.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// Defaults to `debug` so failing tests show each API call and waiter poll.
pub fn init_test_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("reconcile_sdk=debug"))
        .with(fmt::layer().with_test_writer().with_target(true))
        .try_init()
        .is_ok()
}
