//! Logging setup.
//!
//! Logs go to **stderr**; the host owns stdout. Filtering follows `RUST_LOG`,
//! for example:
//!
//! ```bash
//! # Request-level detail from the HTTP client only
//! RUST_LOG=info,project_provider::http=debug ./project-provider
//!
//! # Everything the provider emits
//! RUST_LOG=project_provider=trace ./project-provider
//! ```
//!
//! Each orchestrator operation runs inside a span carrying the project key
//! (and environment name), so log lines from the HTTP layer can be tied back
//! to the resource being changed.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
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

/// Install the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Install the global subscriber with a custom fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```no_run
/// project_provider::init_logging_with_default("debug");
/// tracing::debug!("provider starting");
/// ```
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Like [`init_logging`] but returns `false` instead of panicking when a
/// subscriber is already installed.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
