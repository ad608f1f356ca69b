//! Logging and tracing configuration for FFX Evidence
//!
//! Every pipeline stage logs through `tracing` macros; this module only
//! installs the subscriber.
//!
//! # Usage
//!
//! ```rust
//! ffx_evidence::logging::init();
//! tracing::info!(path = "usb.E01", "Opened evidence container");
//! ```
//!
//! # Environment Variable Control
//!
//! `RUST_LOG` overrides the defaults:
//! ```bash
//! RUST_LOG=debug ffx-evidence metadata usb.E01 ewf
//! RUST_LOG=ffx_evidence::container=trace ffx-evidence verify usb.E01 ewf
//! RUST_LOG=ffx_evidence::search=debug,ffx_evidence::report=info ffx-evidence search case invoice
//! ```
//!
//! Defaults to `debug` for this crate in debug builds or with the
//! `debug-logging` feature, `info` otherwise. Passwords are never logged.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(any(debug_assertions, feature = "debug-logging")) {
            EnvFilter::new("ffx_evidence=debug")
        } else {
            EnvFilter::new("ffx_evidence=info")
        }
    })
}

/// Initialize the logging/tracing system
///
/// Logs go to stderr so report paths printed on stdout stay scriptable.
/// Calling it again is a no-op.
pub fn init() {
    let subscriber = tracing_subscriber::registry().with(default_filter()).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with file:line and thread IDs
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ffx_evidence=trace"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info};

    #[test]
    fn test_init_twice() {
        init();
        init_verbose();
        info!("Test log message");
        debug!(key = "value", "Structured log");
    }
}
