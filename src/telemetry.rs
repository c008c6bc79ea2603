//! Tracing setup shared by integration tests and any binary embedding this crate.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global `tracing` subscriber reading `RUST_LOG`, defaulting to `info`
/// for this crate and `warn` for dependencies.
///
/// Safe to call more than once (e.g. from several integration test files); later
/// calls are silently ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,citation_discovery_core=info"));

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
