//! Logging setup for hosts embedding the memory store

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `forge_memory` logs at `info`, or
/// `debug` when `verbose`. Returns `false` if a subscriber was already
/// installed.
pub fn init_logging(verbose: bool) -> bool {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("forge_memory={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let _ = init_logging(true);
        assert!(!init_logging(false));
    }
}
