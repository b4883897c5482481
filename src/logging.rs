//! Inicialização do `tracing` para o binário.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Picks the filter: `RUST_LOG` wins, then `--verbose`, then the configured one.
pub fn filter_for(verbose: bool, configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = if verbose { "debug" } else { configured };
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Installs the global subscriber. Logs go to stderr so they never mix with
/// the command output on stdout.
pub fn init(verbose: bool, configured: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, configured))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}
