//! Logging setup.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "slashstep_server=debug,sqlx=warn";

/// Install the global JSON `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter. Safe to call more than once; later
/// calls leave the first subscriber in place and return `false`.
pub fn init_tracing() -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .json()
        .try_init();

    match installed {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(error = %err, "Tracing subscriber already installed");
            false
        }
    }
}
