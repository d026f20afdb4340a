//! Tracing subscriber setup.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CliError, CliResult};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `filter` when set. `json` selects one JSON object
/// per event instead of the compact human format.
pub fn init_logging(filter: &str, json: bool) -> CliResult<()> {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| CliError::Config(format!("invalid log filter '{filter}': {e}")))?;

    let registry = tracing_subscriber::registry().with(filter_layer);

    let result = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .flatten_event(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };
    result.map_err(|e| CliError::Config(format!("logging already initialized: {e}")))?;

    tracing::debug!(filter = %filter, json, "Logging initialized");
    Ok(())
}
