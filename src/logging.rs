use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "GRADEBOOKD_LOG";
const DEFAULT_FILTER: &str = "gradebookd=warn";

/// Logs go to stderr; stdout carries the response stream.
///
/// `GRADEBOOKD_LOG` wins over `RUST_LOG`; with neither set only warnings
/// from this crate are shown.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(())
}
