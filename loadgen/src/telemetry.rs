use std::io::IsTerminal as _;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so the run report on stdout stays machine readable.
///
/// Defaults to INFO, DEBUG with `verbose`; `RUST_LOG` overrides both.
pub fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let directive = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
    .into();

    tracing_subscriber::fmt()
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(directive)
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(anyhow::Error::msg)?;

    tracing::debug!("tracing is set up");
    Ok(())
}
