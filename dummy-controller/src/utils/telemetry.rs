use std::io::IsTerminal as _;

use rama::{
    error::BoxError,
    telemetry::tracing::{
        self,
        metadata::LevelFilter,
        subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _},
    },
};

#[derive(Debug, Clone, Copy)]
pub struct TelemetryConfig {
    /// Default level, used for every target not covered by `RUST_LOG`.
    pub level: LevelFilter,
    pub pretty: bool,
}

/// Configures structured logging with runtime control via `RUST_LOG` environment variable.
///
/// The default directive comes from `LOG_LEVEL` (`--log-level`),
/// `RUST_LOG` can still be used for more fine grained directives.
pub fn init_tracing(cfg: TelemetryConfig) -> Result<(), BoxError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(cfg.level.into())
        .from_env_lossy();

    if cfg.pretty {
        tracing::subscriber::fmt()
            .pretty()
            .with_ansi(std::io::stderr().is_terminal())
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init()?;
    } else {
        tracing::subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .try_init()?;
    }

    tracing::info!(level = %cfg.level, "Tracing is set up");
    Ok(())
}
