#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

use std::{num::NonZeroU64, time::Duration};

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::{self, ShutdownGuard},
    net::{address::SocketAddress, socket::Interface},
    rt::Executor,
    telemetry::tracing::{self, Instrument as _, metadata::LevelFilter},
};

use clap::Parser;

use crate::{
    config::ControllerConfig,
    server::controller::ControllerHttpServer,
    state::ControllerState,
};

pub mod config;
pub mod server;
pub mod state;
pub mod utils;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(test)]
pub mod test;

/// Configuration of the dummy controller.
///
/// Every option can also be set using the environment variable listed with it.
#[derive(Debug, Clone, Parser)]
#[command(name = "dummy-controller")]
#[command(bin_name = "dummy-controller")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// network interface to bind the controller http server to
    #[arg(
        long,
        short = 'b',
        env = "BIND",
        value_name = "INTERFACE",
        default_value = "0.0.0.0:8080"
    )]
    pub bind: Interface,

    /// time after startup before the controller reports ready
    #[arg(long, env = "READY_DELAY_MS", value_name = "MS", default_value_t = 0)]
    pub ready_delay_ms: u64,

    /// probability in [0.0, 1.0] that an action call fails
    #[arg(
        long,
        env = "FAIL_RATE",
        value_name = "PROBABILITY",
        value_parser = config::parse_probability,
        default_value_t = 0.
    )]
    pub fail_rate: f64,

    /// action calls with a (per endpoint) sequence number >= N fail
    #[arg(long, env = "FAIL_AFTER_N", value_name = "N")]
    pub fail_after_n: Option<NonZeroU64>,

    /// time after readiness before the controller enters its failing phase
    #[arg(long, env = "FAIL_AFTER_MS", value_name = "MS")]
    pub fail_after_ms: Option<u64>,

    /// duration of the failing phase, after which the cycle restarts (requires FAIL_AFTER_MS)
    #[arg(long, env = "FAIL_RECOVER_MS", value_name = "MS")]
    pub fail_recover_ms: Option<NonZeroU64>,

    /// let the liveness probe fail as well while in the failing phase
    #[arg(
        long,
        env = "FAIL_LIVENESS",
        value_parser = clap::builder::BoolishValueParser::new(),
        default_value_t = false
    )]
    pub fail_liveness: bool,

    /// seed for the FAIL_RATE rolls, for reproducible runs
    #[arg(long, env = "FAIL_SEED", value_name = "SEED")]
    pub fail_seed: Option<u64>,

    /// artificial delay applied to every action call
    #[arg(
        long,
        env = "RESPONSE_LATENCY_MS",
        value_name = "MS",
        value_parser = clap::value_parser!(u64).range(..=config::MAX_RESPONSE_LATENCY_MS),
        default_value_t = 0
    )]
    pub response_latency_ms: u64,

    /// http status code of an action acknowledgment
    #[arg(
        long,
        env = "RESPONSE_STATUS",
        value_name = "STATUS",
        value_parser = clap::value_parser!(u16).range(200..=299),
        default_value_t = 200
    )]
    pub response_status: u16,

    /// http status code of an injected failure
    #[arg(
        long,
        env = "FAILURE_STATUS",
        value_name = "STATUS",
        value_parser = clap::value_parser!(u16).range(400..=599),
        default_value_t = 500
    )]
    pub failure_status: u16,

    /// JSON document embedded as `payload` in every action acknowledgment
    #[arg(
        long,
        env = "RESPONSE_BODY",
        value_name = "JSON",
        value_parser = config::parse_json_document
    )]
    pub response_body: Option<serde_json::Value>,

    /// default log level; use RUST_LOG env for more options
    #[arg(long, env = "LOG_LEVEL", value_name = "LEVEL", default_value = "info")]
    pub log_level: LevelFilter,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    #[arg(long, value_name = "SECONDS", default_value_t = 1.)]
    /// the graceful shutdown timeout (<= 0.0 = no timeout)
    pub graceful: f64,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    utils::telemetry::init_tracing(utils::telemetry::TelemetryConfig {
        level: args.log_level,
        pretty: args.pretty,
    })?;

    let base_shutdown_signal = graceful::default_signal();
    if let Err(err) = run_with_args(base_shutdown_signal, args, None).await {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

/// Runs the dummy controller and blocks until
/// a startup error occurs or the (graceful) shutdown has been initiated.
///
/// This entry point is used by both the (binary) `main` function as well as
/// for the e2e test suite found in the test module, which uses
/// `bound_addr_tx` to learn the address of the controller http server.
async fn run_with_args<F>(
    base_shutdown_signal: F,
    args: Args,
    bound_addr_tx: Option<tokio::sync::oneshot::Sender<SocketAddress>>,
) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let config = ControllerConfig::try_from_args(&args).context("resolve controller config")?;
    let graceful_timeout = (args.graceful > 0.).then(|| Duration::from_secs_f64(args.graceful));

    let graceful = graceful::Shutdown::new(base_shutdown_signal);

    let controller_server = ControllerHttpServer::bind(args.bind, Executor::graceful(graceful.guard()))
        .await
        .context("start controller http server")?;

    let state = ControllerState::new(config).with_shutdown(graceful.guard_weak());
    tracing::info!(
        address = %controller_server.local_addr(),
        config = %state.config().to_json(),
        "dummy controller initialized"
    );

    if let Some(tx) = bound_addr_tx {
        let _ = tx.send(controller_server.local_addr());
    }

    graceful.spawn_task_fn({
        let state = state.clone();
        move |guard| run_controller_server(controller_server, state, guard)
    });

    graceful.spawn_task_fn(move |guard| server::lifecycle::report_phase_transitions(state, guard));

    let delay = match graceful_timeout {
        Some(duration) => graceful.shutdown_with_limit(duration).await?,
        None => graceful.shutdown().await,
    };

    tracing::info!("gracefully shutdown with a delay of: {delay:?}");
    Ok(())
}

async fn run_controller_server(
    server: ControllerHttpServer,
    state: ControllerState,
    _guard: ShutdownGuard,
) {
    tracing::info!("spawning controller http server...");
    server
        .serve(state)
        .instrument(tracing::debug_span!(
            "controller server lifetime",
            server.service.name = utils::env::project_name(),
            otel.kind = "server",
            network.protocol.name = "http",
        ))
        .await;
}
