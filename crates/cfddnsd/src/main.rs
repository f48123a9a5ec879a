// # cfddnsd - Cloudflare dynamic DNS daemon
//
// Thin wiring layer over cfddns-core:
//
// 1. Parse flags and environment into an `AgentConfig` and `Credentials`
// 2. Initialize logging and the runtime
// 3. Resolve the zone once, build the probe, resolver and record store
// 4. Run the scheduler until SIGINT/SIGTERM
//
// All reconciliation, retry and backoff logic lives in cfddns-core.
//
// ## Example
//
// ```bash
// export CF_API_TOKEN=your_token
// cfddnsd --zone example.com --name www --ipv6 no --duration 5m
// ```

mod cli;

use anyhow::{Context, Result};
use cfddns_cloudflare::{CloudflareClient, DEFAULT_HTTP_TIMEOUT};
use cfddns_core::{
    AgentConfig, Credentials, IpVersion, Reconciler, RecordStore, ResolverMode, Scheduler,
    SchedulerEvent,
};
use cfddns_probe::UdpAddressProbe;
use cfddns_resolver::{DEFAULT_QUERY_TIMEOUT, build_resolver};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

use cli::Args;

/// Slack on top of the longest possible tick
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(5);

/// How long an in-flight tick may run after shutdown is requested
///
/// Each enabled family may walk every resolver server, then list and mutate
/// provider records, each step under its own timeout.
fn shutdown_grace(config: &AgentConfig) -> Duration {
    let resolver_attempts = match (&config.resolver, config.fast_path) {
        (_, false) => 0,
        (ResolverMode::System, true) => 1,
        (ResolverMode::Explicit(servers), true) => servers.len() as u32,
    };
    let families = IpVersion::ALL
        .iter()
        .filter(|v| config.family(**v).is_enabled())
        .count() as u32;

    let per_family = DEFAULT_QUERY_TIMEOUT * resolver_attempts + DEFAULT_HTTP_TIMEOUT * 2;
    per_family * families + SHUTDOWN_MARGIN
}

/// Everything `run` needs once startup succeeded
struct Daemon {
    scheduler: Scheduler,
    events: mpsc::Receiver<SchedulerEvent>,
    signals: ShutdownSignals,
    grace: Duration,
}

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (config, credentials) = match args.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // RUST_LOG overrides --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting cfddnsd {}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let daemon = match start(config, credentials).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return DaemonExitCode::ConfigError;
            }
        };

        match run(daemon).await {
            Ok(()) => DaemonExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DaemonExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Build every component; any failure here is a startup failure
async fn start(
    config: AgentConfig,
    credentials: Credentials,
) -> Result<Daemon> {
    let signals = ShutdownSignals::install()?;

    let client = Arc::new(CloudflareClient::new(credentials)?);
    info!("Using {} as the record provider", client.provider_name());
    let zone = client
        .resolve_zone(&config.zone)
        .await
        .with_context(|| format!("zone lookup for {}", config.zone))?;
    info!("Zone {} has id {}", zone.name(), zone.id());

    let mut reconciler = Reconciler::new(client);
    if config.fast_path {
        let resolver = build_resolver(&config.resolver)?;
        info!("Checking DNS with {} before updating", resolver.describe());
        reconciler = reconciler.with_resolver(resolver);
    }

    info!(
        "Managing {}.{} every {:?} (ipv4: {:?}, ipv6: {:?})",
        config.hostname, config.zone, config.interval, config.ipv4, config.ipv6
    );

    let grace = shutdown_grace(&config);
    debug!("Shutdown grace is {:?}", grace);

    let probe = Arc::new(UdpAddressProbe::new());
    let (scheduler, events) = Scheduler::new(config, zone, probe, reconciler)?;

    Ok(Daemon {
        scheduler,
        events,
        signals,
        grace,
    })
}

/// Run the scheduler until a shutdown signal arrives
async fn run(daemon: Daemon) -> Result<()> {
    let Daemon {
        scheduler,
        events,
        mut signals,
        grace,
    } = daemon;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(log_events(events));
    let mut handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    tokio::select! {
        finished = &mut handle => {
            finished.context("scheduler task failed")??;
            anyhow::bail!("scheduler stopped without a shutdown signal");
        }
        signal = signals.recv() => {
            info!("Received shutdown signal: {}", signal);
        }
    }

    // The receiver only goes away once the scheduler has already stopped
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(grace, handle).await {
        Ok(finished) => {
            finished.context("scheduler task failed")??;
            info!("Shutdown complete");
            Ok(())
        }
        Err(_) => Err(anyhow::anyhow!("Shutdown timeout after {:?}", grace)),
    }
}

/// Drain scheduler events into the debug log
async fn log_events(mut events: mpsc::Receiver<SchedulerEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "scheduler event");
    }
}

/// SIGTERM and SIGINT listeners, installed before any network I/O
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm =
            signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
        let sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
        Ok(Self { sigterm, sigint })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Ctrl-C listener for non-Unix platforms
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending::<&'static str>().await
            }
        }
    }
}
