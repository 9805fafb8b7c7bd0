// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use thesisd::{
    auth::JwtKeys,
    buffer::LiveBuffer,
    config::{ConfigOverrides, DaemonConfig},
    metrics::DaemonMetrics,
    rest,
    storage::Storage,
    summary,
    summary::producer::SummaryProducer,
    ws,
    ws::DeliveryRouter,
    AppContext,
};
use tracing::{info, warn};

const REAPER_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Parser)]
#[command(
    name = "thesisd",
    about = "Thesis supervision chat — session coordinator and summary worker",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP API port
    #[arg(long, env = "THESISD_PORT")]
    port: Option<u16>,

    /// WebSocket listener port
    #[arg(long, env = "THESISD_WS_PORT")]
    ws_port: Option<u16>,

    /// Data directory for config.toml
    #[arg(long, env = "THESISD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "THESISD_LOG")]
    log: Option<String>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Redis connection string (live chat buffer)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// AMQP broker URL (summary hand-off queue)
    #[arg(long, env = "AMQP_URL")]
    amqp_url: Option<String>,

    /// Summarizer gRPC endpoint
    #[arg(long, env = "SUMMARIZER_ADDR")]
    summarizer_addr: Option<String>,

    /// HS256 signing secret for access/refresh tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the session coordinator: HTTP API + WebSocket router (default
    /// when no subcommand is given).
    Serve,
    /// Run the summary worker: consume summary tasks, call the summarizer,
    /// persist message history.
    Work,
    /// Apply database migrations and exit.
    Migrate,
    /// Insert demo directory rows (faculty, program, users, thesis) for
    /// local development. Safe to re-run.
    Seed,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            ws_port: self.ws_port,
            data_dir: self.data_dir.clone(),
            log: self.log.clone(),
            database_url: self.database_url.clone(),
            redis_url: self.redis_url.clone(),
            amqp_url: self.amqp_url.clone(),
            summarizer_addr: self.summarizer_addr.clone(),
            jwt_secret: self.jwt_secret.clone(),
        }
    }
}

fn init_tracing(filter: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Arc::new(DaemonConfig::new(args.overrides()));
    init_tracing(&config.log);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Work => run_worker(config).await,
        Command::Migrate => {
            let storage = Storage::connect(&config.database_url).await?;
            storage.migrate().await?;
            info!("migrations applied");
            Ok(())
        }
        Command::Seed => {
            let storage = Storage::connect(&config.database_url).await?;
            storage.migrate().await?;
            storage.seed_demo().await?;
            Ok(())
        }
    }
}

async fn run_serve(config: Arc<DaemonConfig>) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "thesisd starting");
    info!(
        port = config.port,
        ws_port = config.ws_port,
        "config loaded"
    );

    let storage = Arc::new(Storage::connect(&config.database_url).await?);
    storage.migrate().await?;
    let buffer = Arc::new(LiveBuffer::connect(&config.redis_url).await?);

    let metrics = Arc::new(DaemonMetrics::new());
    let router = Arc::new(DeliveryRouter::new(storage.clone(), metrics.clone()));
    let producer = Arc::new(SummaryProducer::new(
        config.amqp_url.clone(),
        metrics.clone(),
    ));
    let jwt = Arc::new(JwtKeys::new(&config.jwt_secret));

    let ctx = Arc::new(AppContext {
        config: config.clone(),
        storage: storage.clone(),
        buffer,
        router,
        producer,
        jwt,
        metrics,
    });

    // ── Background loops ─────────────────────────────────────────────────
    // Recovery: republish summary tasks for sessions stuck in
    // processing_summary after a crash.
    tokio::spawn(summary::producer::run_recovery_sweep(ctx.clone()));

    // Reaper: finish waiting sessions nobody ever joined.
    if config.waiting_reap_minutes > 0 {
        let storage = storage.clone();
        let minutes = config.waiting_reap_minutes;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(REAPER_INTERVAL).await;
                match storage.reap_waiting_sessions(minutes).await {
                    Ok(n) if n > 0 => info!(reaped = n, "reaped stale waiting sessions"),
                    Ok(_) => {}
                    Err(e) => warn!(err = %e, "waiting-session reaper failed"),
                }
            }
        });
    }

    let http = tokio::spawn(rest::start_http_server(ctx.clone()));
    let websocket = tokio::spawn(ws::run(ctx.clone()));

    shutdown_signal().await;
    info!("shutdown signal received — stopping listeners");
    http.abort();
    websocket.abort();
    info!("thesisd stopped");
    Ok(())
}

async fn run_worker(config: Arc<DaemonConfig>) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "summary worker starting");
    let storage = Arc::new(Storage::connect(&config.database_url).await?);
    storage.migrate().await?;
    let metrics = Arc::new(DaemonMetrics::new());
    summary::worker::run(config, storage, metrics).await
}

/// Resolves when a shutdown signal is received.
///
/// On Unix we listen for SIGTERM *and* Ctrl-C.
/// On other platforms we listen for Ctrl-C only.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(err = %e, "failed to register SIGTERM — falling back to Ctrl-C");
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
