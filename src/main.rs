use clap::Parser;
use kenoq::{
    api::{ApiServer, AppState},
    auth::StaticTokenAuth,
    config::KenoConfig,
    draw::{DrawEngine, EntropyDrawSource},
    ledger::{AccountId, Ledger, MemoryLedger},
    metrics::Metrics,
    SettlementPipeline,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "kenoq", about = "Keno wager settlement server", version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kenoq=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => KenoConfig::load(path)?,
        None => KenoConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    info!(
        workers = config.pool.workers,
        queue_capacity = config.pool.queue_capacity,
        submit_timeout_ms = config.pool.submit_timeout_ms,
        "starting settlement pipeline"
    );

    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let auth = Arc::new(StaticTokenAuth::new());
    if config.accounts.is_empty() {
        warn!("no accounts configured; every request will be rejected as unauthorized");
    }
    for seed in &config.accounts {
        let account = AccountId(seed.id);
        auth.register(seed.token.clone(), account);
        if seed.balance > rust_decimal::Decimal::ZERO {
            ledger.deposit(account, seed.balance).await?;
        }
        info!(%account, %seed.balance, "seeded account");
    }

    let engine = Arc::new(DrawEngine::new(
        Arc::new(EntropyDrawSource),
        config.game.minimum_stakes.clone(),
    ));
    let metrics = Arc::new(Metrics::new());
    let pipeline = SettlementPipeline::start(&config.pool, engine, ledger.clone(), metrics.clone());

    let state = Arc::new(AppState {
        admission: pipeline.admission(),
        ledger,
        auth,
        metrics,
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: Instant::now(),
    });

    ApiServer::new(config.server.clone(), state).run().await
}
