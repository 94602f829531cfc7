use anyhow::Context;
use settlement_engine::orchestration::{BoostExpiryJob, EarningsReleaseJob};
use settlement_engine::{
    init_db, BoostExpiryProcessor, Clock, Config, EarningsLedger, Repository, SettlementError,
    SettlementScheduler, SettlementStore, SystemClock,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", SettlementError::from(e));
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("Settlement service error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("failed to initialize database at {}", config.database_path))?;

    let store: Arc<dyn SettlementStore> = Arc::new(Repository::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let processor = BoostExpiryProcessor::new(store.clone(), config.boost_expiry_policy());
    let ledger = EarningsLedger::new(store, clock.clone(), config.earnings_policy())
        .with_release_concurrency(config.earnings_release_concurrency);

    let mut scheduler = SettlementScheduler::new();
    scheduler.register(
        Arc::new(BoostExpiryJob::new(processor, clock.clone())),
        config.boost_expiry_interval,
    );
    scheduler.register(
        Arc::new(EarningsReleaseJob::new(ledger, clock)),
        config.earnings_release_interval,
    );
    scheduler.start();

    tracing::info!(
        database = %config.database_path,
        boost_expiry_interval_secs = config.boost_expiry_interval.as_secs(),
        earnings_release_interval_secs = config.earnings_release_interval.as_secs(),
        "Settlement service running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("Shutdown requested");
    scheduler.stop().await;
    Ok(())
}
