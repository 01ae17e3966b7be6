use anyhow::{bail, Context};
use boxoffice_core::{Clock, SeatService, SystemClock};
use boxoffice_store::{app_config::Config, DbClient, PostgresSeatRepository};
use boxoffice_worker::run_expiry_sweeper;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "boxoffice_worker=info,boxoffice_store=info,boxoffice_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    if config.sweeper.interval_seconds == 0 {
        bail!("sweeper.interval_seconds must be greater than zero");
    }

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repo = Arc::new(PostgresSeatRepository::with_clock(db.pool.clone(), clock.clone()));
    let service = SeatService::new(repo);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(run_expiry_sweeper(
        service,
        clock,
        config.sweeper.interval(),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    // Receiver lives in the sweeper task until it exits
    let _ = shutdown_tx.send(true);
    sweeper.await.context("Sweeper task panicked")?;

    Ok(())
}
