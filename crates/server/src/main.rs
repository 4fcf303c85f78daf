mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use outreach_core::config::{AppConfig, LoadOptions};
use outreach_sheets::LeadRepository;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

fn init_logging(config: &AppConfig) {
    use outreach_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(app.store.clone(), app.layout.clone()),
    )
    .await?;

    let sweeper = app.config.queue.reclaim_after_secs.map(|reclaim_after_secs| {
        spawn_reclaim_sweep(
            app.repository.clone(),
            Duration::from_secs(app.config.queue.reclaim_interval_secs),
            reclaim_after_secs,
        )
    });

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let telegram = app.telegram.clone();
    let runner = app.runner;
    let mut runner_task = tokio::spawn(async move { runner.start().await });

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        reclaim_enabled = sweeper.is_some(),
        transcription_enabled = app.transcription_enabled,
        "outreach-server started"
    );

    tokio::select! {
        joined = &mut runner_task => {
            if let Some(sweeper) = &sweeper {
                sweeper.abort();
            }
            return joined?;
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "outreach-server stopping"
    );

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    telegram.close().await;

    match tokio::time::timeout(grace, &mut runner_task).await {
        Ok(joined) => joined??,
        Err(_) => {
            warn!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "chat runner did not drain within the grace period; aborting"
            );
            runner_task.abort();
        }
    }

    Ok(())
}

/// Periodically returns abandoned claims to the queue.
fn spawn_reclaim_sweep(
    repository: Arc<dyn LeadRepository>,
    every: Duration,
    reclaim_after_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let correlation_id = Uuid::new_v4().to_string();

            match repository.reclaim_stale(Utc::now()).await {
                Ok(rows) if rows.is_empty() => {}
                Ok(rows) => info!(
                    event_name = "queue.reclaim.completed",
                    correlation_id = %correlation_id,
                    reclaimed = rows.len(),
                    reclaim_after_secs,
                    rows = ?rows,
                    "stale claims returned to the queue"
                ),
                Err(error) => warn!(
                    event_name = "queue.reclaim.failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "reclaim sweep failed; retrying on next tick"
                ),
            }
        }
    })
}
