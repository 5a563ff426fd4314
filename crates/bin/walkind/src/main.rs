//! # walkind — walk-in queue daemon
//!
//! Composition root that wires the storage adapter and queue services
//! together and runs the late-customer sweeper.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the repository, event bus and [`QueueService`]
//! - Log every published queue event
//! - Sweep late customers on a fixed interval until Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use walkin_adapter_storage_sqlite_sqlx::SqliteQueueRepository;
use walkin_app::event_bus::InProcessEventBus;
use walkin_app::ports::{Clock, EventPublisher, QueueRepository, SystemClock};
use walkin_app::services::QueueService;
use walkin_domain::event::QueueEvent;
use walkin_domain::id::ActorId;

/// Actor recorded on events produced by the background sweeper.
const SCHEDULER_ACTOR: &str = "walkind-scheduler";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.logging.filter)?)
        .with(fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "walkind starting");

    // Database
    let db = walkin_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;

    // Repositories
    let queue_repo = SqliteQueueRepository::new(db.pool().clone());

    // Event bus
    let event_bus = Arc::new(InProcessEventBus::new(256));
    let event_logger = spawn_event_logger(event_bus.subscribe());

    // Services
    let clock = SystemClock;
    let service = QueueService::with_options(
        queue_repo,
        Arc::clone(&event_bus),
        clock,
        config.service_options(),
    );

    let actor = ActorId::new(SCHEDULER_ACTOR);
    let mut ticker = tokio::time::interval(config.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        interval_secs = config.sweep_interval().as_secs(),
        "late-customer sweeper running, press Ctrl+C to stop"
    );
    loop {
        tokio::select! {
            _ = ticker.tick() => sweep(&service, &clock, &actor).await,
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    tracing::info!("shutdown signal received");
    event_logger.abort();
    db.pool().close().await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn sweep<R, P, C>(service: &QueueService<R, P, C>, clock: &C, actor: &ActorId)
where
    R: QueueRepository,
    P: EventPublisher,
    C: Clock,
{
    let today = clock.now().date_naive();
    match service.sweep_late_customers(today, actor).await {
        Ok(report) if report.customers_evicted > 0 || report.failures > 0 => {
            tracing::info!(
                queues = report.queues_checked,
                evicted = report.customers_evicted,
                failures = report.failures,
                "late-customer sweep finished"
            );
        }
        Ok(report) => {
            tracing::debug!(queues = report.queues_checked, "nothing to sweep");
        }
        Err(err) => tracing::error!(%err, "late-customer sweep failed"),
    }
}

/// Log every queue event as the audit trail.
fn spawn_event_logger(mut events: broadcast::Receiver<QueueEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(
                    event_type = %event.event_type,
                    queue_id = %event.queue_id,
                    entry_id = ?event.entry_id.map(|id| id.to_string()),
                    actor = %event.actor,
                    data = %event.data,
                    "queue event"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event logger lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
