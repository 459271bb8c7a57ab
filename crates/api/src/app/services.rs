use std::{convert::Infallible, sync::Arc, sync::Mutex, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use thiserror::Error;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use stockroom_core::PersonId;
use stockroom_events::{EventBus, InMemoryEventBus, NotificationEvent, NotificationHub};
use stockroom_infra::{
    AppConfig, HistoryEnvelope, HistoryError, HistoryLog, InMemoryHistoryLog, ReservationEngine, StaffDirectory,
    StaffMember, StockLedger,
    projections::{TrendProjection, TrendProjectionError},
    read_model::InMemoryStore,
    seed::{SeedError, apply_seed, load_seed},
    workers::{ProjectionWorker, WorkerHandle},
};

pub type Engine = ReservationEngine<Arc<InMemoryHistoryLog>, Arc<InMemoryEventBus<HistoryEnvelope>>>;
pub type Staff = StaffDirectory<Arc<InMemoryStore<PersonId, StaffMember>>>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error("failed to read history: {0}")]
    History(#[from] HistoryError),

    #[error("failed to rebuild trends: {0}")]
    Trends(#[from] TrendProjectionError),

    #[error("failed to start trend worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub config: AppConfig,
    pub engine: Arc<Engine>,
    pub history: Arc<InMemoryHistoryLog>,
    pub trends: Arc<TrendProjection>,
    pub staff: Staff,
    trend_worker: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    /// Wire the in-memory stack: ledger, history, history bus, notification
    /// hub, engine, trend projection (rebuilt from history) and its worker.
    pub async fn build(config: AppConfig) -> Result<Self, StartupError> {
        let ledger = Arc::new(StockLedger::new());
        let history = Arc::new(InMemoryHistoryLog::new());
        let bus: Arc<InMemoryEventBus<HistoryEnvelope>> = Arc::new(InMemoryEventBus::new());
        let hub = NotificationHub::new(config.notify.buffer);

        let engine = Arc::new(ReservationEngine::new(
            ledger,
            history.clone(),
            bus.clone(),
            hub,
            config.engine.clone(),
        ));

        if let Some(path) = &config.seed_file {
            let materials = load_seed(path)?;
            apply_seed(&engine, materials).await;
        }

        // Subscribe before rebuilding so records committed in between are
        // delivered; the projection ignores anything at or below its cursor.
        let trends = Arc::new(TrendProjection::new(config.predictor.clone()));
        let subscription = bus.subscribe();
        trends.rebuild_from_scratch(history.list()?)?;

        let worker = ProjectionWorker::spawn_with("trend-projection", subscription, {
            let trends = trends.clone();
            move |envelope: HistoryEnvelope| trends.apply_envelope(&envelope).map(|_| ())
        })?;

        info!(materials = engine.ledger().len(), records = history.len(), "services ready");

        Ok(Self {
            config,
            engine,
            history,
            trends,
            staff: StaffDirectory::new(Arc::new(InMemoryStore::new())),
            trend_worker: Mutex::new(Some(worker)),
        })
    }

    pub fn hub(&self) -> &NotificationHub {
        self.engine.hub()
    }

    /// Stop background workers. Idempotent.
    pub fn shutdown(&self) {
        let worker = match self.trend_worker.lock() {
            Ok(mut w) => w.take(),
            Err(_) => None,
        };
        if let Some(w) = worker {
            info!(worker = w.name(), "stopping worker");
            w.shutdown();
        }
    }
}

/// Live notification stream for one SSE client.
///
/// The hub subscription lives inside the stream, so a client disconnect drops
/// it and unregisters the subscriber.
pub fn notification_sse(
    services: &AppServices,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>> + use<>> {
    let subscription = services.hub().subscribe();
    let stream = subscription.map(|event: NotificationEvent| Ok(to_sse(&event)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn to_sse(event: &NotificationEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        warn!(sequence = event.sequence, error = %e, "failed to serialize notification");
        "{}".to_string()
    });
    SseEvent::default()
        .event(event.kind.as_str())
        .id(event.sequence.to_string())
        .data(data)
}
