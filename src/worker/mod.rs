//! Worker pool: leases queued requests and runs the generation pipeline.
//!
//! A single dispatcher loop listens for enqueue notifications (with a
//! poll-interval fallback) and hands each leased request to a spawned
//! processing task. An atomic in-flight counter caps simultaneous
//! generation calls at `max_concurrent`, since the backend is GPU-bound.
//!
//! Per-request pipeline: backend generate → object-storage put → artwork
//! row insert → completion broadcast → ack. Any failure surfaces to the
//! queue's bounded retry policy; no partial artwork is ever persisted, and
//! one request's failure never stops the pool. Processing is at-least-once:
//! an expired lease is simply re-leased, which can duplicate generation
//! work for that item.
//!
//! The object upload and the metadata insert are not one transaction — if
//! the insert fails after a successful upload, the object is orphaned.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::backend::GenerationBackend;
use crate::broadcast::{Broadcaster, publish_queue_update};
use crate::db::artworks::NewArtwork;
use crate::error::Result;
use crate::model::Artwork;
use crate::queue::{ArtQueue, Lease, NOTIFY_CHANNEL};
use crate::storage::ArtStore;
use crate::telemetry::metrics;
use crate::telemetry::work::{record_state_transition, start_job_span};

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Simultaneous in-flight generation calls.
    pub max_concurrent: usize,
    /// Poll interval fallback when no NOTIFY arrives.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// The worker pool: dispatch loop plus per-request processing tasks.
pub struct WorkerPool<B: GenerationBackend> {
    queue: Arc<ArtQueue>,
    backend: Arc<B>,
    store: ArtStore,
    broadcaster: Arc<Broadcaster>,
    config: WorkerConfig,
    shutdown: Arc<Notify>,
    in_flight: Arc<AtomicUsize>,
    slot_freed: Arc<Notify>,
}

impl<B: GenerationBackend> WorkerPool<B> {
    pub fn new(
        queue: Arc<ArtQueue>,
        backend: Arc<B>,
        store: ArtStore,
        broadcaster: Arc<Broadcaster>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            backend,
            store,
            broadcaster,
            config,
            shutdown: Arc::new(Notify::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            slot_freed: Arc::new(Notify::new()),
        }
    }

    /// Handle that lets another task signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Run the dispatch loop until shutdown. In-flight generation calls
    /// are not cancelled mid-flight; they finish on their own tasks.
    pub async fn run(&self) -> Result<()> {
        let mut listener =
            sqlx::postgres::PgListener::connect_with(self.queue.db().pool()).await?;
        listener.listen(NOTIFY_CHANNEL).await?;

        info!(
            max_concurrent = self.config.max_concurrent,
            "worker pool started, listening for work"
        );

        loop {
            if let Err(e) = self.dispatch_available().await {
                error!("dispatch error: {e}");
            }

            tokio::select! {
                _ = self.shutdown.notified() => {
                    let in_flight = self.in_flight.load(Ordering::Relaxed);
                    info!(in_flight, "worker pool shutting down");
                    return Ok(());
                }
                notif = listener.recv() => {
                    match notif {
                        Ok(n) => info!(satellite = n.payload(), "notified of new work"),
                        Err(e) => warn!("listener error: {e}, falling back to poll"),
                    }
                }
                _ = self.slot_freed.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Lease and spawn processing tasks while capacity remains and the
    /// queue has visible work.
    async fn dispatch_available(&self) -> Result<()> {
        loop {
            if self.in_flight.load(Ordering::Relaxed) >= self.config.max_concurrent {
                return Ok(());
            }

            let Some(lease) = self.queue.lease().await? else {
                return Ok(());
            };

            self.in_flight.fetch_add(1, Ordering::Relaxed);

            // The item just went active; let subscribers see it move.
            if let Err(e) = publish_queue_update(&self.queue, &self.broadcaster).await {
                warn!("queue update publish failed: {e}");
            }

            let queue = Arc::clone(&self.queue);
            let backend = Arc::clone(&self.backend);
            let store = self.store.clone();
            let broadcaster = Arc::clone(&self.broadcaster);
            let in_flight = Arc::clone(&self.in_flight);
            let slot_freed = Arc::clone(&self.slot_freed);

            tokio::spawn(async move {
                process_lease(&queue, backend.as_ref(), &store, &broadcaster, lease).await;
                in_flight.fetch_sub(1, Ordering::Relaxed);
                slot_freed.notify_one();
            });
        }
    }
}

/// Run one leased request through the full pipeline and retire it.
async fn process_lease<B: GenerationBackend>(
    queue: &ArtQueue,
    backend: &B,
    store: &ArtStore,
    broadcaster: &Broadcaster,
    lease: Lease,
) {
    let span = start_job_span(lease.job_id, &lease.request.satellite_name, lease.attempt);

    async {
        record_state_transition(&tracing::Span::current(), "waiting", "active");
        let started = Instant::now();

        let result = generate_and_persist(queue, backend, store, &lease).await;
        let duration_ms = started.elapsed().as_millis() as f64;
        metrics::generation_duration_ms().record(duration_ms, &[]);

        match result {
            Ok(artwork) => {
                record_state_transition(&tracing::Span::current(), "active", "completed");
                info!(job_id = %lease.job_id, artwork_id = %artwork.id, duration_ms, "job completed");
                metrics::jobs_processed().add(1, &[KeyValue::new("outcome", "completed")]);

                broadcaster.publish_artwork_completed(&artwork).await;
                if let Err(e) = queue.ack(&lease).await {
                    // The lease will expire and the item will be processed
                    // again — duplicate artwork is the accepted outcome here.
                    error!(job_id = %lease.job_id, "ack failed: {e}");
                }
            }
            Err(e) => {
                record_state_transition(&tracing::Span::current(), "active", "failed");
                error!(
                    job_id = %lease.job_id,
                    attempt = lease.attempt,
                    transient = e.is_transient(),
                    "job failed: {e}"
                );
                metrics::jobs_processed().add(1, &[KeyValue::new("outcome", "failed")]);

                if let Err(fail_err) = queue.fail(&lease, &e.to_string()).await {
                    error!(job_id = %lease.job_id, "fail recording failed: {fail_err}");
                }
            }
        }

        // Win or lose, subscribers' queue view stays current.
        if let Err(e) = publish_queue_update(queue, broadcaster).await {
            warn!("queue update publish failed: {e}");
        }
    }
    .instrument(span)
    .await
}

/// The success path: backend call, object upload, metadata insert.
/// Returns the persisted artwork; any error leaves no artwork row behind.
async fn generate_and_persist<B: GenerationBackend>(
    queue: &ArtQueue,
    backend: &B,
    store: &ArtStore,
    lease: &Lease,
) -> Result<Artwork> {
    let request = &lease.request;

    let generated = backend
        .generate(
            &request.prompt,
            &request.negative_prompt,
            &request.signature_png,
        )
        .await?;

    let object_name = format!("{}.png", Uuid::new_v4());
    store.put_png(&object_name, generated).await?;
    let image_url = store.public_url(&object_name);

    queue
        .db()
        .insert_artwork(NewArtwork {
            name: request.image_name.clone(),
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            satellite_name: request.satellite_name.clone(),
            image_url,
        })
        .await
        .inspect_err(|_| {
            // Upload succeeded but the row didn't land: the object is now
            // orphaned. No reconciliation job exists; leave a trail.
            error!(object_name, "metadata insert failed after upload, object orphaned");
        })
}
