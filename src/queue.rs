//! The durable work queue for generation requests.
//!
//! [`ArtQueue`] is a typed layer over pgmq: enqueue appends a request to
//! the persistent pending set, lease hands one request to exactly one
//! consumer under a visibility timeout, ack removes it, fail either makes
//! it immediately re-leasable or archives it once attempts are exhausted.
//! The queue is the single source of truth for what work remains; workers
//! hold no independent pending state. Ordering is approximately FIFO
//! (pgmq read order), not strictly ordered.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{error, warn};

use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::{ArtRequest, JobId, QueueCounts};
use crate::telemetry::metrics;

/// Name of the pgmq queue backing the pipeline. Compile-time constant —
/// it is interpolated into the counts query.
pub const QUEUE_NAME: &str = "artwork";

/// Notification channel fired on every enqueue so workers wake without
/// waiting out a poll interval.
pub const NOTIFY_CHANNEL: &str = "artwork_ready";

/// Temporary exclusive claim on a queued request during processing.
///
/// Held by exactly one worker until acked, failed, or the visibility
/// timeout expires (after which the item is simply re-leased — duplicate
/// generation work for that item is the accepted tradeoff).
#[derive(Debug)]
pub struct Lease {
    pub job_id: JobId,
    /// 1-based attempt number (pgmq read count).
    pub attempt: i32,
    pub request: ArtRequest,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Seconds a leased message stays invisible to other consumers.
    pub visibility_timeout_secs: i32,
    /// Attempts before a message is archived as terminally failed.
    pub max_attempts: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: 60,
            max_attempts: 3,
        }
    }
}

pub struct ArtQueue {
    db: Arc<Db>,
    config: QueueConfig,
}

impl ArtQueue {
    pub fn new(db: Arc<Db>, config: QueueConfig) -> Self {
        Self { db, config }
    }

    /// Create the backing pgmq queue (idempotent). Call once at startup.
    pub async fn ensure_created(&self) -> Result<()> {
        self.db.create_queue(QUEUE_NAME).await
    }

    pub fn db(&self) -> &Arc<Db> {
        &self.db
    }

    /// Append a validated request to the pending set. Atomic: the send
    /// and the worker wake-up NOTIFY commit together or not at all.
    pub async fn enqueue(&self, request: &ArtRequest) -> Result<JobId> {
        let payload = serde_json::to_value(request)
            .map_err(|e| Error::Other(format!("failed to encode request: {e}")))?;

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(unavailable)?;

        let msg_id: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
            .bind(QUEUE_NAME)
            .bind(&payload)
            .bind(0i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable)?;

        // NOTIFY is transactional — only fires on commit.
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(&request.satellite_name)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;

        metrics::jobs_submitted().add(
            1,
            &[KeyValue::new("satellite", request.satellite_name.clone())],
        );

        Ok(JobId(msg_id.0))
    }

    /// Hand the next pending request to this consumer, or None if the
    /// queue is empty. The item stays invisible to other leases until
    /// acked, failed, or the visibility timeout expires.
    pub async fn lease(&self) -> Result<Option<Lease>> {
        loop {
            let msg = self
                .db
                .read_from_queue(QUEUE_NAME, self.config.visibility_timeout_secs)
                .await?;

            let Some(msg) = msg else {
                return Ok(None);
            };

            match serde_json::from_value::<ArtRequest>(msg.message.clone()) {
                Ok(request) => {
                    return Ok(Some(Lease {
                        job_id: JobId(msg.msg_id),
                        attempt: msg.read_ct,
                        request,
                    }));
                }
                Err(e) => {
                    // A payload this process cannot decode will never
                    // succeed; archive it and move on to the next message
                    // rather than making valid work behind it wait.
                    error!(msg_id = msg.msg_id, "undecodable queue payload: {e}");
                    self.db.archive_message(QUEUE_NAME, msg.msg_id).await?;
                }
            }
        }
    }

    /// Permanently remove an item after successful processing. Idempotent
    /// at the SQL level — archiving a message that is already gone is a
    /// harmless no-op.
    pub async fn ack(&self, lease: &Lease) -> Result<()> {
        self.db.archive_message(QUEUE_NAME, lease.job_id.0).await
    }

    /// Record a failed attempt. Retryable attempts become immediately
    /// visible again; once attempts are exhausted the message is archived
    /// as terminally failed.
    pub async fn fail(&self, lease: &Lease, reason: &str) -> Result<()> {
        if lease.attempt >= self.config.max_attempts {
            error!(
                job_id = %lease.job_id,
                attempt = lease.attempt,
                max_attempts = self.config.max_attempts,
                reason,
                "retries exhausted, archiving as dead"
            );
            metrics::jobs_dead().add(1, &[]);
            self.db.archive_message(QUEUE_NAME, lease.job_id.0).await
        } else {
            warn!(
                job_id = %lease.job_id,
                attempt = lease.attempt,
                reason,
                "attempt failed, releasing for retry"
            );
            self.db
                .set_message_vt(QUEUE_NAME, lease.job_id.0, 0)
                .await
        }
    }

    /// Best-effort waiting/active snapshot.
    pub async fn counts(&self) -> Result<QueueCounts> {
        self.db.queue_counts(QUEUE_NAME).await
    }
}

fn unavailable(e: sqlx::Error) -> Error {
    Error::QueueUnavailable(e.to_string())
}
