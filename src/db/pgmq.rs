//! pgmq queue operations via direct SQLx.
//!
//! Calls pgmq's SQL functions: pgmq.create, pgmq.send, pgmq.read,
//! pgmq.archive, pgmq.delete, pgmq.set_vt. Queue counts come from one
//! SELECT over the queue's backing table.

use crate::error::Result;
use crate::model::QueueCounts;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

/// A message read from a pgmq queue.
#[derive(Debug, Clone)]
pub struct PgmqMessage {
    pub msg_id: i64,
    /// How many times this message has been read. First lease reads 1.
    pub read_ct: i32,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    pub vt: chrono::DateTime<chrono::Utc>,
    pub message: serde_json::Value,
}

impl super::Db {
    /// Create a pgmq queue (idempotent).
    pub async fn create_queue(&self, queue_name: &str) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue_name)
            .execute(&self.pool)
            .await?;
        record_operation(queue_name, "create");
        Ok(())
    }

    /// Send a message to a pgmq queue. Returns the message ID.
    /// delay_seconds: 0 for immediate, >0 for delayed delivery.
    pub async fn send_to_queue(
        &self,
        queue_name: &str,
        payload: &serde_json::Value,
        delay_seconds: i32,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
            .bind(queue_name)
            .bind(payload)
            .bind(delay_seconds)
            .fetch_one(&self.pool)
            .await?;
        record_operation(queue_name, "send");
        Ok(row.0)
    }

    /// Read the next message from a queue (visibility timeout in seconds).
    /// The message becomes invisible to other readers until the timeout
    /// expires or it is archived/deleted. Returns None if queue is empty.
    pub async fn read_from_queue(
        &self,
        queue_name: &str,
        vt_seconds: i32,
    ) -> Result<Option<PgmqMessage>> {
        let row = sqlx::query_as::<
            _,
            (
                i64,
                i32,
                chrono::DateTime<chrono::Utc>,
                chrono::DateTime<chrono::Utc>,
                serde_json::Value,
            ),
        >(
            "SELECT msg_id, read_ct, enqueued_at, vt, message FROM pgmq.read($1, $2, 1)"
        )
        .bind(queue_name)
        .bind(vt_seconds)
        .fetch_optional(&self.pool)
        .await?;

        let msg = row.map(|(msg_id, read_ct, enqueued_at, vt, message)| PgmqMessage {
            msg_id,
            read_ct,
            enqueued_at,
            vt,
            message,
        });

        record_operation(
            queue_name,
            if msg.is_some() { "read" } else { "read_empty" },
        );

        Ok(msg)
    }

    /// Archive a message (moves to archive table, preserves for audit).
    /// Archiving a message that is already gone is a harmless no-op.
    pub async fn archive_message(&self, queue_name: &str, msg_id: i64) -> Result<()> {
        sqlx::query("SELECT pgmq.archive($1, $2)")
            .bind(queue_name)
            .bind(msg_id)
            .execute(&self.pool)
            .await?;
        record_operation(queue_name, "archive");
        Ok(())
    }

    /// Delete a message permanently.
    pub async fn delete_message(&self, queue_name: &str, msg_id: i64) -> Result<()> {
        sqlx::query("SELECT pgmq.delete($1, $2)")
            .bind(queue_name)
            .bind(msg_id)
            .execute(&self.pool)
            .await?;
        record_operation(queue_name, "delete");
        Ok(())
    }

    /// Reset a message's visibility timeout to `vt_offset` seconds from
    /// now. With an offset of 0 the message is immediately re-leasable.
    pub async fn set_message_vt(
        &self,
        queue_name: &str,
        msg_id: i64,
        vt_offset: i32,
    ) -> Result<()> {
        sqlx::query("SELECT pgmq.set_vt($1, $2, $3)")
            .bind(queue_name)
            .bind(msg_id)
            .bind(vt_offset)
            .execute(&self.pool)
            .await?;
        record_operation(queue_name, "set_vt");
        Ok(())
    }

    /// Snapshot of queue membership: messages currently visible are
    /// waiting, leased messages (visibility timeout in the future) are
    /// active. May be momentarily stale under concurrent mutation.
    pub async fn queue_counts(&self, queue_name: &str) -> Result<QueueCounts> {
        // pgmq stores each queue in its own table; table names cannot be
        // bound as parameters. Queue names here are compile-time constants.
        let sql = format!(
            "SELECT count(*) FILTER (WHERE vt <= clock_timestamp()),
                    count(*) FILTER (WHERE vt > clock_timestamp())
             FROM pgmq.q_{queue_name}"
        );
        let (waiting, active): (i64, i64) =
            sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        record_operation(queue_name, "counts");
        Ok(QueueCounts { waiting, active })
    }
}

fn record_operation(queue_name: &str, operation: &'static str) {
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("queue", queue_name.to_string()),
            KeyValue::new("operation", operation),
        ],
    );
}
