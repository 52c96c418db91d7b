//! Job execution span helpers.
//!
//! Provides span creation and state-transition recording for requests
//! flowing through the worker pool.

use tracing::Span;

use crate::model::JobId;

/// Start a span for one processing attempt.
///
/// The `job.state` field is declared empty and can be updated via
/// [`record_state_transition`].
pub fn start_job_span(job_id: JobId, satellite: &str, attempt: i32) -> Span {
    tracing::info_span!(
        "job.process",
        "job.id" = %job_id,
        "job.satellite" = satellite,
        "job.attempt" = attempt,
        "job.state" = tracing::field::Empty,
    )
}

/// Record a state transition event on the given span.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
