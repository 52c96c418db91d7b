//! Metric instrument factories for starforge.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"starforge"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for starforge instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("starforge")
}

/// Counter: generation requests accepted onto the queue.
/// Labels: `satellite`.
pub fn jobs_submitted() -> Counter<u64> {
    meter()
        .u64_counter("starforge.jobs.submitted")
        .with_description("Number of generation requests enqueued")
        .build()
}

/// Counter: queue-level operations (send, read, archive, delete, set_vt,
/// counts). Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("starforge.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: processing attempts finished by the worker pool.
/// Labels: `outcome` ("completed" | "failed").
pub fn jobs_processed() -> Counter<u64> {
    meter()
        .u64_counter("starforge.jobs.processed")
        .with_description("Number of processing attempts finished")
        .build()
}

/// Counter: requests archived after exhausting their retry budget.
pub fn jobs_dead() -> Counter<u64> {
    meter()
        .u64_counter("starforge.jobs.dead")
        .with_description("Number of requests archived after exhausted retries")
        .build()
}

/// Counter: artwork rows written.
/// Labels: `satellite`.
pub fn artworks_created() -> Counter<u64> {
    meter()
        .u64_counter("starforge.artworks.created")
        .with_description("Number of artworks persisted")
        .build()
}

/// Counter: events fanned out to live subscribers (one increment per
/// subscriber per publish). Labels: `event`.
pub fn broadcast_events() -> Counter<u64> {
    meter()
        .u64_counter("starforge.broadcast.events")
        .with_description("Number of events delivered to live subscribers")
        .build()
}

/// Histogram: wall-clock duration of one backend generation call.
pub fn generation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("starforge.generation.duration_ms")
        .with_description("Generation backend call duration in milliseconds")
        .with_unit("ms")
        .build()
}
