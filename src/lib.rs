//! # starforge
//!
//! Asynchronous artwork-generation pipeline for satellite signature images.
//!
//! A signature image (derived from a satellite's orbital velocity vector)
//! is enqueued onto a durable pgmq-backed queue, a bounded worker pool
//! proxies it to the slow external generation backend, the result lands in
//! object storage plus an `artworks` row, and connected WebSocket clients
//! are notified the moment it is ready.

pub mod api;
pub mod backend;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod model;
pub mod queue;
pub mod storage;
pub mod telemetry;
pub mod worker;
