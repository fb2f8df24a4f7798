/// Article Service Library
///
/// Back-end for the article platform: draft/published authoring, per-entity
/// engagement counters fed synchronously and through a Kafka read-event
/// pipeline, a DB-leased cron scheduler, and the periodic top-N ranking
/// published through a two-tier cache.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers and the response envelope
/// - `models`: domain types
/// - `services`: business logic layer
/// - `db`: sqlx repositories and schema bootstrap
/// - `cache`: Redis caches (counters, articles, ranking)
/// - `kafka` / `consumers`: read-event producer and batched consumer
/// - `jobs`: executor registry and the preemptive scheduler loop
/// - `middleware`: gateway identity extraction
/// - `error`: error types and HTTP mapping
/// - `config`: configuration management
/// - `metrics`: prometheus collectors
pub mod cache;
pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod kafka;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
