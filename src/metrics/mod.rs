use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

lazy_static! {
    /// Read events consumed, segmented by outcome (ok/malformed/handler_error).
    pub static ref READ_EVENTS_CONSUMED: IntCounterVec = register_int_counter_vec!(
        "read_events_consumed_total",
        "Read events consumed segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register read_events_consumed_total");

    /// Size of each consumed read-event batch.
    pub static ref READ_EVENT_BATCH_SIZE: HistogramVec = register_histogram_vec!(
        "read_event_batch_size",
        "Number of messages folded into one counter write",
        &["topic"]
    )
    .expect("failed to register read_event_batch_size");

    /// Cron job executions segmented by job name and result.
    pub static ref CRON_JOB_EXECUTIONS: IntCounterVec = register_int_counter_vec!(
        "cron_job_executions_total",
        "Cron job executions segmented by job and result",
        &["job", "result"]
    )
    .expect("failed to register cron_job_executions_total");

    /// Cron job execution duration in seconds.
    pub static ref CRON_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cron_job_duration_seconds",
        "Cron job execution duration",
        &["job"]
    )
    .expect("failed to register cron_job_duration_seconds");

    /// Ranking cache events (local_hit/remote_hit/force_local).
    pub static ref RANKING_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "ranking_cache_events_total",
        "Ranking cache reads segmented by tier outcome",
        &["event"]
    )
    .expect("failed to register ranking_cache_events_total");

    /// Article cache events (hit/miss/error) by cache kind.
    pub static ref ARTICLE_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "article_cache_events_total",
        "Article cache events segmented by cache and outcome",
        &["cache", "event"]
    )
    .expect("failed to register article_cache_events_total");
}
