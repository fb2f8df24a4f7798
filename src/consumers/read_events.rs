use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::Offset;
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::kafka::ReadEvent;
use crate::metrics;
use crate::services::InteractiveService;

/// Read-event consumer configuration
#[derive(Debug, Clone)]
pub struct ReadEventsConsumerConfig {
    /// Kafka brokers (comma-separated)
    pub brokers: String,
    /// Consumer group shared by every replica
    pub group_id: String,
    pub topic: String,
    /// Max messages folded into one counter write
    pub batch_size: usize,
    /// Max time to wait for a batch to fill
    pub batch_timeout: Duration,
}

impl Default for ReadEventsConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "interactive".to_string(),
            topic: crate::kafka::TOPIC_READ_EVENT.to_string(),
            batch_size: 100,
            batch_timeout: Duration::from_secs(1),
        }
    }
}

/// Batched read-event consumer.
///
/// Collects up to `batch_size` events (or whatever arrives within
/// `batch_timeout`) and applies them as one aggregate counter write.
/// Offset stores are manual: the window's offsets are stored and committed
/// only after the write succeeds, and a failed window seeks back to its
/// first offset so the bus redelivers it; duplicates are acceptable for a
/// soft metric. Malformed payloads are logged and their offsets travel with
/// the window instead of wedging the partition.
pub struct ReadEventsConsumer {
    consumer: StreamConsumer,
    interactive: Arc<InteractiveService>,
    config: ReadEventsConsumerConfig,
}

impl ReadEventsConsumer {
    pub fn new(
        config: ReadEventsConsumerConfig,
        interactive: Arc<InteractiveService>,
    ) -> Result<Self> {
        info!("Initializing read-event consumer with config: {:?}", config);

        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &config.group_id)
            .set("bootstrap.servers", &config.brokers)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "3000")
            .set("max.poll.interval.ms", "300000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| {
                error!("Failed to create Kafka consumer: {}", e);
                AppError::from(e)
            })?;

        consumer.subscribe(&[&config.topic]).map_err(|e| {
            error!("Failed to subscribe to topic {}: {}", config.topic, e);
            AppError::from(e)
        })?;

        info!("Read-event consumer subscribed to topic: {}", config.topic);

        Ok(Self {
            consumer,
            interactive,
            config,
        })
    }

    /// Run the consumer loop until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting read-event consumer loop");

        loop {
            let first = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Read-event consumer received shutdown signal");
                    break;
                }
                msg = self.consumer.recv() => msg,
            };

            let mut events: Vec<ReadEvent> = Vec::with_capacity(self.config.batch_size);
            let mut window: Vec<(String, i32, i64)> = Vec::with_capacity(self.config.batch_size);
            match first {
                Ok(msg) => {
                    window.push((msg.topic().to_string(), msg.partition(), msg.offset()));
                    self.accept(&msg, &mut events);
                }
                Err(e) => {
                    error!("Kafka consumer error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            }

            // The window starts at the first message: fill up to batch_size
            // or until batch_timeout elapses, whichever comes first.
            let deadline = Instant::now() + self.config.batch_timeout;
            while events.len() < self.config.batch_size {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match timeout(remaining, self.consumer.recv()).await {
                    Err(_) => break,
                    Ok(Err(e)) => {
                        error!("Kafka consumer error mid-batch: {}", e);
                        break;
                    }
                    Ok(Ok(msg)) => {
                        window.push((msg.topic().to_string(), msg.partition(), msg.offset()));
                        self.accept(&msg, &mut events);
                    }
                }
            }

            if events.is_empty() {
                // The window held only poison messages; ack and move past
                // them.
                self.store_window(&window);
                self.commit();
                continue;
            }

            metrics::READ_EVENT_BATCH_SIZE
                .with_label_values(&[&self.config.topic])
                .observe(events.len() as f64);

            match self.flush(&events).await {
                Ok(()) => {
                    metrics::READ_EVENTS_CONSUMED
                        .with_label_values(&["ok"])
                        .inc_by(events.len() as u64);
                    self.store_window(&window);
                    self.commit();
                }
                Err(e) => {
                    // Nothing is stored: rewind to the window's first
                    // offset so the bus redelivers it.
                    metrics::READ_EVENTS_CONSUMED
                        .with_label_values(&["handler_error"])
                        .inc_by(events.len() as u64);
                    error!(batch = events.len(), "read-event batch failed, rewinding window: {}", e);
                    self.rewind(&window);
                }
            }
        }
    }

    /// Decode one message into the batch. Malformed payloads bypass the
    /// batch instead of blocking the partition.
    fn accept(&self, msg: &BorrowedMessage<'_>, events: &mut Vec<ReadEvent>) {
        let Some(payload) = msg.payload() else {
            warn!(
                topic = msg.topic(),
                partition = msg.partition(),
                offset = msg.offset(),
                "read event without payload, skipping"
            );
            metrics::READ_EVENTS_CONSUMED
                .with_label_values(&["malformed"])
                .inc();
            return;
        };

        match serde_json::from_slice::<ReadEvent>(payload) {
            Ok(evt) => {
                debug!(
                    aid = evt.aid,
                    uid = evt.uid,
                    offset = msg.offset(),
                    "read event accepted"
                );
                events.push(evt);
            }
            Err(e) => {
                warn!(
                    topic = msg.topic(),
                    partition = msg.partition(),
                    offset = msg.offset(),
                    "malformed read event, skipping: {}",
                    e
                );
                metrics::READ_EVENTS_CONSUMED
                    .with_label_values(&["malformed"])
                    .inc();
            }
        }
    }

    async fn flush(&self, events: &[ReadEvent]) -> Result<()> {
        let bizs: Vec<String> = events.iter().map(|_| "article".to_string()).collect();
        let ids: Vec<i64> = events.iter().map(|e| e.aid).collect();

        self.interactive.batch_incr_read_cnt(&bizs, &ids).await
    }

    /// Mark every message of the window as processed. Stores feed the next
    /// commit; librdkafka keeps the highest offset per partition.
    fn store_window(&self, window: &[(String, i32, i64)]) {
        for (topic, partition, offset) in window {
            if let Err(e) = self.consumer.store_offset(topic, *partition, *offset) {
                warn!(
                    topic = %topic,
                    partition,
                    offset,
                    "offset store failed: {}",
                    e
                );
            }
        }
    }

    /// Seek each partition back to the window's first offset so the failed
    /// window is fetched again.
    fn rewind(&self, window: &[(String, i32, i64)]) {
        let mut firsts: HashMap<(&str, i32), i64> = HashMap::new();
        for (topic, partition, offset) in window {
            firsts
                .entry((topic.as_str(), *partition))
                .and_modify(|o| *o = (*o).min(*offset))
                .or_insert(*offset);
        }

        for ((topic, partition), offset) in firsts {
            if let Err(e) = self.consumer.seek(
                topic,
                partition,
                Offset::Offset(offset),
                Duration::from_secs(1),
            ) {
                // A failed seek leaves the advanced position in place; the
                // uncommitted offsets still get redelivered after the next
                // rebalance or restart.
                warn!(topic, partition, offset, "seek back failed: {}", e);
            }
        }
    }

    fn commit(&self) {
        if let Err(e) = self.consumer.commit_consumer_state(CommitMode::Async) {
            warn!("offset commit failed: {}", e);
        }
    }
}
