use std::time::Duration;

use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Topic carrying article read events.
pub const TOPIC_READ_EVENT: &str = "article_read_event";

/// One read of one article. Field names are part of the wire contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadEvent {
    #[serde(rename = "Uid")]
    pub uid: i64,
    #[serde(rename = "Aid")]
    pub aid: i64,
}

/// Kafka producer for read events. Sends are awaited with a producer-local
/// deadline so a bus stall never escapes into the request lifecycle.
#[derive(Clone)]
pub struct ReadEventProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl ReadEventProducer {
    pub fn new(brokers: &str, topic: String) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("compression.type", "lz4")
            .create()
            .map_err(AppError::from)?;

        Ok(Self {
            producer,
            topic,
            timeout: Duration::from_secs(5),
        })
    }

    pub async fn produce_read_event(&self, evt: ReadEvent) -> Result<()> {
        let payload = serde_json::to_string(&evt)?;
        let key = evt.aid.to_string();
        let record = FutureRecord::to(&self.topic).payload(&payload).key(&key);

        debug!(aid = evt.aid, uid = evt.uid, "publishing read event");

        match timeout(self.timeout, self.producer.send(record, self.timeout)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err((e, _))) => Err(AppError::from(e)),
            Err(_) => {
                warn!("read event publish timed out after {:?}", self.timeout);
                Err(AppError::Kafka("publish timeout".to_string()))
            }
        }
    }

    /// Lightweight health check by fetching cluster metadata.
    pub async fn health_check(&self) -> Result<()> {
        self.producer
            .client()
            .fetch_metadata(Some(&self.topic), self.timeout)
            .map(|_| ())
            .map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_event_wire_format() {
        let evt = ReadEvent { uid: 11, aid: 7 };
        let json = serde_json::to_string(&evt).unwrap();
        assert_eq!(json, r#"{"Uid":11,"Aid":7}"#);
    }

    #[test]
    fn read_event_round_trip() {
        let evt: ReadEvent = serde_json::from_str(r#"{"Uid":3,"Aid":42}"#).unwrap();
        assert_eq!(evt.uid, 3);
        assert_eq!(evt.aid, 42);
    }
}
