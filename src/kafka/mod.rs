/// Kafka surface: the read-event producer. Consumption lives in
/// `crate::consumers`.
pub mod producer;

pub use producer::{ReadEvent, ReadEventProducer, TOPIC_READ_EVENT};
