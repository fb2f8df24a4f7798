/// Kafka consumers feeding the engagement counters.
pub mod read_events;

pub use read_events::{ReadEventsConsumer, ReadEventsConsumerConfig};
