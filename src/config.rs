/// Configuration management for article-service
///
/// All settings come from environment variables with development defaults,
/// so a bare `cargo run` against local Postgres/Redis/Kafka works.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub kafka: KafkaConfig,
    pub scheduler: SchedulerConfig,
    pub ranking: RankingConfig,
    pub read_events: ReadEventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub read_events_topic: String,
}

/// Preemptive cron scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between failed preempt attempts (ms)
    pub interval_ms: u64,
    /// Deadline for each preempt/heartbeat query (ms)
    pub db_timeout_ms: u64,
    /// Max concurrently executing jobs per replica
    pub max_in_flight: usize,
    /// Lease heartbeat period (ms)
    pub refresh_interval_ms: u64,
}

/// Ranking engine and two-tier cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    pub batch_size: i64,
    pub top_n: usize,
    pub local_ttl_secs: u64,
    pub remote_ttl_secs: u64,
    pub horizon_days: i64,
    /// Exponent of the time-decay denominator in the default score
    pub score_factor: f64,
}

/// Batched read-event consumer window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadEventsConfig {
    pub group_id: String,
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: std::env::var("ARTICLE_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("ARTICLE_SERVICE_PORT", 8083),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/articles".to_string()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20),
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                read_events_topic: std::env::var("KAFKA_READ_EVENTS_TOPIC")
                    .unwrap_or_else(|_| "article_read_event".to_string()),
            },
            scheduler: SchedulerConfig {
                interval_ms: env_or("SCHEDULER_INTERVAL_MS", 1_000),
                db_timeout_ms: env_or("SCHEDULER_DB_TIMEOUT_MS", 1_000),
                max_in_flight: env_or("SCHEDULER_MAX_IN_FLIGHT", 100),
                refresh_interval_ms: env_or("SCHEDULER_REFRESH_INTERVAL_MS", 10_000),
            },
            ranking: RankingConfig {
                batch_size: env_or("RANKING_BATCH_SIZE", 100),
                top_n: env_or("RANKING_TOP_N", 100),
                local_ttl_secs: env_or("RANKING_LOCAL_TTL_SECS", 180),
                remote_ttl_secs: env_or("RANKING_REMOTE_TTL_SECS", 180),
                horizon_days: env_or("RANKING_HORIZON_DAYS", 7),
                score_factor: parse_env_or_default("RANKING_SCORE_FACTOR", 1.5)?,
            },
            read_events: ReadEventsConfig {
                group_id: std::env::var("READ_EVENTS_GROUP_ID")
                    .unwrap_or_else(|_| "interactive".to_string()),
                batch_size: env_or("READ_EVENTS_BATCH_SIZE", 100),
                batch_timeout_ms: env_or("READ_EVENTS_BATCH_TIMEOUT_MS", 1_000),
            },
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_or_default(key: &str, default: f64) -> Result<f64, String> {
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_key() {
        assert_eq!(env_or("ARTICLE_SERVICE_TEST_MISSING_KEY", 42u64), 42);
    }

    #[test]
    fn score_factor_default() {
        assert_eq!(
            parse_env_or_default("ARTICLE_SERVICE_TEST_MISSING_FACTOR", 1.5).unwrap(),
            1.5
        );
    }
}
