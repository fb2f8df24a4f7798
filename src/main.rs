use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use prometheus::{Encoder, TextEncoder};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use article_service::cache::{
    ArticleCache, InteractiveCache, RankingLocalCache, RankingRedisCache, RankingStore,
};
use article_service::consumers::{ReadEventsConsumer, ReadEventsConsumerConfig};
use article_service::db::schema;
use article_service::jobs::{
    ranking_job, run_lease_sweeper, LocalFuncExecutor, Scheduler,
};
use article_service::kafka::ReadEventProducer;
use article_service::services::{
    default_score_fn, ArticleService, CronJobService, EngagementSource, InteractiveService,
    PublishedArticleSource, RankingService,
};
use article_service::{handlers, Config};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Container healthcheck subcommand: `article-service healthcheck`
    {
        let mut args = std::env::args();
        let _bin = args.next();
        if let Some(cmd) = args.next() {
            if cmd == "healthcheck" || cmd == "healthcheck-http" {
                let port: u16 = std::env::var("ARTICLE_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8083);
                let url = format!("http://127.0.0.1:{}/api/v1/health", port);
                match reqwest::Client::new().get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => return Ok(()),
                    Ok(resp) => {
                        eprintln!("healthcheck HTTP status: {}", resp.status());
                        return Err(io::Error::new(io::ErrorKind::Other, "healthcheck failed"));
                    }
                    Err(e) => {
                        eprintln!("healthcheck HTTP error: {}", e);
                        return Err(io::Error::new(io::ErrorKind::Other, "healthcheck error"));
                    }
                }
            }
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing::info!("Starting article-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    // Postgres
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    schema::ensure_tables(&pool)
        .await
        .expect("Failed to ensure database schema");

    // Redis
    let redis_client =
        redis::Client::open(config.cache.url.clone()).expect("Invalid Redis URL");
    let redis = redis::aio::ConnectionManager::new(redis_client)
        .await
        .expect("Failed to connect to Redis");

    // Kafka producer
    let producer = Arc::new(
        ReadEventProducer::new(
            &config.kafka.brokers,
            config.kafka.read_events_topic.clone(),
        )
        .expect("Failed to create Kafka producer"),
    );

    // Services
    let interactive_cache = Arc::new(InteractiveCache::new(redis.clone()));
    let article_cache = Arc::new(ArticleCache::new(redis.clone()));
    let interactive = Arc::new(InteractiveService::new(pool.clone(), interactive_cache));
    let articles = Arc::new(ArticleService::new(
        pool.clone(),
        article_cache,
        producer.clone(),
    ));

    let ranking_store = Arc::new(RankingStore::new(
        RankingLocalCache::new(Duration::from_secs(config.ranking.local_ttl_secs)),
        RankingRedisCache::new(
            redis.clone(),
            Duration::from_secs(config.ranking.remote_ttl_secs),
        ),
    ));
    let ranking = Arc::new(RankingService::new(
        articles.clone() as Arc<dyn PublishedArticleSource>,
        interactive.clone() as Arc<dyn EngagementSource>,
        ranking_store,
        config.ranking.batch_size,
        config.ranking.top_n,
        config.ranking.horizon_days,
        default_score_fn(config.ranking.score_factor),
    ));

    // Shutdown fan-out for background tasks
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Read-event consumer
    let consumer = ReadEventsConsumer::new(
        ReadEventsConsumerConfig {
            brokers: config.kafka.brokers.clone(),
            group_id: config.read_events.group_id.clone(),
            topic: config.kafka.read_events_topic.clone(),
            batch_size: config.read_events.batch_size,
            batch_timeout: Duration::from_millis(config.read_events.batch_timeout_ms),
        },
        interactive.clone(),
    )
    .expect("Failed to create read-event consumer");
    {
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { consumer.run(shutdown).await });
    }

    // Preemptive scheduler with the ranking job
    let cron_svc = Arc::new(CronJobService::new(
        pool.clone(),
        Duration::from_millis(config.scheduler.refresh_interval_ms),
    ));
    ranking_job::ensure_ranking_job(&cron_svc)
        .await
        .expect("Failed to seed ranking job");

    let mut local_exec = LocalFuncExecutor::new();
    ranking_job::register_ranking_job(&mut local_exec, ranking.clone());

    let mut scheduler = Scheduler::new(cron_svc.clone(), &config.scheduler);
    scheduler.register_executor(Arc::new(local_exec));
    {
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { scheduler.schedule(shutdown).await });
    }
    {
        let shutdown = shutdown_tx.subscribe();
        let svc = cron_svc.clone();
        tokio::spawn(async move { run_lease_sweeper(svc, shutdown).await });
    }

    // HTTP server
    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let allowed_origins = config.cors.allowed_origins.clone();
    let articles_data = web::Data::new(articles.clone());
    let interactive_data = web::Data::new(interactive.clone());
    let ranking_data = web::Data::new(ranking.clone());

    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(articles_data.clone())
            .app_data(interactive_data.clone())
            .app_data(ranking_data.clone())
            .route(
                "/api/v1/health",
                web::get().to(|| async {
                    HttpResponse::Ok().json(serde_json::json!({
                        "status": "ok",
                        "service": "article-service",
                        "version": env!("CARGO_PKG_VERSION")
                    }))
                }),
            )
            .route("/metrics", web::get().to(metrics_endpoint))
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run();

    // Propagate ctrl-c into the background tasks alongside actix's own
    // signal handling.
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(());
            }
        });
    }

    let result = server.await;
    let _ = shutdown_tx.send(());
    result
}

async fn metrics_endpoint() -> HttpResponse {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(format!("metrics encode error: {}", e));
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}
