/// Database access layer: sqlx repositories over PostgreSQL plus the
/// create-if-missing schema bootstrap.
pub mod article_repo;
pub mod interactive_repo;
pub mod job_repo;
pub mod schema;
pub mod user_repo;
