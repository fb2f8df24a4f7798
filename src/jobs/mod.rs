/// Distributed periodic work: the executor seam, the preemptive scheduler
/// loop, and the jobs wired into it.
pub mod ranking_job;
pub mod scheduler;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::models::CronJob;

pub use scheduler::{run_lease_sweeper, Scheduler};

/// A way of executing jobs, keyed by the job row's `executor` tag.
///
/// Only the in-process variant exists today; remote variants (HTTP, gRPC,
/// subprocess) implement this trait without the scheduler loop noticing.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;

    async fn exec(&self, job: &CronJob) -> Result<()>;
}

type JobFn = Arc<dyn Fn(CronJob) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Executor backed by an in-process callback map keyed by job name.
#[derive(Default)]
pub struct LocalFuncExecutor {
    funcs: HashMap<String, JobFn>,
}

impl LocalFuncExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: &str, f: F)
    where
        F: Fn(CronJob) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.funcs
            .insert(name.to_string(), Arc::new(move |job| Box::pin(f(job))));
    }
}

#[async_trait]
impl Executor for LocalFuncExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn exec(&self, job: &CronJob) -> Result<()> {
        let Some(f) = self.funcs.get(&job.name) else {
            bail!("no local function registered for job '{}'", job.name);
        };
        f(job.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn job(name: &str) -> CronJob {
        CronJob {
            id: 1,
            name: name.to_string(),
            executor: "local".to_string(),
            cfg: String::new(),
            expression: "0 * * * * *".to_string(),
            status: JobStatus::Running.as_i16(),
            next_time: Utc::now(),
            version: 0,
            ctime: Utc::now(),
            utime: Utc::now(),
        }
    }

    #[tokio::test]
    async fn registered_function_runs() {
        static CALLS: AtomicU32 = AtomicU32::new(0);

        let mut exec = LocalFuncExecutor::new();
        exec.register("counted", |_job| async {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        exec.exec(&job("counted")).await.unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_job_name_is_an_error() {
        let exec = LocalFuncExecutor::new();
        let err = exec.exec(&job("nobody-home")).await.unwrap_err();
        assert!(err.to_string().contains("nobody-home"));
    }
}
