//! Deferred client stops

use crate::common::lock;
use crate::errors::Result;

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::sleep;
use tracing::{error, warn};

struct SchedulerInner {
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
}

/// Runs delayed jobs with a bounded number executing at once
///
/// A job only takes a permit once its delay elapsed, so pending delays never block
/// each other. Failing or panicking jobs are logged and otherwise ignored.
#[derive(Clone)]
pub struct StopScheduler {
    inner: Arc<SchedulerInner>,
}

impl StopScheduler {
    pub fn new(parallelism: usize) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                permits: Arc::new(Semaphore::new(parallelism.max(1))),
                tasks: Mutex::new(JoinSet::new()),
            }),
        }
    }

    /// Run `job` once `delay` has elapsed; never blocks the caller
    pub fn schedule<F>(&self, delay: Duration, label: String, job: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let permits = Arc::clone(&self.inner.permits);
        let mut tasks = lock(&self.inner.tasks);

        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                report_join_error(e);
            }
        }

        tasks.spawn(async move {
            sleep(delay).await;
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Err(e) = job.await {
                warn!("Scheduled job for {} failed: {}", label, e);
            }
        });
    }

    /// Jobs not yet reaped, finished or not
    pub fn pending(&self) -> usize {
        lock(&self.inner.tasks).len()
    }

    /// Cancel every job still waiting or running
    pub async fn shutdown(&self) {
        let mut tasks = std::mem::take(&mut *lock(&self.inner.tasks));
        tasks.abort_all();
        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                report_join_error(e);
            }
        }
    }
}

fn report_join_error(e: JoinError) {
    if e.is_panic() {
        error!("Scheduled job panicked: {}", e);
    }
}
