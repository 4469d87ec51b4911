//! Bulk preload of every timetable named in an index (§4.4, §5).

use crate::config::Config;
use crate::error::Error;
use crate::index::{Index, TargetInfo};
use crate::timetable::Timetable;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{info, warn};

/// Outcome of a bulk preload: how many timetables were cached, and which
/// targets failed after their retries were exhausted.
#[derive(Debug, Default)]
pub struct PreloadReport {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

/// Fetch every target's timetable with bounded concurrency; a target whose
/// fetch exhausts retries is logged and skipped, never aborting the rest
/// (§4.4). `fetch_one` is expected to already carry per-request retry (the
/// HTTP client's transient-error backoff), so this function adds only
/// concurrency control and pacing.
pub async fn preload<F, Fut>(
    index: &Index,
    config: &Config,
    fetch_one: F,
) -> PreloadReport
where
    F: Fn(TargetInfo) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Timetable, Error>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.preload_max_concurrent));
    let fetch_one = Arc::new(fetch_one);
    let delay = config.preload_delay;

    let mut handles = Vec::new();
    for info in index.all_targets().into_iter().cloned() {
        let semaphore = semaphore.clone();
        let fetch_one = fetch_one.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            if delay > Duration::ZERO {
                sleep(delay).await;
            }
            let id = info.id.clone();
            (id, fetch_one(info).await)
        }));
    }

    let mut report = PreloadReport::default();
    for handle in handles {
        match handle.await {
            Ok((_id, Ok(_))) => report.succeeded += 1,
            Ok((id, Err(e))) => {
                warn!(target = id, error = %e, "preload exhausted retries, skipping target");
                report.failed.push(id);
            }
            Err(join_error) => {
                warn!(error = %join_error, "preload task panicked");
            }
        }
    }

    info!(succeeded = report.succeeded, failed = report.failed.len(), "preload complete");
    report
}

/// Fetch the index with a coarse outer retry, separate from the HTTP
/// client's own per-request backoff: up to `attempts` whole-operation tries
/// (§4.4 "outer 2-attempt retry that only fires when the initial index
/// fetch fails").
pub async fn fetch_index_with_outer_retry<F, Fut>(
    attempts: u32,
    retry_delay: Duration,
    fetch_index: F,
) -> Result<Index, Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Index, Error>>,
{
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match fetch_index().await {
            Ok(index) => return Ok(index),
            Err(e) => {
                warn!(attempt, error = %e, "index fetch attempt failed");
                last_err = Some(e);
                if attempt < attempts {
                    sleep(retry_delay * attempt).await;
                }
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}
