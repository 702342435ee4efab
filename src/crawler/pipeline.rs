//! Task pipeline: crawl, then process
//!
//! Retrying and backoff belong to the worker and the pending pool; this
//! module runs the two phases once and reports timings.

use crate::task::{Task, TaskContext, TaskError};
use std::time::Instant;

/// Runs one claimed task through its crawl and process phases
///
/// Logs the start and end of each phase with elapsed seconds, and the pending
/// depth of the instance right after processing, since `process` may have
/// enqueued newly discovered tasks.
pub fn finish(task: &mut dyn Task, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
    let func_name = task.func_name().to_string();
    let url = task.url().to_string();

    tracing::info!(func = %func_name, url = %url, "crawl start");
    let started = Instant::now();
    let page_raw = task.crawl()?;
    tracing::info!(
        func = %func_name,
        url = %url,
        seconds = started.elapsed().as_secs_f64(),
        "crawl finish"
    );

    tracing::info!(func = %func_name, url = %url, "process start");
    let started = Instant::now();
    task.process(page_raw, ctx)?;
    tracing::info!(
        func = %func_name,
        url = %url,
        seconds = started.elapsed().as_secs_f64(),
        pending = ctx.pending(),
        "process finish"
    );

    Ok(())
}
