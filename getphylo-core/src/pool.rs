//! Worker pool for per-item batches within a stage
//!
//! Jobs are independent and each writes its own output path, so workers share
//! no mutable state. The first failing job aborts the batch: rayon stops
//! handing out further jobs and that error is returned.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{GetphyloError, Result};
use crate::tools::{ToolInvocation, ToolRunner};

pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("getphylo-worker-{}", i))
            .build()
            .map_err(|e| GetphyloError::config(format!("cannot start worker pool: {}", e)))?;

        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Map `job` over `items` in the pool. Results keep the order of `items`.
    pub fn run_batch<T, R, F>(&self, items: Vec<T>, job: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R> + Sync + Send,
    {
        self.pool
            .install(|| items.into_par_iter().map(|item| job(item)).collect())
    }

    /// Run every invocation through `runner`
    pub fn run_tools(&self, runner: &dyn ToolRunner, invocations: Vec<ToolInvocation>) -> Result<()> {
        let total = invocations.len();
        self.run_batch(invocations, |invocation| runner.run(&invocation))?;
        log::debug!("Completed {} external tool runs on {} workers", total, self.threads);
        Ok(())
    }
}
