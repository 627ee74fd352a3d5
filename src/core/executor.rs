//! Executors and worker pools.
//!
//! An [`Executor`] decides which thread runs a job. Actions dispatch their
//! outer computation on one, and composite actions fan their children out on a
//! [`WorkerPool`] created fresh for every invocation by a [`PoolFactory`].

use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs somewhere.
pub trait Executor: Send + Sync {
    /// Submit `job`. Returns once the job is queued, not once it has run.
    fn execute(&self, job: Job) -> Result<()>;
}

/// Spawns a new, unmanaged thread for every job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPerTask;

impl Executor for ThreadPerTask {
    fn execute(&self, job: Job) -> Result<()> {
        std::thread::Builder::new()
            .name("dbaction-task".to_string())
            .spawn(job)?;
        Ok(())
    }
}

/// Runs every job immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) -> Result<()> {
        job();
        Ok(())
    }
}

/// The executor actions use unless told otherwise.
pub fn default_executor() -> Arc<dyn Executor> {
    Arc::new(ThreadPerTask)
}

/// A bounded pool of worker threads.
///
/// Backed by the blocking pool of a dedicated tokio runtime: at most `size`
/// jobs run at once and the rest wait in submission order.
pub struct WorkerPool {
    size: usize,
    runtime: Mutex<Option<Runtime>>,
}

impl WorkerPool {
    /// A pool running at most `size` jobs at a time.
    pub fn fixed(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfig(
                "worker pool size must be at least 1".to_string(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size)
            .thread_name("dbaction-pool")
            .build()?;

        tracing::debug!("Started worker pool with {} workers", size);

        Ok(Self {
            size,
            runtime: Mutex::new(Some(runtime)),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_shutdown(&self) -> bool {
        self.runtime.lock().is_none()
    }

    /// Stop accepting jobs and release the workers.
    ///
    /// Running jobs are not interrupted; jobs still queued are dropped.
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
            tracing::debug!("Shut down worker pool with {} workers", self.size);
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) -> Result<()> {
        match self.runtime.lock().as_ref() {
            Some(runtime) => {
                // The JoinHandle is not needed: results travel back through the job itself.
                drop(runtime.spawn_blocking(job));
                Ok(())
            }
            None => Err(Error::PoolShutdown),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

type PoolFn = dyn Fn() -> Result<WorkerPool> + Send + Sync;

/// Creates the worker pool for one composite action invocation.
#[derive(Clone)]
pub struct PoolFactory {
    make: Arc<PoolFn>,
}

impl PoolFactory {
    /// A single worker: children run one after another.
    pub fn single() -> Self {
        Self::fixed(1)
    }

    /// Up to `size` children run concurrently.
    pub fn fixed(size: usize) -> Self {
        Self::from_fn(move || WorkerPool::fixed(size))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Result<WorkerPool> + Send + Sync + 'static,
    {
        Self { make: Arc::new(f) }
    }

    pub fn create(&self) -> Result<WorkerPool> {
        (self.make)()
    }
}

impl Default for PoolFactory {
    fn default() -> Self {
        Self::single()
    }
}

impl std::fmt::Debug for PoolFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PoolFactory")
    }
}
