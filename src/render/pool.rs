use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use anyhow::{Context, Result, anyhow, bail};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

/// Fixed-size set of render threads.
pub struct RenderPool {
    pool: ThreadPool,
}

impl RenderPool {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            bail!("render pool needs at least one worker");
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|index| format!("render-{index}"))
            .build()
            .context("failed to start render workers")?;

        debug!(workers = size, "render pool started");
        Ok(Self { pool })
    }

    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `task` for every item on the pool and blocks until all of them
    /// finish. Results are handed to `sink` in item order, one batch of
    /// `size()` results at a time, and dropped once `sink` returns.
    ///
    /// A panic inside a task becomes an error naming the item. The first
    /// error stops the run; later batches are never started.
    pub fn run_ordered<I, T, F, S>(&self, items: &[I], task: F, mut sink: S) -> Result<()>
    where
        I: fmt::Display + Sync,
        T: Send,
        F: Fn(&I) -> Result<T> + Sync,
        S: FnMut(T) -> Result<()>,
    {
        for batch in items.chunks(self.size()) {
            let results = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|item| run_caught(item, &task))
                    .collect::<Vec<_>>()
            });
            for result in results {
                sink(result?)?;
            }
        }
        Ok(())
    }
}

fn run_caught<I, T, F>(item: &I, task: &F) -> Result<T>
where
    I: fmt::Display,
    F: Fn(&I) -> Result<T>,
{
    panic::catch_unwind(AssertUnwindSafe(|| task(item))).map_err(|payload| {
        anyhow!("task {item} panicked: {}", panic_message(payload.as_ref()))
    })?
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
