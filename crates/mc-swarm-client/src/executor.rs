//! Named auxiliary runtimes. Every connection owns a manager whose pools
//! stop when it disconnects; the binary keeps one more for swarm-wide jobs.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error};

use crate::error::BotError;

/// Creates and tracks executors named `<prefix>-<name>`.
#[derive(Debug)]
pub struct ExecutorManager {
    thread_prefix: String,
    inner: Mutex<ManagerState>,
}

#[derive(Debug, Default)]
struct ManagerState {
    executors: Vec<Arc<Executor>>,
    shutdown: bool,
}

impl ExecutorManager {
    pub fn new(thread_prefix: impl Into<String>) -> Self {
        Self {
            thread_prefix: thread_prefix.into(),
            inner: Mutex::new(ManagerState::default()),
        }
    }

    /// Single thread with timers, for delayed and periodic jobs.
    pub fn new_scheduled_executor(&self, name: &str) -> Result<Arc<Executor>, BotError> {
        self.create(name, |builder| {
            builder.worker_threads(1);
        })
    }

    /// Single worker thread.
    pub fn new_executor(&self, name: &str) -> Result<Arc<Executor>, BotError> {
        self.create(name, |builder| {
            builder.worker_threads(1);
        })
    }

    pub fn new_fixed_executor(&self, name: &str, threads: usize) -> Result<Arc<Executor>, BotError> {
        self.create(name, |builder| {
            builder.worker_threads(threads.max(1));
        })
    }

    /// Grows on demand: blocking jobs land on a pool that spawns threads as
    /// needed and retires idle ones.
    pub fn new_cached_executor(&self, name: &str) -> Result<Arc<Executor>, BotError> {
        self.create(name, |builder| {
            builder
                .worker_threads(1)
                .max_blocking_threads(512)
                .thread_keep_alive(Duration::from_secs(60));
        })
    }

    fn create(&self, name: &str, configure: impl FnOnce(&mut Builder)) -> Result<Arc<Executor>, BotError> {
        let mut state = self.inner.lock();
        if state.shutdown {
            return Err(BotError::ExecutorShutdown);
        }
        let thread_name = format!("{}-{}", self.thread_prefix, name);
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(thread_name.clone()).enable_all();
        configure(&mut builder);
        let runtime = builder.build()?;
        debug!("Created executor {thread_name}");

        let executor = Arc::new(Executor {
            name: thread_name,
            runtime: Mutex::new(Some(runtime)),
        });
        state.executors.push(Arc::clone(&executor));
        Ok(executor)
    }

    pub fn executor_count(&self) -> usize {
        self.inner.lock().executors.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }

    /// Stop every executor. Later calls do nothing.
    pub fn shutdown_all(&self) {
        let executors = {
            let mut state = self.inner.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            std::mem::take(&mut state.executors)
        };
        for executor in executors {
            executor.shutdown();
        }
    }
}

impl Drop for ExecutorManager {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

/// One named runtime.
pub struct Executor {
    name: String,
    runtime: Mutex<Option<Runtime>>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Executor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Run a blocking job. Errors and panics are logged.
    pub fn execute<F>(&self, job: F) -> Result<(), BotError>
    where
        F: FnOnce() -> Result<(), BotError> + Send + 'static,
    {
        let guard = self.runtime.lock();
        let runtime = guard.as_ref().ok_or(BotError::ExecutorShutdown)?;
        let name = self.name.clone();
        runtime.spawn_blocking(move || match catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error in executor {name}: {e}"),
            Err(panic) => error!("Error in executor {name}: {}", BotError::from_panic(panic)),
        });
        Ok(())
    }

    /// Spawn a future on this executor. Errors are logged.
    pub fn spawn<F>(&self, future: F) -> Result<(), BotError>
    where
        F: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        let guard = self.runtime.lock();
        let runtime = guard.as_ref().ok_or(BotError::ExecutorShutdown)?;
        let name = self.name.clone();
        runtime.spawn(async move {
            if let Err(e) = future.await {
                error!("Error in executor {name}: {e}");
            }
        });
        Ok(())
    }

    /// Run `job` every `period` until the executor shuts down.
    pub fn schedule_at_fixed_rate<F>(&self, initial_delay: Duration, period: Duration, mut job: F) -> Result<(), BotError>
    where
        F: FnMut() -> Result<(), BotError> + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
            loop {
                interval.tick().await;
                match catch_unwind(AssertUnwindSafe(&mut job)) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Error in periodic job: {e}"),
                    Err(panic) => error!("Error in periodic job: {}", BotError::from_panic(panic)),
                }
            }
        })
    }

    /// Stop the runtime without waiting for running jobs.
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            debug!("Shutting down executor {}", self.name);
            runtime.shutdown_background();
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
