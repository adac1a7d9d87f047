//! Bounded worker pool with structured shutdown.
//!
//! A pool owns a fixed number of worker tasks draining a bounded job queue.
//! Submission either fails fast when the queue is full ([`WorkerPool::try_submit`])
//! or waits for capacity ([`WorkerPool::submit`]). Delayed re-submission
//! ([`WorkerPool::submit_after`]) runs a timer task that enqueues the job once
//! the delay elapses, which is how retry backoff avoids blocking a worker.
//!
//! Jobs that panic are contained: the panic is logged and counted and the
//! worker keeps serving the queue.

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex as AsyncMutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::time::Clock;

/// Unit of work executed by a pool worker.
pub type Job = BoxFuture<'static, ()>;

/// Errors raised by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The queue is at capacity.
    #[error("pool '{pool}' saturated: {capacity} jobs already queued")]
    Saturated {
        /// Pool name.
        pool: String,
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The pool no longer accepts work.
    #[error("pool '{pool}' is shut down")]
    Closed {
        /// Pool name.
        pool: String,
    },

    /// Workers did not finish within the shutdown timeout.
    #[error("pool '{pool}' shutdown exceeded {timeout:?}")]
    ShutdownTimeout {
        /// Pool name.
        pool: String,
        /// Timeout that was exceeded.
        timeout: Duration,
    },

    /// The pool configuration is unusable.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
}

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Name used in logs and errors.
    pub name: String,

    /// Number of worker tasks.
    pub worker_count: usize,

    /// Maximum number of queued jobs.
    pub queue_capacity: usize,
}

impl PoolConfig {
    /// Creates a configuration.
    pub fn new(name: impl Into<String>, worker_count: usize, queue_capacity: usize) -> Self {
        Self { name: name.into(), worker_count, queue_capacity }
    }

    /// Validates sizing.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if either bound is zero.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.worker_count == 0 {
            return Err(PoolError::InvalidConfig(format!(
                "pool '{}' needs at least one worker",
                self.name
            )));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::InvalidConfig(format!(
                "pool '{}' needs a non-empty queue",
                self.name
            )));
        }
        Ok(())
    }
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs accepted into the queue.
    pub submitted: u64,
    /// Jobs refused because the queue was full.
    pub rejected: u64,
    /// Jobs that ran to completion.
    pub completed: u64,
    /// Jobs that panicked.
    pub panicked: u64,
    /// Jobs currently waiting in the queue.
    pub queued: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Fixed-size pool of workers draining a bounded queue.
pub struct WorkerPool {
    config: PoolConfig,
    sender: mpsc::Sender<Job>,
    cancellation_token: CancellationToken,
    closed: AtomicBool,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Spawns the configured workers and returns the shared pool handle.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` for zero-sized configurations.
    pub fn start(config: PoolConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>, PoolError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel::<Job>(config.queue_capacity);
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let cancellation_token = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let handles = (0..config.worker_count)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let token = cancellation_token.clone();
                let counters = Arc::clone(&counters);
                let span = info_span!("pool_worker", pool = %config.name, worker_id);
                tokio::spawn(run_worker(receiver, token, counters).instrument(span))
            })
            .collect();

        info!(
            pool = %config.name,
            worker_count = config.worker_count,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );

        Ok(Arc::new(Self {
            config,
            sender,
            cancellation_token,
            closed: AtomicBool::new(false),
            worker_handles: Mutex::new(handles),
            counters,
            clock,
        }))
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Pool sizing.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Enqueues a job without waiting.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Saturated` when the queue is full and
    /// `PoolError::Closed` after shutdown.
    pub fn try_submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ensure_open()?;

        match self.sender.try_send(job.boxed()) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    pool = %self.config.name,
                    capacity = self.config.queue_capacity,
                    "job rejected, queue saturated"
                );
                Err(PoolError::Saturated {
                    pool: self.config.name.clone(),
                    capacity: self.config.queue_capacity,
                })
            },
            Err(mpsc::error::TrySendError::Closed(_)) => Err(self.closed_error()),
        }
    }

    /// Enqueues a job, waiting for queue capacity.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Closed` if the pool is shut down.
    pub async fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ensure_open()?;

        tokio::select! {
            biased;
            () = self.cancellation_token.cancelled() => Err(self.closed_error()),
            sent = self.sender.send(job.boxed()) => match sent {
                Ok(()) => {
                    self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                },
                Err(_) => Err(self.closed_error()),
            },
        }
    }

    /// Enqueues a job once `delay` has elapsed on the pool's clock.
    ///
    /// Returns immediately; the wait happens on a timer task so no worker is
    /// held. The timer is dropped if the pool shuts down first.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Closed` if the pool is already shut down.
    pub fn submit_after<F>(self: &Arc<Self>, delay: Duration, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ensure_open()?;

        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let clock = Arc::clone(&pool.clock);
            tokio::select! {
                biased;
                () = pool.cancellation_token.cancelled() => {
                    debug!(pool = %pool.config.name, "delayed job dropped during shutdown");
                },
                () = clock.sleep(delay) => {
                    if let Err(error) = pool.submit(job).await {
                        warn!(pool = %pool.config.name, error = %error, "delayed job not enqueued");
                    }
                },
            }
        });

        Ok(())
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            queued: self.config.queue_capacity.saturating_sub(self.sender.capacity()),
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops accepting work, cancels workers and waits for them to exit.
    ///
    /// Jobs already running finish; queued jobs are discarded.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ShutdownTimeout` if workers are still busy when the
    /// timeout expires.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), PoolError> {
        self.closed.store(true, Ordering::Release);
        self.cancellation_token.cancel();

        let handles = self
            .worker_handles
            .lock()
            .map(|mut handles| std::mem::take(&mut *handles))
            .unwrap_or_default();

        info!(
            pool = %self.config.name,
            worker_count = handles.len(),
            timeout_ms = timeout.as_millis() as u64,
            "initiating worker pool shutdown"
        );

        let join_all = async {
            for (worker_id, handle) in handles.into_iter().enumerate() {
                if let Err(join_error) = handle.await {
                    error!(
                        pool = %self.config.name,
                        worker_id,
                        error = %join_error,
                        "worker task failed during shutdown"
                    );
                }
            }
        };

        match tokio::time::timeout(timeout, join_all).await {
            Ok(()) => {
                info!(pool = %self.config.name, "worker pool shutdown completed");
                Ok(())
            },
            Err(_elapsed) => {
                error!(
                    pool = %self.config.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "worker pool shutdown timed out, some jobs may still be running"
                );
                Err(PoolError::ShutdownTimeout { pool: self.config.name.clone(), timeout })
            },
        }
    }

    fn ensure_open(&self) -> Result<(), PoolError> {
        if self.is_shut_down() {
            Err(self.closed_error())
        } else {
            Ok(())
        }
    }

    fn closed_error(&self) -> PoolError {
        PoolError::Closed { pool: self.config.name.clone() }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
            warn!(
                pool = %self.config.name,
                "WorkerPool dropped without shutdown(); workers cancelled"
            );
        }
    }
}

async fn run_worker(
    receiver: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    token: CancellationToken,
    counters: Arc<Counters>,
) {
    debug!("worker starting");

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => None,
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = next else {
            break;
        };

        match AssertUnwindSafe(job).catch_unwind().await {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            },
            Err(panic) => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                error!(panic = %panic_message(panic.as_ref()), "job panicked");
            },
        }
    }

    debug!("worker stopped");
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
