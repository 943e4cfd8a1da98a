//! Concurrent resolution runtime.
//!
//! Resolutions are independent and CPU-bound, so a small bounded pool of
//! threads can serve many callers. Each worker clones the arbiter's current
//! snapshot per job; a reload between jobs is picked up by the next job.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::debug;

use crate::arbiter::Arbiter;
use crate::error::{ArbiterResult, RuntimeError};
use crate::resolution::{Resolution, ResolutionRequest};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued requests.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

enum Job {
    Resolve {
        request: ResolutionRequest,
        reply: Sender<Resolution>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

/// Handle returned by `submit`.
pub struct ResolutionHandle {
    rx: Receiver<Resolution>,
}

impl ResolutionHandle {
    /// Waits for the resolution.
    pub fn join(self) -> ArbiterResult<Resolution> {
        self.rx.recv().map_err(|_| RuntimeError::Disconnected.into())
    }

    /// Waits for the resolution with a timeout.
    pub fn join_timeout(self, timeout: Duration) -> ArbiterResult<Resolution> {
        self.rx.recv_timeout(timeout).map_err(|err| {
            match err {
                RecvTimeoutError::Timeout => RuntimeError::Timeout {
                    duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
                RecvTimeoutError::Disconnected => RuntimeError::Disconnected,
            }
            .into()
        })
    }
}

/// A bounded worker pool resolving requests against a shared `Arbiter`.
pub struct ArbiterRuntime {
    arbiter: Arc<Arbiter>,
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl ArbiterRuntime {
    /// Starts the worker threads.
    ///
    /// # Errors
    /// `RuntimeError::Spawn` if a thread cannot be started. Workers that did
    /// start are shut down before returning.
    pub fn start(arbiter: Arc<Arbiter>, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut runtime = Self {
            arbiter,
            tx: Some(tx),
            workers: Vec::with_capacity(workers),
            queue_capacity,
        };

        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let arbiter = Arc::clone(&runtime.arbiter);
            let handle = thread::Builder::new()
                .name(format!("arbiter-worker-{idx}"))
                .spawn(move || worker_loop(&arbiter, &rx))
                .map_err(|e| RuntimeError::Spawn {
                    message: e.to_string(),
                })?;
            runtime.workers.push(handle);
        }

        debug!(workers, queue_capacity, "arbiter runtime started");
        Ok(runtime)
    }

    /// The shared arbiter. Reloads through it affect subsequent jobs.
    #[must_use]
    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    /// Queues a request without blocking.
    ///
    /// # Errors
    /// `QueueFull` when the queue is at capacity, `Disconnected` after shutdown.
    pub fn submit(&self, request: ResolutionRequest) -> ArbiterResult<ResolutionHandle> {
        let (reply, rx) = bounded::<Resolution>(1);
        self.try_send(Job::Resolve { request, reply })?;
        Ok(ResolutionHandle { rx })
    }

    /// Resolves a request on the pool and waits for the result.
    pub fn resolve(&self, request: ResolutionRequest) -> ArbiterResult<Resolution> {
        self.submit(request)?.join()
    }

    fn try_send(&self, job: Job) -> Result<(), RuntimeError> {
        let tx = self.tx.as_ref().ok_or(RuntimeError::Disconnected)?;
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RuntimeError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(RuntimeError::Disconnected),
        }
    }

    /// Stops accepting work, drains queued jobs and joins the workers.
    pub fn shutdown(&mut self) {
        // Closing the channel lets workers finish queued jobs and exit.
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> Result<Receiver<()>, RuntimeError> {
        let (reply, rx) = bounded::<()>(1);
        self.try_send(Job::Sleep { duration, reply })?;
        Ok(rx)
    }
}

impl Drop for ArbiterRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(arbiter: &Arbiter, rx: &Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Resolve { request, reply } => {
                let _ = reply.send(arbiter.resolve(&request));
            }

            #[cfg(test)]
            Job::Sleep { duration, reply } => {
                thread::sleep(duration);
                let _ = reply.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(workers: usize, queue_capacity: usize) -> ArbiterRuntime {
        let arbiter = Arc::new(Arbiter::with_defaults().unwrap());
        ArbiterRuntime::start(
            arbiter,
            RuntimeConfig {
                workers,
                queue_capacity,
            },
        )
        .unwrap()
    }

    #[test]
    fn resolves_on_the_pool() {
        let rt = runtime(2, 16);
        let res = rt
            .resolve(ResolutionRequest::new("design rest-api", ["frontend", "backend"]))
            .unwrap();
        assert_eq!(res.ordered_roles.len(), 2);
        assert_eq!(res.strategy_used.name(), "negotiation");
    }

    #[test]
    fn many_requests_in_parallel() {
        let rt = runtime(4, 64);
        let handles: Vec<ResolutionHandle> = (0..32)
            .map(|i| {
                let roles = if i % 2 == 0 { vec!["security", "performance"] } else { vec!["qa"] };
                rt.submit(ResolutionRequest::new("deploy", roles)).unwrap()
            })
            .collect();

        for handle in handles {
            let res = handle.join_timeout(Duration::from_secs(5)).unwrap();
            assert!(!res.ordered_roles.is_empty());
        }
    }

    #[test]
    fn full_queue_is_reported() {
        let rt = runtime(1, 1);
        // Occupy the worker, then fill the single queue slot.
        let busy = rt.submit_sleep(Duration::from_millis(300)).unwrap();
        thread::sleep(Duration::from_millis(50));
        let _queued = rt.submit_sleep(Duration::from_millis(1)).unwrap();

        let err = rt.submit(ResolutionRequest::new("x", ["qa"])).err().unwrap();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            crate::error::ArbiterError::Runtime(RuntimeError::QueueFull { capacity: 1 })
        ));

        busy.recv().unwrap();
    }

    #[test]
    fn join_timeout_reports_timeout() {
        let rt = runtime(1, 4);
        let _busy = rt.submit_sleep(Duration::from_millis(200)).unwrap();
        let handle = rt.submit(ResolutionRequest::new("x", ["qa"])).unwrap();
        let err = handle.join_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ArbiterError::Runtime(RuntimeError::Timeout { duration_ms: 10 })
        ));
    }

    #[test]
    fn submit_after_shutdown_is_disconnected() {
        let mut rt = runtime(1, 4);
        rt.shutdown();
        let err = rt.submit(ResolutionRequest::new("x", ["qa"])).err().unwrap();
        assert!(matches!(
            err,
            crate::error::ArbiterError::Runtime(RuntimeError::Disconnected)
        ));
    }
}
