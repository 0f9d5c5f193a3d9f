//! Worker pools that run fetch jobs.
//!
//! The orchestrator never owns a pool; callers build one and hand it in, so
//! tests can swap in [`Sequential`] and run every job inline.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::FetchError;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    fn execute(&self, job: Job);
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

/// Fixed-size pool of named worker threads sharing one job queue.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, FetchError> {
        let threads = threads.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("fetch-worker-{i}"))
                .spawn(move || worker_loop(receiver))
                .map_err(|err| FetchError::WorkerSpawn(err.to_string()))?;
            workers.push(handle);
        }
        tracing::debug!(threads, "started fetch worker pool");

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// One worker per available CPU.
    pub fn with_available_parallelism() -> Result<Self, FetchError> {
        let threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(threads)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let Ok(receiver) = receiver.lock() else {
                break;
            };
            receiver.recv()
        };
        let Ok(job) = job else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!("fetch job panicked");
        }
    }
}

impl Scheduler for WorkerPool {
    fn execute(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };
        // A send only fails once every worker is gone; the dropped job then
        // shows up to the caller as a missing result.
        if sender.send(job).is_err() {
            tracing::error!("fetch worker pool is shut down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Runs each job on the calling thread, in submission order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Scheduler for Sequential {
    fn execute(&self, job: Job) {
        job();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn pool_runs_every_job() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        {
            let pool = WorkerPool::new(3).unwrap();
            assert_eq!(pool.size(), 3);
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                let tx = tx.clone();
                pool.execute(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tx.send(()).unwrap();
                }));
            }
        }
        drop(tx);
        assert_eq!(rx.iter().count(), 10);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn pool_survives_panicking_job() {
        let pool = WorkerPool::new(1).unwrap();
        pool.execute(Box::new(|| panic!("boom")));
        let (tx, rx) = mpsc::channel();
        pool.execute(Box::new(move || tx.send(42).unwrap()));
        assert_eq!(rx.recv().unwrap(), 42);
    }

    #[test]
    fn sequential_runs_inline() {
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            Sequential.execute(Box::new(move || order.lock().unwrap().push(i)));
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
