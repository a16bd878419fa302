// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serial callback executor.
//!
//! User hooks never run under an element lock. Elements submit them here,
//! still holding the lock so submission order matches state order, and a
//! single worker thread runs them in FIFO order. A panicking job is caught,
//! logged and does not stop the worker.

use crossbeam::channel::{self, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-threaded FIFO executor for user callbacks.
pub struct CallbackExecutor {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl CallbackExecutor {
    /// Spawn the worker thread.
    pub fn new(name: &str) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        let thread_name = format!("keyflow-cb-{}", name);

        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                log::debug!("[executor] {} started", thread_name);
                let mut panics = 0u64;
                for job in rx.iter() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        panics += 1;
                        log::warn!("[executor] callback panicked ({} so far)", panics);
                    }
                }
                log::debug!("[executor] {} stopped", thread_name);
            })
            .map_err(Error::IoError)?;

        Ok(Self {
            tx: Some(tx),
            worker_id: worker.thread().id(),
            worker: Some(worker),
        })
    }

    /// Queue `job` behind every previously submitted job.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let sent = self.tx.as_ref().map(|tx| tx.send(Box::new(job)));
        if !matches!(sent, Some(Ok(()))) {
            log::debug!("[executor] worker gone, callback dropped");
        }
    }

    /// Block until every job submitted before this call has run.
    ///
    /// Returns immediately when called from a callback.
    pub fn flush(&self) {
        if self.on_worker() {
            return;
        }
        let (done_tx, done_rx) = channel::bounded::<()>(1);
        self.submit(move || {
            let _ = done_tx.send(());
        });
        // Err means the worker dropped the job: nothing left to wait for.
        let _ = done_rx.recv();
    }

    /// Whether the current thread is the worker.
    pub fn on_worker(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl Drop for CallbackExecutor {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.tx.take();
        if self.on_worker() {
            return;
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for CallbackExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackExecutor")
            .field("worker", &self.worker_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn runs_jobs_in_submission_order() {
        let executor = CallbackExecutor::new("order").expect("spawn");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            executor.submit(move || seen.lock().push(i));
        }
        executor.flush();

        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn panicking_job_does_not_stop_worker() {
        let executor = CallbackExecutor::new("panic").expect("spawn");
        let seen = Arc::new(Mutex::new(0));

        executor.submit(|| panic!("boom"));
        let counter = Arc::clone(&seen);
        executor.submit(move || *counter.lock() += 1);
        executor.flush();

        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn drop_drains_pending_jobs() {
        let seen = Arc::new(Mutex::new(0));
        {
            let executor = CallbackExecutor::new("drain").expect("spawn");
            for _ in 0..10 {
                let seen = Arc::clone(&seen);
                executor.submit(move || *seen.lock() += 1);
            }
        }
        assert_eq!(*seen.lock(), 10);
    }
}
