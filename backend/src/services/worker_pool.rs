//! Background task pool.
//!
//! A bounded queue drained by a fixed set of tokio tasks. The pool is built
//! once in `main` and handed to the services that schedule follow-up work,
//! such as pulling a deleted role out of every user.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};

/// Queue slots per worker.
const QUEUE_SLOTS_PER_WORKER: usize = 5;

/// A unit of fire-and-forget work. Failures are logged and not retried.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self) -> Result<()>;
}

type Receiver = Arc<AsyncMutex<mpsc::Receiver<Box<dyn Task>>>>;

pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Box<dyn Task>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `count` workers sharing a queue of `count * 5` slots.
    /// Must be called inside a tokio runtime.
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        let (tx, rx) = mpsc::channel(count * QUEUE_SLOTS_PER_WORKER);
        let rx: Receiver = Arc::new(AsyncMutex::new(rx));

        let workers = (0..count)
            .map(|worker| tokio::spawn(run_worker(worker, rx.clone())))
            .collect();

        tracing::info!(workers = count, "Worker pool started");

        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Queue a task, waiting for a free slot when the queue is full.
    pub async fn submit(&self, task: Box<dyn Task>) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .map_err(|_| AppError::Internal("worker pool lock poisoned".into()))?
            .clone()
            .ok_or_else(|| AppError::Internal("worker pool is shut down".into()))?;

        let name = task.name();
        sender
            .send(task)
            .await
            .map_err(|_| AppError::Internal("worker pool is shut down".into()))?;
        tracing::debug!(task = name, "Task queued");
        Ok(())
    }

    /// Close the queue and wait for the workers to drain it.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        drop(sender);

        let workers = self
            .workers
            .lock()
            .map(|mut w| std::mem::take(&mut *w))
            .unwrap_or_default();
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker terminated abnormally");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn run_worker(worker: usize, receiver: Receiver) {
    loop {
        let task = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };
        let Some(task) = task else {
            break;
        };

        match task.execute().await {
            Ok(()) => tracing::debug!(worker, task = task.name(), "Task completed"),
            Err(e) => tracing::error!(worker, task = task.name(), error = %e, "Task failed"),
        }
    }
}
