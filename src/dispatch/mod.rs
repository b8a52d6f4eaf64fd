//! Queue-driven redelivery.
//!
//! The delivery engine makes exactly one attempt per call. This module is
//! the external queue that turns failed attempts into later attempts:
//!
//! - [`channel`] creates a bounded job queue ([`Dispatcher`] / [`JobReceiver`])
//! - [`Worker`] drains the queue, waits out the [`RetrySchedule`] delay for
//!   each attempt, and reschedules failures until the schedule is exhausted.
//!   Jobs waiting for a retry count against the same bound as queued ones,
//!   so a stalled endpoint pushes back on producers instead of piling up.
//!
//! [`RetrySchedule`]: crate::webhook::RetrySchedule

mod job;
mod worker;


pub use job::DeliveryJob;
pub use worker::{DEFAULT_CONCURRENCY, Worker, WorkerReport};

use thiserror::Error;
use tokio::sync::mpsc;

/// Error returned when a job cannot be enqueued.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker has stopped and no longer accepts jobs.
    #[error("Delivery queue is closed")]
    Closed,

    /// The queue is at capacity.
    #[error("Delivery queue is full")]
    Full,
}

/// Creates a bounded delivery queue.
///
/// # Panics
///
/// Panics if `capacity` is 0.
#[must_use]
pub fn channel(capacity: usize) -> (Dispatcher, JobReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    (Dispatcher { sender }, JobReceiver { receiver, capacity })
}

/// Cloneable handle for enqueueing delivery jobs.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<DeliveryJob>,
}

impl Dispatcher {
    /// Enqueues a job, waiting for capacity if the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] if the receiving worker is gone.
    pub async fn enqueue(&self, job: DeliveryJob) -> Result<(), DispatchError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| DispatchError::Closed)
    }

    /// Enqueues a job without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Full`] or [`DispatchError::Closed`].
    pub fn try_enqueue(&self, job: DeliveryJob) -> Result<(), DispatchError> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::Full,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

/// Receiving end of the delivery queue, consumed by [`Worker::run`].
#[derive(Debug)]
pub struct JobReceiver {
    receiver: mpsc::Receiver<DeliveryJob>,
    capacity: usize,
}

impl JobReceiver {
    /// Number of jobs the queue buffers before producers wait.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    async fn recv(&mut self) -> Option<DeliveryJob> {
        self.receiver.recv().await
    }

    /// Stops accepting jobs and returns the ones still buffered.
    fn close(&mut self) -> Vec<DeliveryJob> {
        self.receiver.close();
        let mut pending = Vec::new();
        while let Ok(job) = self.receiver.try_recv() {
            pending.push(job);
        }
        pending
    }
}
