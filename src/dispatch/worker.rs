//! Delivery worker.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;

use crate::store::WebhookRepository;
use crate::time::{Clock, Sleeper, SystemClock, TokioSleeper};
use crate::webhook::{Deliverer, DeliveryError, HttpClient, RetrySchedule};

use super::{DeliveryJob, JobReceiver};

/// Default number of attempts in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Counts of what a worker did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Jobs that ended in a successful delivery.
    pub delivered: usize,
    /// Jobs whose final scheduled attempt failed.
    pub failed: usize,
    /// Failed attempts that were rescheduled.
    pub retried: usize,
    /// Jobs discarded without a final outcome: unknown webhooks, invalid
    /// payloads, or work abandoned at shutdown.
    pub dropped: usize,
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivered: {}, failed: {}, retried: {}, dropped: {}",
            self.delivered, self.failed, self.retried, self.dropped
        )
    }
}

/// How a single job ended.
#[derive(Debug)]
enum JobOutcome {
    Delivered,
    Retry(DeliveryJob),
    Exhausted(DeliveryJob, DeliveryError),
    Rejected(DeliveryJob, DeliveryError),
    Abandoned(DeliveryJob),
}

/// Drains a delivery queue and redelivers failures on a [`RetrySchedule`].
///
/// Each job waits out `delay_for_attempt(job.attempt)` and then makes one
/// attempt through the [`Deliverer`]. A failed attempt is rescheduled with
/// the next attempt number while the schedule allows it.
///
/// At most `concurrency` attempts are in flight, and at most
/// `concurrency + queue capacity` jobs are held by the worker at once,
/// counting those waiting for a retry delay. Once that many are held the
/// worker stops taking jobs off the queue, so producers see it fill up.
///
/// # Type Parameters
///
/// - `H`, `R`, `C`: see [`Deliverer`]
/// - `S`: sleeper used for retry delays
#[derive(Debug)]
pub struct Worker<H, R, C = SystemClock, S = TokioSleeper> {
    deliverer: Deliverer<H, R, C>,
    schedule: RetrySchedule,
    sleeper: S,
    concurrency: usize,
    permits: Semaphore,
}

impl<H, R, C> Worker<H, R, C, TokioSleeper> {
    /// Creates a worker with the tokio sleeper and default concurrency.
    #[must_use]
    pub fn new(deliverer: Deliverer<H, R, C>, schedule: RetrySchedule) -> Self {
        Self {
            deliverer,
            schedule,
            sleeper: TokioSleeper,
            concurrency: DEFAULT_CONCURRENCY,
            permits: Semaphore::new(DEFAULT_CONCURRENCY),
        }
    }
}

impl<H, R, C, S> Worker<H, R, C, S> {
    /// Replaces the sleeper.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> Worker<H, R, C, S2> {
        Worker {
            deliverer: self.deliverer,
            schedule: self.schedule,
            sleeper,
            concurrency: self.concurrency,
            permits: self.permits,
        }
    }

    /// Sets the maximum number of attempts in flight at once (at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self.permits = Semaphore::new(self.concurrency);
        self
    }

    /// Returns the retry schedule.
    #[must_use]
    pub const fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }
}

impl<H, R, C, S> Worker<H, R, C, S>
where
    H: HttpClient + 'static,
    R: WebhookRepository + 'static,
    C: Clock + 'static,
    S: Sleeper + 'static,
{
    /// Processes jobs until the queue is closed and drained, or until
    /// `shutdown` completes.
    ///
    /// Jobs are only taken off the queue while the worker holds fewer than
    /// `concurrency + jobs.capacity()` of them; retries keep their slot.
    ///
    /// On shutdown, buffered jobs are dropped, pending retry delays are
    /// abandoned, and in-flight attempts are cancelled (which counts
    /// against the webhook's health like any other failure).
    pub async fn run<F>(self, mut jobs: JobReceiver, shutdown: F) -> WorkerReport
    where
        F: Future<Output = ()>,
    {
        let held_limit = self.concurrency.saturating_add(jobs.capacity());
        let worker = Arc::new(self);
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        let mut report = WorkerReport::default();
        let mut accepting = true;
        let mut stopping = false;

        tokio::pin!(shutdown);

        loop {
            if !accepting && tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                () = &mut shutdown, if !stopping => {
                    stopping = true;
                    stop_tx.send_replace(true);
                    if accepting {
                        accepting = false;
                        for job in jobs.close() {
                            log_abandoned(&job);
                            report.dropped += 1;
                        }
                    }
                    tracing::info!(
                        in_flight = tasks.len(),
                        "Shutdown requested, cancelling pending deliveries"
                    );
                }

                Some(joined) = tasks.join_next() => match joined {
                    Ok(outcome) => {
                        if let Some(job) = worker.settle(outcome, &mut report) {
                            Self::spawn(&worker, &mut tasks, job, &stop_rx);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Delivery task panicked");
                        report.dropped += 1;
                    }
                },

                job = jobs.recv(), if accepting && tasks.len() < held_limit => match job {
                    Some(job) => Self::spawn(&worker, &mut tasks, job, &stop_rx),
                    None => {
                        tracing::debug!("Delivery queue closed, draining in-flight jobs");
                        accepting = false;
                    }
                },
            }
        }

        tracing::info!(%report, "Delivery worker stopped");
        report
    }

    fn spawn(
        worker: &Arc<Self>,
        tasks: &mut JoinSet<JobOutcome>,
        job: DeliveryJob,
        stop: &watch::Receiver<bool>,
    ) {
        let worker = Arc::clone(worker);
        let stop = stop.clone();
        tasks.spawn(async move { worker.process(job, stop).await });
    }

    /// Waits for the job's slot in the schedule, then makes one attempt.
    async fn process(&self, job: DeliveryJob, stop: watch::Receiver<bool>) -> JobOutcome {
        let delay = self.schedule.delay_for_attempt(job.attempt);
        if !delay.is_zero() {
            tracing::debug!(
                webhook_id = %job.webhook_id,
                attempt = job.attempt,
                delay = ?delay,
                "Waiting before delivery attempt"
            );
        }

        tokio::select! {
            biased;
            () = stopped(stop.clone()) => return JobOutcome::Abandoned(job),
            () = self.sleeper.sleep(delay) => {}
        }

        let Ok(_permit) = self.permits.acquire().await else {
            return JobOutcome::Abandoned(job);
        };
        if *stop.borrow() {
            return JobOutcome::Abandoned(job);
        }

        let result = self
            .deliverer
            .deliver_until(&job.request(), stopped(stop.clone()))
            .await;

        match result {
            Ok(()) => JobOutcome::Delivered,
            Err(e) if e.is_delivery_failure() => {
                if !self.schedule.should_retry(job.attempt) {
                    JobOutcome::Exhausted(job, e)
                } else if *stop.borrow() {
                    JobOutcome::Abandoned(job)
                } else {
                    JobOutcome::Retry(job.next_attempt())
                }
            }
            Err(DeliveryError::Cancelled) => JobOutcome::Abandoned(job),
            Err(e) => JobOutcome::Rejected(job, e),
        }
    }

    /// Records an outcome; returns the job to run again, if any.
    fn settle(&self, outcome: JobOutcome, report: &mut WorkerReport) -> Option<DeliveryJob> {
        match outcome {
            JobOutcome::Delivered => {
                report.delivered += 1;
                None
            }
            JobOutcome::Retry(job) => {
                tracing::info!(
                    webhook_id = %job.webhook_id,
                    event = %job.event,
                    next_attempt = job.attempt,
                    delay = ?self.schedule.delay_for_attempt(job.attempt),
                    "Scheduling redelivery"
                );
                report.retried += 1;
                Some(job)
            }
            JobOutcome::Exhausted(job, e) => {
                tracing::warn!(
                    webhook_id = %job.webhook_id,
                    event = %job.event,
                    attempts = job.attempt,
                    error = %e,
                    "Giving up on delivery after final attempt"
                );
                report.failed += 1;
                None
            }
            JobOutcome::Rejected(job, e) => {
                tracing::error!(
                    webhook_id = %job.webhook_id,
                    event = %job.event,
                    attempt = job.attempt,
                    error = %e,
                    "Dropping undeliverable job"
                );
                report.dropped += 1;
                None
            }
            JobOutcome::Abandoned(job) => {
                log_abandoned(&job);
                report.dropped += 1;
                None
            }
        }
    }
}

/// Completes once the stop flag is raised (or its sender is gone).
async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|&stop| stop).await;
}

fn log_abandoned(job: &DeliveryJob) {
    tracing::warn!(
        webhook_id = %job.webhook_id,
        event = %job.event,
        attempt = job.attempt,
        "Delivery abandoned at shutdown"
    );
}
