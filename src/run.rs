//! Command execution.
//!
//! Each subcommand maps to one async handler here. The handlers own
//! user-facing output on stdout; diagnostics go through tracing.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::signal;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use url::Url;

use hookcast::config::{Command, ValidatedConfig};
use hookcast::dispatch::{self, DeliveryJob, Dispatcher, Worker};
use hookcast::model::{Secret, Webhook, WebhookId, event};
use hookcast::store::{FileRepository, StoreError};
use hookcast::webhook::{
    Deliverer, DeliveryError, DeliveryRequest, HttpError, ReqwestClient, sign, verify,
};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Failed to build the HTTP client.
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[source] HttpError),

    /// The endpoint URL given to `register` is unusable.
    #[error("Invalid webhook URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Reason for rejection
        reason: String,
    },

    /// The `--data` argument is not valid JSON.
    #[error("Invalid event data: {0}")]
    InvalidData(#[source] serde_json::Error),

    /// The payload to sign or verify could not be read.
    #[error("Failed to read payload: {0}")]
    ReadPayload(#[source] std::io::Error),

    /// `verify` was given a signature that does not match.
    #[error("Signature does not match payload")]
    SignatureMismatch,

    /// The webhook store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A single delivery attempt failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Deliverer used by the CLI: real HTTP, webhooks from the store file.
type AppDeliverer = Deliverer<ReqwestClient, FileRepository>;

/// Executes a subcommand.
///
/// # Errors
///
/// Returns the first error the command hits; see [`RunError`].
///
/// # Coverage Note
///
/// This function is excluded from coverage because `relay` requires
/// signal handling and stdin.
#[cfg(not(tarpaulin_include))]
pub async fn execute(command: Command, config: ValidatedConfig) -> Result<(), RunError> {
    match command {
        // Handled before configuration is loaded.
        Command::Init { .. } => Ok(()),
        Command::Register {
            url,
            secret,
            events,
        } => {
            let id = register(&config, &url, Secret::new(secret), events).await?;
            println!("{id}");
            Ok(())
        }
        Command::List => list(&config).await,
        Command::Deliver {
            webhook_id,
            event,
            data,
            secret,
            attempt,
        } => {
            let data = parse_data(data.as_deref())?;
            let secret = Secret::new(secret);
            let request = DeliveryRequest::new(webhook_id, &event, data.as_ref(), &secret)
                .with_attempt(attempt);
            build_deliverer(&config)?.deliver(&request).await?;
            println!("Delivered {event} to {webhook_id} (attempt {attempt})");
            Ok(())
        }
        Command::Sign { secret, file } => {
            let payload = read_payload(file.as_deref()).await?;
            println!("{}", sign(&payload, secret.as_bytes()));
            Ok(())
        }
        Command::Verify {
            secret,
            signature,
            file,
        } => {
            let payload = read_payload(file.as_deref()).await?;
            if !verify(&payload, secret.as_bytes(), &signature) {
                return Err(RunError::SignatureMismatch);
            }
            println!("Signature OK");
            Ok(())
        }
        Command::Relay { .. } => relay(&config).await,
    }
}

fn build_deliverer(config: &ValidatedConfig) -> Result<AppDeliverer, RunError> {
    let client = ReqwestClient::with_timeout(config.timeout).map_err(RunError::HttpClient)?;

    Ok(Deliverer::new(client, FileRepository::new(&config.store_path))
        .with_health_policy(config.health_policy))
}

/// Adds a webhook to the store and returns its id.
async fn register(
    config: &ValidatedConfig,
    url: &str,
    secret: Secret,
    events: Vec<String>,
) -> Result<WebhookId, RunError> {
    let url = parse_endpoint(url)?;

    for name in events.iter().filter(|name| !event::is_known(name)) {
        tracing::warn!(event = %name, "Subscribing to an event that is never emitted");
    }

    let webhook = Webhook::new(url, secret).with_events(events);
    let id = webhook.id;
    FileRepository::new(&config.store_path)
        .insert(webhook)
        .await?;

    tracing::info!(webhook_id = %id, store = %config.store_path.display(), "Webhook registered");
    Ok(id)
}

async fn list(config: &ValidatedConfig) -> Result<(), RunError> {
    let webhooks = FileRepository::new(&config.store_path).list().await?;

    if webhooks.is_empty() {
        println!(
            "No webhooks registered in {}",
            config.store_path.display()
        );
    }
    for webhook in &webhooks {
        println!("{}", describe(webhook));
    }
    Ok(())
}

/// Reads jobs from stdin and runs them through a worker until stdin is
/// exhausted and every retry has finished, or until Ctrl+C.
///
/// Excluded from coverage - requires signal handling and stdin.
#[cfg(not(tarpaulin_include))]
async fn relay(config: &ValidatedConfig) -> Result<(), RunError> {
    let deliverer = build_deliverer(config)?;
    let (dispatcher, jobs) = dispatch::channel(config.queue_capacity);
    let worker = Worker::new(deliverer, config.retry_schedule.clone())
        .with_concurrency(config.concurrency);

    tracing::info!(
        concurrency = config.concurrency,
        attempts = config.retry_schedule.max_attempts(),
        "Relaying delivery jobs from stdin"
    );

    let producer = tokio::spawn(enqueue_lines(
        BufReader::new(tokio::io::stdin()),
        dispatcher,
    ));
    let report = worker.run(jobs, shutdown_signal()).await;
    producer.abort();

    println!("{report}");
    Ok(())
}

/// Enqueues one job per input line until EOF or the queue closes.
///
/// Blank lines are ignored and malformed lines are skipped with a warning.
/// Returns the number of jobs enqueued.
async fn enqueue_lines<R>(reader: R, dispatcher: Dispatcher) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut line_number = 0_usize;
    let mut enqueued = 0;

    while let Some(line) = lines.next().await {
        line_number += 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read job input: {e}");
                break;
            }
        };

        let Some(job) = parse_job_line(&line, line_number) else {
            continue;
        };

        if dispatcher.enqueue(job).await.is_err() {
            tracing::debug!("Delivery queue closed, no longer reading input");
            break;
        }
        enqueued += 1;
    }

    tracing::debug!(enqueued, "Finished reading job input");
    enqueued
}

fn parse_job_line(line: &str, line_number: usize) -> Option<DeliveryJob> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(job) => Some(job),
        Err(e) => {
            tracing::warn!(line = line_number, error = %e, "Skipping malformed job");
            None
        }
    }
}

fn parse_endpoint(url: &str) -> Result<Url, RunError> {
    let parsed = Url::parse(url).map_err(|e| RunError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RunError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(parsed)
}

fn parse_data(data: Option<&str>) -> Result<Option<Value>, RunError> {
    data.map(serde_json::from_str)
        .transpose()
        .map_err(RunError::InvalidData)
}

/// Reads a payload from a file, or from stdin when no file is given.
///
/// Bytes are used exactly as read: a trailing newline is part of the payload.
async fn read_payload(file: Option<&Path>) -> Result<Vec<u8>, RunError> {
    match file {
        Some(path) => tokio::fs::read(path).await.map_err(RunError::ReadPayload),
        None => {
            let mut payload = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut payload)
                .await
                .map_err(RunError::ReadPayload)?;
            Ok(payload)
        }
    }
}

/// One-line summary of a webhook for `list`.
fn describe(webhook: &Webhook) -> String {
    let events = if webhook.subscribed_events.is_empty() {
        "-".to_string()
    } else {
        webhook
            .subscribed_events
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    };

    format!(
        "{id}  {status:<8}  failures={failures:<3}  {url}  events={events}",
        id = webhook.id,
        status = webhook.status(),
        failures = webhook.health.consecutive_failures,
        url = webhook.url,
    )
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutdown signal received, stopping...");
}
