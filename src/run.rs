//! Application execution logic.
//!
//! This module wires the three pipeline stages to an in-process broker,
//! feeds jobs read from stdin into the submission queue, and keeps the
//! workers running until a shutdown signal arrives.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::task::JoinSet;

use fax_relay::carrier::TwilioCarrier;
use fax_relay::config::ValidatedConfig;
use fax_relay::message::{FaxJob, Message};
use fax_relay::pipeline::{DispatchStage, NotifyStage, RetryStage, Stage};
use fax_relay::queue::{
    MemoryBroker, MessageQueue, Publisher, QueueConsumer, QueueError, QueueRecord,
};
use fax_relay::transport::{HttpError, ReqwestClient};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// A pipeline queue could not be set up.
    #[error("Failed to set up queue: {0}")]
    Queue(#[from] QueueError),

    /// The callback HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[source] HttpError),

    /// Reading jobs from stdin failed.
    #[error("Failed to read jobs: {0}")]
    Intake(#[source] std::io::Error),

    /// A worker task ended while the application was running.
    #[error("Worker stopped unexpectedly: {0}")]
    WorkerStopped(String),
}

/// Redelivery settings shared by all workers.
#[derive(Debug, Clone, Copy)]
struct WorkerOptions {
    activation_timeout: Duration,
    redelivery_delay: Duration,
    max_receive_count: u32,
}

impl From<&ValidatedConfig> for WorkerOptions {
    fn from(config: &ValidatedConfig) -> Self {
        Self {
            activation_timeout: config.activation_timeout,
            redelivery_delay: config.redelivery_delay,
            max_receive_count: config.max_receive_count,
        }
    }
}

/// What happens to a record after a failed activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Redeliver,
    DeadLetter,
}

impl Disposition {
    const fn after_failure(receive_count: u32, max_receive_count: u32) -> Self {
        if receive_count >= max_receive_count {
            Self::DeadLetter
        } else {
            Self::Redeliver
        }
    }
}

/// Executes the pipeline until a shutdown signal (Ctrl+C or SIGTERM).
///
/// This function:
/// 1. Declares the submission, retry and webhook queues
/// 2. Builds the dispatch, retry and notify stages
/// 3. Spawns one sequential worker per queue
/// 4. Reads JSON fax jobs from stdin into the submission queue
///
/// Closing stdin stops intake only; the workers keep draining the queues.
///
/// # Errors
///
/// Returns an error if:
/// - A queue cannot be declared
/// - The HTTP client cannot be built
/// - Reading stdin fails
/// - A worker task stops unexpectedly
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<(), RunError> {
    let broker = MemoryBroker::new();
    let submission = broker.declare(&config.endpoints.submission)?;
    let retry = broker.declare(&config.endpoints.retry)?;
    let webhook = broker.declare(&config.endpoints.webhook)?;

    let publisher = Publisher::new(
        broker,
        config.endpoints.clone(),
        config.backoff_delay,
    );
    let options = WorkerOptions::from(&config);

    let carrier_client =
        ReqwestClient::with_timeout(config.carrier_timeout).map_err(RunError::HttpClient)?;
    let carrier = TwilioCarrier::new(
        carrier_client,
        config.credentials.clone(),
        &config.from_number,
        config.carrier_url.clone(),
    );
    tracing::debug!(
        "Sending faxes from {} via {}",
        carrier.from_number(),
        carrier.base_url()
    );
    let callback_client =
        ReqwestClient::with_timeout(config.webhook_timeout).map_err(RunError::HttpClient)?;

    let mut workers = JoinSet::new();
    workers.spawn(run_worker(
        DispatchStage::new(carrier, publisher.clone(), config.max_fax_attempts),
        submission,
        options,
    ));
    workers.spawn(run_worker(
        RetryStage::new(publisher.clone()),
        retry,
        options,
    ));
    workers.spawn(run_worker(
        NotifyStage::new(callback_client),
        webhook,
        options,
    ));

    tracing::info!("Pipeline running, reading fax jobs from stdin");

    let intake = intake_jobs(BufReader::new(tokio::io::stdin()), &publisher);
    tokio::pin!(intake);
    let mut intake_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                tracing::info!("Shutdown signal received, stopping...");
                break Ok(());
            }

            accepted = &mut intake, if intake_open => {
                intake_open = false;
                match accepted {
                    Ok(count) => tracing::info!(
                        "Job intake closed after {count} job(s), workers keep running"
                    ),
                    Err(e) => break Err(e),
                }
            }

            Some(joined) = workers.join_next() => {
                let reason = match joined {
                    Ok(endpoint) => format!("queue '{endpoint}' closed"),
                    Err(e) => e.to_string(),
                };
                break Err(RunError::WorkerStopped(reason));
            }
        }
    };

    workers.shutdown().await;
    result
}

/// Consumes `consumer` one record at a time until the queue closes.
///
/// Failed activations are redelivered after the redelivery delay until the
/// record has been received `max_receive_count` times; then it is
/// dead-lettered (logged and dropped). Returns the queue's endpoint.
async fn run_worker<S: Stage>(
    stage: S,
    mut consumer: QueueConsumer,
    options: WorkerOptions,
) -> String {
    let endpoint = consumer.endpoint().to_string();
    tracing::debug!("{} worker consuming '{endpoint}'", stage.name());

    while let Some(record) = consumer.recv().await {
        let Err(reason) = activate(&stage, &record, options.activation_timeout).await else {
            continue;
        };

        match Disposition::after_failure(record.receive_count, options.max_receive_count) {
            Disposition::Redeliver => {
                tracing::warn!(
                    "{} activation failed (receive {} of {}), redelivering in {:?}: {reason}",
                    stage.name(),
                    record.receive_count,
                    options.max_receive_count,
                    options.redelivery_delay
                );
                if let Err(e) = consumer.redeliver(record, options.redelivery_delay) {
                    tracing::error!("Failed to redeliver record on '{endpoint}': {e}");
                }
            }
            Disposition::DeadLetter => {
                tracing::error!(
                    "{} activation failed {} time(s), dead-lettering record: {reason}; body: {}",
                    stage.name(),
                    record.receive_count,
                    record.body
                );
            }
        }
    }

    endpoint
}

/// Runs one activation of `stage` under a deadline.
///
/// Returns the failure reason if the stage errored or overran the deadline.
async fn activate<S: Stage>(
    stage: &S,
    record: &QueueRecord,
    deadline: Duration,
) -> Result<(), String> {
    match tokio::time::timeout(deadline, stage.handle(std::slice::from_ref(record))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("activation exceeded {}s deadline", deadline.as_secs())),
    }
}

/// Reads one JSON fax job per line and enqueues it for dispatch.
///
/// Blank lines are ignored; malformed lines and rejected enqueues are logged
/// and skipped. Returns the number of jobs accepted once `reader` hits EOF.
async fn intake_jobs<R, Q>(reader: R, publisher: &Publisher<Q>) -> Result<usize, RunError>
where
    R: AsyncBufRead + Unpin,
    Q: MessageQueue,
{
    let mut lines = reader.lines();
    let mut accepted = 0;

    while let Some(line) = lines.next_line().await.map_err(RunError::Intake)? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let job = match FaxJob::decode(line) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!("Skipping malformed job: {e}");
                continue;
            }
        };

        match publisher.enqueue_fax(&job).await {
            Ok(()) => {
                tracing::info!(fax_id = %job.fax_id, "Accepted fax job for {}", job.to);
                accepted += 1;
            }
            Err(e) => tracing::error!(fax_id = %job.fax_id, "Failed to enqueue fax job: {e}"),
        }
    }

    Ok(accepted)
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
}
