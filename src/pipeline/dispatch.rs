//! Dispatch stage: submit a fax, poll it to a terminal status, report.

use std::time::Duration;

use crate::carrier::{Carrier, CarrierStatus, JobHandle, SubmitRequest};
use crate::message::{FaxJob, Message, WebhookNotification, WebhookPayload};
use crate::queue::{MessageQueue, Publisher, QueueRecord};
use crate::time::{Clock, Sleeper, SystemClock, TokioSleeper, unix_seconds};

use super::{Outcome, Stage, StageError, single_record};

/// Wait between two carrier status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Consumes the submission queue.
///
/// For each job the stage submits the fax, polls the carrier every
/// [`POLL_INTERVAL`] until the status is terminal, then enqueues a webhook
/// notification and, after a failed attempt with budget left, a retry job.
///
/// # Type Parameters
///
/// - `C`: The carrier implementation
/// - `Q`: The queue the publisher sends to
/// - `S`: The sleeper used between polls (defaults to [`TokioSleeper`])
/// - `K`: The clock stamping notifications (defaults to [`SystemClock`])
#[derive(Debug)]
pub struct DispatchStage<C, Q, S = TokioSleeper, K = SystemClock> {
    carrier: C,
    publisher: Publisher<Q>,
    sleeper: S,
    clock: K,
    max_attempts: u32,
}

impl<C, Q> DispatchStage<C, Q> {
    /// Creates a dispatch stage with real time.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero.
    #[must_use]
    pub fn new(carrier: C, publisher: Publisher<Q>, max_attempts: u32) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        Self {
            carrier,
            publisher,
            sleeper: TokioSleeper,
            clock: SystemClock,
            max_attempts,
        }
    }
}

impl<C, Q, S, K> DispatchStage<C, Q, S, K> {
    /// Sets a custom sleeper for poll intervals.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> DispatchStage<C, Q, S2, K> {
        DispatchStage {
            carrier: self.carrier,
            publisher: self.publisher,
            sleeper,
            clock: self.clock,
            max_attempts: self.max_attempts,
        }
    }

    /// Sets a custom clock for notification timestamps.
    #[must_use]
    pub fn with_clock<K2>(self, clock: K2) -> DispatchStage<C, Q, S, K2> {
        DispatchStage {
            carrier: self.carrier,
            publisher: self.publisher,
            sleeper: self.sleeper,
            clock,
            max_attempts: self.max_attempts,
        }
    }
}

impl<C, Q, S, K> DispatchStage<C, Q, S, K>
where
    C: Carrier,
    Q: MessageQueue,
    S: Sleeper,
    K: Clock,
{
    /// Runs one attempt of `job` and reports its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Submit`] if the carrier rejects the submission,
    /// or [`StageError::Enqueue`] if a follow-up message could not be
    /// enqueued and the outcome's policy propagates that failure.
    pub async fn dispatch(&self, job: &FaxJob) -> Result<Outcome, StageError> {
        tracing::info!(
            fax_id = %job.fax_id,
            "Sending fax to {} (attempt {} of {})",
            job.to,
            job.attempt(),
            self.max_attempts
        );

        let handle = self
            .carrier
            .submit(&SubmitRequest::for_job(job))
            .await
            .map_err(StageError::Submit)?;
        tracing::debug!(fax_id = %job.fax_id, "Carrier accepted fax as {handle}");

        let status = self.poll_until_terminal(handle).await;
        let outcome = Outcome::decide(status.classify(), job, self.max_attempts);
        tracing::info!(fax_id = %job.fax_id, "Fax finished with status '{status}': {outcome:?}");

        self.report(job, outcome, &status).await?;
        Ok(outcome)
    }

    /// Polls the carrier until the fax reaches a terminal status.
    ///
    /// A failed status fetch is logged and retried after the next interval;
    /// it never ends the loop.
    pub async fn poll_until_terminal(&self, handle: JobHandle) -> CarrierStatus {
        loop {
            match self.carrier.fetch_status(&handle).await {
                Ok(status) if status.classify().is_terminal() => return status,
                Ok(status) => {
                    tracing::debug!("Fax {handle} has pending status '{status}', waiting");
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch status of fax {handle}, will poll again: {e}");
                }
            }
            self.sleeper.sleep(POLL_INTERVAL).await;
        }
    }

    /// Enqueues the notification first, then the retry if one is due.
    async fn report(
        &self,
        job: &FaxJob,
        outcome: Outcome,
        status: &CarrierStatus,
    ) -> Result<(), StageError> {
        let payload = WebhookPayload::at(
            &job.fax_id,
            outcome.fax_status(),
            self.notification_message(job, outcome, status),
            unix_seconds(self.clock.now()),
        );
        let notification = WebhookNotification::new(&job.callback_url, payload);

        let sent = self.publisher.enqueue_webhook(&notification).await;
        outcome
            .on_notification_error()
            .apply(sent, "webhook notification", &job.fax_id)?;

        if outcome.schedules_retry() {
            let retry = job.next_attempt();
            tracing::info!(
                fax_id = %job.fax_id,
                "Scheduling attempt {} in {:?}",
                retry.attempt(),
                self.publisher.backoff_delay()
            );
            let sent = self.publisher.enqueue_retry(&retry).await;
            outcome
                .on_retry_error()
                .apply(sent, "retry job", &job.fax_id)?;
        }

        Ok(())
    }

    fn notification_message(
        &self,
        job: &FaxJob,
        outcome: Outcome,
        status: &CarrierStatus,
    ) -> String {
        match outcome {
            Outcome::Sent => "Fax sent successfully".to_string(),
            Outcome::PermanentFailure => format!(
                "Failed to deliver fax after {} tries. Last attempt status: {status}",
                self.max_attempts
            ),
            Outcome::TemporaryFailure => format!(
                "Failed to deliver fax (attempt {} of {}). Fax status: {status}",
                job.attempt(),
                self.max_attempts
            ),
        }
    }
}

impl<C, Q, S, K> Stage for DispatchStage<C, Q, S, K>
where
    C: Carrier,
    Q: MessageQueue,
    S: Sleeper,
    K: Clock,
{
    fn name(&self) -> &'static str {
        "dispatch"
    }

    async fn handle(&self, records: &[QueueRecord]) -> Result<(), StageError> {
        let record = single_record(self.name(), records);
        let job = FaxJob::decode(&record.body)?;
        self.dispatch(&job).await.map(|_| ())
    }
}
