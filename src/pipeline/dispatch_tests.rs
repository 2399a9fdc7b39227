//! Tests for `DispatchStage`.

use super::{DispatchStage, Outcome, POLL_INTERVAL, Stage, StageError};
use crate::carrier::{Carrier, CarrierError, CarrierStatus, JobHandle, SubmitRequest};
use crate::message::{FaxJob, FaxStatus, Message, WebhookNotification};
use crate::queue::mock::RecordingQueue;
use crate::queue::{Publisher, QueueEndpoints, QueueRecord};
use crate::time::{Clock, Sleeper};
use crate::transport::HttpError;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

const MAX_ATTEMPTS: u32 = 10;
const NOW: u64 = 1_590_590_198;

/// Carrier that accepts or rejects submissions and replays a status script.
#[derive(Debug)]
struct ScriptedCarrier {
    submit_error: Mutex<Option<CarrierError>>,
    statuses: Mutex<Vec<Result<CarrierStatus, CarrierError>>>,
    submissions: Mutex<Vec<SubmitRequest>>,
    fetches: Mutex<Vec<JobHandle>>,
}

impl ScriptedCarrier {
    fn new(statuses: Vec<Result<CarrierStatus, CarrierError>>) -> Self {
        Self {
            submit_error: Mutex::new(None),
            statuses: Mutex::new(statuses),
            submissions: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    fn with_statuses(codes: &[&str]) -> Self {
        Self::new(codes.iter().map(|c| Ok(CarrierStatus::new(*c))).collect())
    }

    fn rejecting(error: CarrierError) -> Self {
        let carrier = Self::new(vec![]);
        *carrier.submit_error.lock().unwrap() = Some(error);
        carrier
    }

    fn submissions(&self) -> Vec<SubmitRequest> {
        self.submissions.lock().unwrap().clone()
    }

    fn fetches(&self) -> Vec<JobHandle> {
        self.fetches.lock().unwrap().clone()
    }
}

impl Carrier for ScriptedCarrier {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobHandle, CarrierError> {
        self.submissions.lock().unwrap().push(request.clone());
        match self.submit_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(JobHandle::new("FX123")),
        }
    }

    async fn fetch_status(&self, handle: &JobHandle) -> Result<CarrierStatus, CarrierError> {
        self.fetches.lock().unwrap().push(handle.clone());
        self.statuses.lock().unwrap().remove(0)
    }
}

impl Carrier for Arc<ScriptedCarrier> {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobHandle, CarrierError> {
        (**self).submit(request).await
    }

    async fn fetch_status(&self, handle: &JobHandle) -> Result<CarrierStatus, CarrierError> {
        (**self).fetch_status(handle).await
    }
}

/// Sleeper that records requested durations and returns immediately.
#[derive(Debug, Default)]
struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for Arc<RecordingSleeper> {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(self.0)
    }
}

struct Harness {
    carrier: Arc<ScriptedCarrier>,
    queue: Arc<RecordingQueue>,
    sleeper: Arc<RecordingSleeper>,
    stage: DispatchStage<
        Arc<ScriptedCarrier>,
        Arc<RecordingQueue>,
        Arc<RecordingSleeper>,
        FixedClock,
    >,
}

fn harness(carrier: ScriptedCarrier) -> Harness {
    let carrier = Arc::new(carrier);
    let queue = Arc::new(RecordingQueue::new());
    let sleeper = Arc::new(RecordingSleeper::default());
    let publisher = Publisher::new(
        queue.clone(),
        QueueEndpoints::new("fax-queue-url", "retry-queue-url", "webhook-queue-url"),
        Duration::from_secs(100),
    );
    let stage = DispatchStage::new(carrier.clone(), publisher, MAX_ATTEMPTS)
        .with_sleeper(sleeper.clone())
        .with_clock(FixedClock(NOW));

    Harness {
        carrier,
        queue,
        sleeper,
        stage,
    }
}

fn job(retry_count: u32) -> FaxJob {
    FaxJob::new("a", "b", "c", "d").with_retry_count(retry_count)
}

fn record(job: &FaxJob) -> QueueRecord {
    QueueRecord::new(job.encode().unwrap())
}

fn webhooks(queue: &RecordingQueue) -> Vec<WebhookNotification> {
    queue
        .sent_to("webhook-queue-url")
        .iter()
        .map(|m| WebhookNotification::decode(&m.body).unwrap())
        .collect()
}

fn retries(queue: &RecordingQueue) -> Vec<FaxJob> {
    queue
        .sent_to("retry-queue-url")
        .iter()
        .map(|m| FaxJob::decode(&m.body).unwrap())
        .collect()
}

mod outcomes {
    use super::*;

    #[tokio::test]
    async fn delivered_fax_reports_success_without_retry() {
        let h = harness(ScriptedCarrier::with_statuses(&["delivered"]));

        h.stage.handle(&[record(&job(0))]).await.unwrap();

        let webhooks = webhooks(&h.queue);
        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[0].callback_url, "d");
        assert_eq!(webhooks[0].payload.fax_id, "a");
        assert_eq!(webhooks[0].payload.status, FaxStatus::Sent);
        assert_eq!(webhooks[0].payload.message, "Fax sent successfully");
        assert_eq!(webhooks[0].payload.timestamp, 1_590_590_198);
        assert!(retries(&h.queue).is_empty());
    }

    #[tokio::test]
    async fn failure_with_attempts_left_reports_and_schedules_retry() {
        let h = harness(ScriptedCarrier::with_statuses(&["failed"]));

        let outcome = h.stage.dispatch(&job(8)).await.unwrap();

        assert_eq!(outcome, Outcome::TemporaryFailure);
        let webhooks = webhooks(&h.queue);
        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[0].payload.status, FaxStatus::TemporaryFailure);
        assert_eq!(
            webhooks[0].payload.message,
            "Failed to deliver fax (attempt 9 of 10). Fax status: failed"
        );

        let retries = retries(&h.queue);
        assert_eq!(retries, vec![job(9)]);
        let sent = h.queue.sent_to("retry-queue-url");
        assert_eq!(sent[0].delay, Duration::from_secs(100));
    }

    #[tokio::test]
    async fn failure_on_last_attempt_is_permanent() {
        let h = harness(ScriptedCarrier::with_statuses(&["busy"]));

        let outcome = h.stage.dispatch(&job(9)).await.unwrap();

        assert_eq!(outcome, Outcome::PermanentFailure);
        let webhooks = webhooks(&h.queue);
        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[0].payload.status, FaxStatus::PermanentFailure);
        assert_eq!(
            webhooks[0].payload.message,
            "Failed to deliver fax after 10 tries. Last attempt status: busy"
        );
        assert!(retries(&h.queue).is_empty());
    }

    #[tokio::test]
    async fn unknown_status_counts_as_failure() {
        let h = harness(ScriptedCarrier::with_statuses(&["something-new"]));

        let outcome = h.stage.dispatch(&job(0)).await.unwrap();

        assert_eq!(outcome, Outcome::TemporaryFailure);
        assert_eq!(retries(&h.queue), vec![job(1)]);
    }

    #[tokio::test]
    async fn notification_is_enqueued_before_retry() {
        let h = harness(ScriptedCarrier::with_statuses(&["no-answer"]));

        h.stage.dispatch(&job(0)).await.unwrap();

        assert_eq!(
            h.queue.attempted_endpoints(),
            vec!["webhook-queue-url", "retry-queue-url"]
        );
    }

    #[tokio::test]
    async fn submission_uses_job_fields() {
        let h = harness(ScriptedCarrier::with_statuses(&["delivered"]));

        h.stage.dispatch(&job(3)).await.unwrap();

        let submissions = h.carrier.submissions();
        assert_eq!(submissions, vec![SubmitRequest::for_job(&job(3))]);
        assert_eq!(submissions[0].ttl_minutes, 5);
        assert!(!submissions[0].store_media);
    }
}

mod polling {
    use super::*;

    #[tokio::test]
    async fn pending_statuses_sleep_between_polls() {
        let h = harness(ScriptedCarrier::with_statuses(&[
            "queued",
            "processing",
            "sending",
            "delivered",
        ]));

        let status = h.stage.poll_until_terminal(JobHandle::new("FX123")).await;

        assert_eq!(status, CarrierStatus::new("delivered"));
        assert_eq!(h.sleeper.sleeps(), vec![POLL_INTERVAL; 3]);
        assert_eq!(POLL_INTERVAL, Duration::from_secs(15));
        assert_eq!(h.carrier.fetches().len(), 4);
    }

    #[tokio::test]
    async fn pending_then_delivered_takes_success_branch() {
        let h = harness(ScriptedCarrier::with_statuses(&[
            "queued",
            "processing",
            "sending",
            "delivered",
        ]));

        let outcome = h.stage.dispatch(&job(0)).await.unwrap();

        assert_eq!(outcome, Outcome::Sent);
        assert_eq!(h.sleeper.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn terminal_first_poll_never_sleeps() {
        let h = harness(ScriptedCarrier::with_statuses(&["failed"]));

        h.stage.dispatch(&job(0)).await.unwrap();

        assert!(h.sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn fetch_errors_do_not_abort_polling() {
        let h = harness(ScriptedCarrier::new(vec![
            Ok(CarrierStatus::new("queued")),
            Err(CarrierError::Http(HttpError::Timeout)),
            Err(CarrierError::Api {
                status: http::StatusCode::SERVICE_UNAVAILABLE,
                body: None,
            }),
            Ok(CarrierStatus::new("sending")),
            Ok(CarrierStatus::new("delivered")),
        ]));

        let status = h.stage.poll_until_terminal(JobHandle::new("FX123")).await;

        assert_eq!(status.as_str(), "delivered");
        assert_eq!(h.carrier.fetches().len(), 5);
        assert_eq!(h.sleeper.sleeps().len(), 4);
    }

    #[tokio::test]
    async fn polls_the_handle_returned_by_submit() {
        let h = harness(ScriptedCarrier::with_statuses(&["queued", "delivered"]));

        h.stage.dispatch(&job(0)).await.unwrap();

        assert_eq!(
            h.carrier.fetches(),
            vec![JobHandle::new("FX123"), JobHandle::new("FX123")]
        );
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn submit_error_fails_activation_without_messages() {
        let h = harness(ScriptedCarrier::rejecting(CarrierError::Api {
            status: http::StatusCode::BAD_REQUEST,
            body: Some("invalid number".to_string()),
        }));

        let err = h.stage.handle(&[record(&job(0))]).await.unwrap_err();

        assert!(matches!(err, StageError::Submit(CarrierError::Api { .. })));
        assert!(h.carrier.fetches().is_empty());
        assert!(h.queue.attempted_endpoints().is_empty());
    }

    #[tokio::test]
    async fn success_notification_error_is_swallowed() {
        let h = harness(ScriptedCarrier::with_statuses(&["delivered"]));
        h.queue.fail_endpoint("webhook-queue-url");

        let outcome = h.stage.dispatch(&job(0)).await.unwrap();

        assert_eq!(outcome, Outcome::Sent);
        assert_eq!(h.queue.attempted_endpoints(), vec!["webhook-queue-url"]);
    }

    #[tokio::test]
    async fn temporary_failure_notification_error_propagates_before_retry() {
        let h = harness(ScriptedCarrier::with_statuses(&["failed"]));
        h.queue.fail_endpoint("webhook-queue-url");

        let err = h.stage.dispatch(&job(0)).await.unwrap_err();

        assert!(matches!(
            err,
            StageError::Enqueue {
                what: "webhook notification",
                ..
            }
        ));
        assert_eq!(h.queue.attempted_endpoints(), vec!["webhook-queue-url"]);
    }

    #[tokio::test]
    async fn retry_enqueue_error_propagates() {
        let h = harness(ScriptedCarrier::with_statuses(&["failed"]));
        h.queue.fail_endpoint("retry-queue-url");

        let err = h.stage.dispatch(&job(0)).await.unwrap_err();

        assert!(matches!(err, StageError::Enqueue { what: "retry job", .. }));
        assert_eq!(webhooks(&h.queue).len(), 1);
    }

    #[tokio::test]
    async fn permanent_failure_notification_error_propagates() {
        let h = harness(ScriptedCarrier::with_statuses(&["busy"]));
        h.queue.fail_endpoint("webhook-queue-url");

        let err = h.stage.dispatch(&job(9)).await.unwrap_err();

        assert!(matches!(err, StageError::Enqueue { .. }));
    }

    #[tokio::test]
    async fn malformed_record_is_a_decode_error() {
        let h = harness(ScriptedCarrier::with_statuses(&[]));

        let err = h.stage.handle(&[QueueRecord::new("not json")]).await.unwrap_err();

        assert!(matches!(err, StageError::Decode(_)));
        assert!(h.carrier.submissions().is_empty());
    }

    #[tokio::test]
    #[should_panic(expected = "dispatch stage expects exactly one record per activation, got 2")]
    async fn batch_of_two_panics() {
        let h = harness(ScriptedCarrier::with_statuses(&["delivered", "delivered"]));

        let _ = h.stage.handle(&[record(&job(0)), record(&job(1))]).await;
    }

    #[test]
    #[should_panic(expected = "max_attempts must be at least 1")]
    fn zero_attempt_budget_panics() {
        let queue = Arc::new(RecordingQueue::new());
        let publisher = Publisher::new(
            queue,
            QueueEndpoints::new("s", "r", "w"),
            Duration::from_secs(1),
        );
        let _ = DispatchStage::new(Arc::new(ScriptedCarrier::new(vec![])), publisher, 0);
    }
}
