//! In-process queue broker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{MessageQueue, OutboundMessage, QueueError, QueueRecord};

/// In-memory [`MessageQueue`] with the delivery semantics the pipeline
/// relies on: delayed delivery, per-endpoint FIFO deduplication and group
/// ordering, and explicit redelivery of records whose activation failed.
///
/// Clones share the same queues. Nothing survives a process restart.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerState>,
}

#[derive(Debug)]
struct BrokerState {
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<QueueRecord>>>,
    /// `endpoint\0dedup_id` -> time first accepted
    seen: Mutex<HashMap<String, Instant>>,
    dedup_window: Duration,
}

impl MemoryBroker {
    /// Default deduplication window (5 minutes).
    pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(5 * 60);

    /// Creates a broker with the default deduplication window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dedup_window(Self::DEFAULT_DEDUP_WINDOW)
    }

    /// Creates a broker that collapses messages with a repeated dedup id
    /// for `window` after the first one was accepted.
    #[must_use]
    pub fn with_dedup_window(window: Duration) -> Self {
        Self {
            inner: Arc::new(BrokerState {
                queues: Mutex::new(HashMap::new()),
                seen: Mutex::new(HashMap::new()),
                dedup_window: window,
            }),
        }
    }

    /// Registers a queue and returns its consumer.
    ///
    /// Declaring an endpoint again replaces the previous consumer, which
    /// then drains whatever it already holds and ends.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Poisoned`] if broker state is unusable.
    pub fn declare(&self, endpoint: impl Into<String>) -> Result<QueueConsumer, QueueError> {
        let endpoint = endpoint.into();
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner
            .queues
            .lock()
            .map_err(|_| QueueError::Poisoned)?
            .insert(endpoint.clone(), tx);

        Ok(QueueConsumer {
            endpoint,
            broker: self.clone(),
            stream: UnboundedReceiverStream::new(rx),
            groups: GroupGate::default(),
        })
    }

    /// Puts a record back on its queue after `delay`, counting one more receive.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the endpoint is unknown or closed.
    pub fn redeliver(
        &self,
        endpoint: &str,
        record: QueueRecord,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let record = QueueRecord {
            receive_count: record.receive_count.saturating_add(1),
            ..record
        };
        self.push(endpoint, record, delay)
    }

    fn sender(&self, endpoint: &str) -> Result<mpsc::UnboundedSender<QueueRecord>, QueueError> {
        let queues = self.inner.queues.lock().map_err(|_| QueueError::Poisoned)?;
        let sender = queues
            .get(endpoint)
            .ok_or_else(|| QueueError::UnknownQueue(endpoint.to_string()))?;

        if sender.is_closed() {
            return Err(QueueError::Closed(endpoint.to_string()));
        }
        Ok(sender.clone())
    }

    /// Returns true if `dedup_id` was already accepted on `endpoint` within
    /// the window, otherwise remembers it.
    fn is_duplicate(&self, endpoint: &str, dedup_id: &str) -> Result<bool, QueueError> {
        let now = Instant::now();
        let window = self.inner.dedup_window;
        let mut seen = self.inner.seen.lock().map_err(|_| QueueError::Poisoned)?;

        seen.retain(|_, accepted| now.duration_since(*accepted) < window);

        let key = dedup_key(endpoint, dedup_id);
        if seen.contains_key(&key) {
            return Ok(true);
        }
        seen.insert(key, now);
        Ok(false)
    }

    /// Drops a remembered dedup id whose message never made it onto the queue.
    fn forget(&self, endpoint: &str, dedup_id: &str) {
        if let Ok(mut seen) = self.inner.seen.lock() {
            seen.remove(&dedup_key(endpoint, dedup_id));
        }
    }

    fn push(&self, endpoint: &str, record: QueueRecord, delay: Duration) -> Result<(), QueueError> {
        let sender = self.sender(endpoint)?;

        if delay.is_zero() {
            return sender
                .send(record)
                .map_err(|_| QueueError::Closed(endpoint.to_string()));
        }

        let endpoint = endpoint.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(record).is_err() {
                tracing::warn!("Dropping delayed message: queue '{endpoint}' closed");
            }
        });
        Ok(())
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue for MemoryBroker {
    async fn send(&self, message: OutboundMessage) -> Result<(), QueueError> {
        let OutboundMessage {
            endpoint,
            body,
            delay,
            group_id,
            dedup_id,
        } = message;

        if let Some(dedup_id) = &dedup_id {
            if self.is_duplicate(&endpoint, dedup_id)? {
                tracing::debug!("Collapsed duplicate message {dedup_id} on '{endpoint}'");
                return Ok(());
            }
        }

        let record = QueueRecord {
            group_id,
            ..QueueRecord::new(body)
        };
        let result = self.push(&endpoint, record, delay);

        // A rejected message must not block a later send with the same id.
        if result.is_err() {
            if let Some(dedup_id) = &dedup_id {
                self.forget(&endpoint, dedup_id);
            }
        }
        result
    }
}

fn dedup_key(endpoint: &str, dedup_id: &str) -> String {
    format!("{endpoint}\0{dedup_id}")
}

/// Receiving end of one [`MemoryBroker`] queue.
///
/// Records are handed out one at a time. Asking for the next record settles
/// the previous one, unless it was handed back with
/// [`redeliver`](Self::redeliver).
#[derive(Debug)]
pub struct QueueConsumer {
    endpoint: String,
    broker: MemoryBroker,
    stream: UnboundedReceiverStream<QueueRecord>,
    groups: GroupGate,
}

impl QueueConsumer {
    /// The endpoint this consumer reads from.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Waits for the next record.
    ///
    /// Records of a group whose previous record is still unsettled are held
    /// back and handed out, in send order, once it settles.
    ///
    /// Returns `None` once the queue has been replaced and drained.
    pub async fn recv(&mut self) -> Option<QueueRecord> {
        self.groups.settle_current();

        loop {
            if let Some(record) = self.groups.next_ready() {
                return Some(record);
            }

            let record = self.stream.next().await?;
            if let Some(record) = self.groups.admit(record) {
                return Some(record);
            }
        }
    }

    /// Puts the last received record back on the queue after `delay`,
    /// counting one more receive.
    ///
    /// Its group stays blocked until the redelivered record is received and
    /// settled.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the queue is closed. The group is then
    /// released so later records are not stuck behind the lost one.
    pub fn redeliver(&mut self, record: QueueRecord, delay: Duration) -> Result<(), QueueError> {
        let group = record.group_id.clone();
        if let Some(group) = &group {
            self.groups.await_redelivery(group);
        }

        let result = self.broker.redeliver(&self.endpoint, record, delay);
        if result.is_err() {
            if let Some(group) = &group {
                self.groups.abandon_redelivery(group);
            }
        }
        result
    }
}

/// Per-group delivery state of one consumer.
#[derive(Debug, Default)]
struct GroupGate {
    /// Blocked groups and the records waiting behind them, in send order
    held: HashMap<String, VecDeque<QueueRecord>>,
    /// Groups whose blocking record is waiting to be redelivered
    redelivering: HashSet<String>,
    /// Group of the record currently handed out
    current: Option<String>,
    /// Released records to hand out before reading the channel
    ready: VecDeque<QueueRecord>,
}

impl GroupGate {
    fn settle_current(&mut self) {
        if let Some(group) = self.current.take() {
            self.release(&group);
        }
    }

    fn release(&mut self, group: &str) {
        let next = self.held.get_mut(group).and_then(VecDeque::pop_front);
        match next {
            // The group stays blocked by the record just released.
            Some(record) => self.ready.push_back(record),
            None => {
                self.held.remove(group);
            }
        }
    }

    fn next_ready(&mut self) -> Option<QueueRecord> {
        let record = self.ready.pop_front()?;
        self.current.clone_from(&record.group_id);
        Some(record)
    }

    /// Returns the record if it may be handed out now, otherwise holds it.
    fn admit(&mut self, record: QueueRecord) -> Option<QueueRecord> {
        let Some(group) = record.group_id.clone() else {
            self.current = None;
            return Some(record);
        };

        if !self.held.contains_key(&group) {
            self.redelivering.remove(&group);
            self.held.insert(group.clone(), VecDeque::new());
            self.current = Some(group);
            return Some(record);
        }

        // First sends always have a receive count of 1, so only the
        // redelivered blocker can pass a blocked group.
        if record.receive_count > 1 && self.redelivering.remove(&group) {
            self.current = Some(group);
            return Some(record);
        }

        if let Some(waiting) = self.held.get_mut(&group) {
            waiting.push_back(record);
        }
        None
    }

    fn await_redelivery(&mut self, group: &str) {
        if self.current.as_deref() == Some(group) {
            self.current = None;
        }
        self.redelivering.insert(group.to_string());
    }

    fn abandon_redelivery(&mut self, group: &str) {
        self.redelivering.remove(group);
        self.release(group);
    }
}
