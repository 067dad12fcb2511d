use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;

use crate::{
    BusError, DeadLetter, EventBus, EventEnvelope, EventHandler, HandlerError, Offset, Result,
    RetryPolicy,
};

const DEFAULT_PARTITIONS: usize = 8;
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Clone)]
struct Record {
    sequence: u64,
    event: EventEnvelope,
}

#[derive(Debug)]
struct TopicLog {
    partitions: Vec<Vec<Record>>,
}

impl TopicLog {
    fn new(partitions: usize) -> Self {
        Self {
            partitions: vec![Vec::new(); partitions],
        }
    }
}

struct Inner {
    partitions: usize,
    retry: RetryPolicy,
    topics: RwLock<HashMap<String, TopicLog>>,
    /// Next offset to deliver, per (topic, group) and partition.
    committed: RwLock<HashMap<(String, String), Vec<u64>>>,
    dead_letters: RwLock<Vec<DeadLetter>>,
    next_sequence: AtomicU64,
    appended: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// In-memory event bus.
///
/// Every topic is split into a fixed number of partitions and every
/// subscription runs one worker task per partition, so events sharing a key
/// are handled strictly in order while different keys progress concurrently.
#[derive(Clone)]
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

impl InMemoryEventBus {
    /// Creates a bus with the default partition count and retry policy.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_PARTITIONS, RetryPolicy::default())
    }

    /// Creates a bus with an explicit partition count and redelivery policy.
    pub fn with_config(partitions: usize, retry: RetryPolicy) -> Self {
        let (appended, _) = watch::channel(0);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                partitions: partitions.max(1),
                retry,
                topics: RwLock::new(HashMap::new()),
                committed: RwLock::new(HashMap::new()),
                dead_letters: RwLock::new(Vec::new()),
                next_sequence: AtomicU64::new(0),
                appended,
                shutdown,
                closed: AtomicBool::new(false),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the number of partitions per topic.
    pub fn partition_count(&self) -> usize {
        self.inner.partitions
    }

    /// Returns the partition a key is routed to (FNV-1a, stable across runs).
    pub fn partition_for(&self, key: &str) -> usize {
        let hash = key.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        });
        (hash % self.inner.partitions as u64) as usize
    }

    /// Returns every event of a topic in publication order.
    pub async fn events(&self, topic: &str) -> Vec<EventEnvelope> {
        let topics = self.inner.topics.read().await;
        let Some(log) = topics.get(topic) else {
            return Vec::new();
        };
        let mut records: Vec<&Record> = log.partitions.iter().flatten().collect();
        records.sort_by_key(|r| r.sequence);
        records.into_iter().map(|r| r.event.clone()).collect()
    }

    /// Returns the number of events retained for a topic.
    pub async fn event_count(&self, topic: &str) -> usize {
        let topics = self.inner.topics.read().await;
        topics
            .get(topic)
            .map(|log| log.partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Returns the events that exhausted their delivery attempts.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.dead_letters.read().await.clone()
    }

    /// Waits until every subscription has handled every retained event.
    ///
    /// Returns false if the timeout elapsed first.
    pub async fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_idle().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    async fn is_idle(&self) -> bool {
        let topics = self.inner.topics.read().await;
        let committed = self.inner.committed.read().await;
        committed.iter().all(|((topic, _), offsets)| {
            topics.get(topic).is_none_or(|log| {
                log.partitions
                    .iter()
                    .zip(offsets)
                    .all(|(partition, next)| *next as usize >= partition.len())
            })
        })
    }

    /// Stops all consumer workers and rejects further publishes.
    ///
    /// Events that were not acknowledged stay in the log.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.shutdown.send_replace(true);

        let handles = std::mem::take(&mut *self.inner.workers.lock().await);
        for result in futures_util::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "bus worker ended abnormally");
            }
        }
        tracing::info!("event bus shut down");
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, mut event: EventEnvelope) -> Result<Offset> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        key.clone_into(&mut event.key);
        let event_type = event.event_type.clone();
        let partition = self.partition_for(key);

        let offset = {
            let mut topics = self.inner.topics.write().await;
            let log = topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicLog::new(self.inner.partitions));
            let records = &mut log.partitions[partition];
            records.push(Record {
                sequence: self.inner.next_sequence.fetch_add(1, Ordering::SeqCst),
                event,
            });
            (records.len() - 1) as u64
        };

        self.inner.appended.send_modify(|count| *count += 1);
        metrics::counter!("bus_events_published_total", "topic" => topic.to_string())
            .increment(1);
        tracing::debug!(topic, key, partition, offset, %event_type, "event published");

        Ok(Offset { partition, offset })
    }

    async fn subscribe(
        &self,
        topic: &str,
        group_id: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        {
            let mut committed = self.inner.committed.write().await;
            let key = (topic.to_string(), group_id.to_string());
            if committed.contains_key(&key) {
                return Err(BusError::AlreadySubscribed {
                    topic: topic.to_string(),
                    group: group_id.to_string(),
                });
            }
            committed.insert(key, vec![0; self.inner.partitions]);
        }

        self.inner
            .topics
            .write()
            .await
            .entry(topic.to_string())
            .or_insert_with(|| TopicLog::new(self.inner.partitions));

        let mut workers = self.inner.workers.lock().await;
        for partition in 0..self.inner.partitions {
            let worker = PartitionWorker {
                inner: Arc::clone(&self.inner),
                topic: topic.to_string(),
                group: group_id.to_string(),
                partition,
                handler: Arc::clone(&handler),
            };
            workers.push(tokio::spawn(worker.run()));
        }

        tracing::info!(
            topic,
            group = group_id,
            partitions = self.inner.partitions,
            "consumer group subscribed"
        );
        Ok(())
    }
}

/// Consumes one partition of one topic on behalf of one consumer group.
struct PartitionWorker {
    inner: Arc<Inner>,
    topic: String,
    group: String,
    partition: usize,
    handler: Arc<dyn EventHandler>,
}

impl PartitionWorker {
    async fn run(self) {
        let mut appended = self.inner.appended.subscribe();
        let mut shutdown = self.inner.shutdown.subscribe();
        let mut offset: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            let _ = appended.borrow_and_update();

            let Some(event) = self.record_at(offset).await else {
                tokio::select! {
                    changed = appended.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = shutdown.changed() => {}
                }
                continue;
            };

            if !self.deliver(offset, &event, &mut shutdown).await {
                break;
            }
            offset += 1;
            self.commit(offset).await;
        }

        tracing::debug!(
            topic = %self.topic,
            group = %self.group,
            partition = self.partition,
            "partition worker stopped"
        );
    }

    async fn record_at(&self, offset: u64) -> Option<EventEnvelope> {
        let topics = self.inner.topics.read().await;
        topics
            .get(&self.topic)?
            .partitions
            .get(self.partition)?
            .get(offset as usize)
            .map(|record| record.event.clone())
    }

    async fn commit(&self, next_offset: u64) {
        let mut committed = self.inner.committed.write().await;
        if let Some(offsets) = committed.get_mut(&(self.topic.clone(), self.group.clone())) {
            offsets[self.partition] = next_offset;
        }
    }

    /// Delivers one event until it is handled or dead-lettered.
    ///
    /// Returns false if the bus shut down while waiting to retry; the event
    /// then stays unacknowledged.
    async fn deliver(
        &self,
        offset: u64,
        event: &EventEnvelope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let retry = self.inner.retry;
        let mut attempt: u32 = 1;

        loop {
            let started = Instant::now();
            let result = self.handler.handle(event).await;
            metrics::histogram!("bus_handler_duration_seconds", "topic" => self.topic.clone())
                .record(started.elapsed().as_secs_f64());

            let error = match result {
                Ok(()) => return true,
                Err(error) => error,
            };

            if error.is_retryable() && retry.should_retry(attempt) {
                let delay = retry.backoff(attempt);
                tracing::warn!(
                    topic = %self.topic,
                    group = %self.group,
                    partition = self.partition,
                    offset,
                    attempt,
                    ?delay,
                    error = %error,
                    "handler failed, redelivering"
                );
                metrics::counter!("bus_handler_retries_total", "topic" => self.topic.clone())
                    .increment(1);

                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => return false,
                }
                attempt += 1;
                continue;
            }

            self.dead_letter(offset, event, &error, attempt).await;
            return true;
        }
    }

    async fn dead_letter(
        &self,
        offset: u64,
        event: &EventEnvelope,
        error: &HandlerError,
        attempts: u32,
    ) {
        tracing::error!(
            topic = %self.topic,
            group = %self.group,
            partition = self.partition,
            offset,
            attempts,
            event_type = %event.event_type,
            key = %event.key,
            error = %error,
            "event dead-lettered, manual intervention required"
        );
        metrics::counter!("bus_dead_letters_total", "topic" => self.topic.clone()).increment(1);

        self.inner.dead_letters.write().await.push(DeadLetter {
            topic: self.topic.clone(),
            group: self.group.clone(),
            partition: self.partition,
            offset,
            event: event.clone(),
            error: error.to_string(),
            attempts,
            dead_lettered_at: Utc::now(),
        });
    }
}
