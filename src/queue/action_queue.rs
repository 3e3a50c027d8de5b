//! Action Queue: batched ingestion, fair round-robin dispatch, idempotency,
//! and correlation-id result retrieval (spec.md §4.7).
//!
//! Keyed entries live in a per-key sub-queue so `process_some` can rotate
//! fairly across keys; un-keyed entries share a single FIFO interleaved
//! one-per-round. `process_all` instead flattens everything and dispatches
//! in strict `(priority desc, timestamp asc, seq asc)` order.

use crate::error::RuntimeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// One queued action (spec.md §3 "Action Queue Entry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionQueueEntry {
    pub action_name: String,
    pub params: serde_json::Value,
    pub key: Option<String>,
    pub priority: i32,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub idempotency_key: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRecordStatus {
    Success,
    Error,
}

/// `{correlation_id → ...}` entry (spec.md §3 "Completion Record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub status: CompletionRecordStatus,
    pub result: Option<serde_json::Value>,
    pub error_msg: Option<String>,
    pub tick: u64,
    pub action_name: String,
    pub key: Option<String>,
}

/// Result of an `enqueue` call (spec.md §4.7 "Enqueue").
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// Immediate mode with no key: dispatched inline, result returned directly.
    Dispatched(Result<serde_json::Value, RuntimeError>),
    Queued,
    /// A matching `idempotency_key` was already seen; no-op success.
    Deduplicated,
    /// `max_queue_size` would be exceeded.
    Rejected,
}

/// Callback the queue dispatches through; implemented by `Runtime`
/// (spec.md §6.1 `Runtime::dispatch`).
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, action_name: &str, params: &serde_json::Value) -> Result<serde_json::Value, RuntimeError>;
}

/// The full mutable state of the action queue (spec.md §5 "Shared
/// resources": queue, key order, seq counter, results, idempotency set).
#[derive(Debug)]
pub struct ActionQueue {
    next_seq: u64,
    key_queues: HashMap<String, VecDeque<ActionQueueEntry>>,
    unkeyed_queue: VecDeque<ActionQueueEntry>,
    key_order: Vec<String>,
    next_key_index: usize,
    idempotency_seen: HashSet<String>,
    results_by_correlation: HashMap<String, CompletionRecord>,
    immediate_mode: bool,
    max_queue_size: usize,
}

impl ActionQueue {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            next_seq: 0,
            key_queues: HashMap::new(),
            unkeyed_queue: VecDeque::new(),
            key_order: Vec::new(),
            next_key_index: 0,
            idempotency_seen: HashSet::new(),
            results_by_correlation: HashMap::new(),
            immediate_mode: false,
            max_queue_size,
        }
    }

    pub fn len(&self) -> usize {
        self.unkeyed_queue.len() + self.key_queues.values().map(VecDeque::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_immediate_mode(&mut self, immediate: bool) {
        self.immediate_mode = immediate;
    }

    pub fn set_max_queue_size(&mut self, size: usize) {
        self.max_queue_size = size;
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// spec.md §4.7 "Enqueue".
    #[allow(clippy::too_many_arguments)]
    pub async fn enqueue(
        &mut self,
        dispatcher: &dyn ActionDispatcher,
        tick: u64,
        action_name: impl Into<String>,
        params: serde_json::Value,
        key: Option<String>,
        priority: i32,
        idempotency_key: Option<String>,
        correlation_id: Option<String>,
    ) -> EnqueueOutcome {
        let action_name = action_name.into();

        if let Some(idem) = &idempotency_key {
            if !self.idempotency_seen.insert(idem.clone()) {
                debug!("dropping duplicate enqueue for idempotency_key {}", idem);
                return EnqueueOutcome::Deduplicated;
            }
        }

        if self.immediate_mode && key.is_none() {
            let result = dispatcher.dispatch(&action_name, &params).await;
            self.record_result(correlation_id.as_deref(), &result, tick, &action_name, &None);
            return EnqueueOutcome::Dispatched(result);
        }

        if self.len() >= self.max_queue_size {
            warn!("action queue at capacity ({}), rejecting enqueue", self.max_queue_size);
            return EnqueueOutcome::Rejected;
        }

        let entry = ActionQueueEntry {
            action_name,
            params,
            key: key.clone(),
            priority,
            seq: self.next_seq(),
            timestamp: Utc::now(),
            idempotency_key,
            correlation_id,
        };

        match key {
            Some(k) => {
                if !self.key_order.contains(&k) {
                    self.key_order.push(k.clone());
                }
                self.key_queues.entry(k).or_default().push_back(entry);
            }
            None => self.unkeyed_queue.push_back(entry),
        }
        EnqueueOutcome::Queued
    }

    /// spec.md §4.7 "Batch dispatch": `process_all` sorts by `(priority
    /// desc, timestamp asc)`, ties broken on `seq`.
    pub async fn process_all(&mut self, dispatcher: &dyn ActionDispatcher, tick: u64) -> u32 {
        let mut all: Vec<ActionQueueEntry> = self.unkeyed_queue.drain(..).collect();
        for queue in self.key_queues.values_mut() {
            all.extend(queue.drain(..));
        }
        all.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.timestamp.cmp(&b.timestamp))
                .then(a.seq.cmp(&b.seq))
        });

        let count = all.len() as u32;
        for entry in all {
            self.dispatch_entry(dispatcher, tick, entry).await;
        }
        count
    }

    /// spec.md §4.7 "fairness path": rotate through `key_order` one entry
    /// per key per round, interleaving one un-keyed entry per round, until
    /// `n` dispatches have happened or the queue runs dry.
    pub async fn process_some(&mut self, n: usize, dispatcher: &dyn ActionDispatcher, tick: u64) -> u32 {
        let mut dispatched = 0usize;

        while dispatched < n {
            let mut progressed = false;
            let key_count = self.key_order.len();

            for offset in 0..key_count {
                if dispatched >= n {
                    break;
                }
                let idx = (self.next_key_index + offset) % key_count;
                let key = self.key_order[idx].clone();
                if let Some(entry) = self.key_queues.get_mut(&key).and_then(VecDeque::pop_front) {
                    self.dispatch_entry(dispatcher, tick, entry).await;
                    dispatched += 1;
                    progressed = true;
                }
            }
            if key_count > 0 {
                self.next_key_index = (self.next_key_index + 1) % key_count;
            }

            if dispatched < n {
                if let Some(entry) = self.unkeyed_queue.pop_front() {
                    self.dispatch_entry(dispatcher, tick, entry).await;
                    dispatched += 1;
                    progressed = true;
                }
            }

            if !progressed {
                break;
            }
        }
        dispatched as u32
    }

    /// Dispatch every entry queued under `key`, ignoring fairness with
    /// other keys (spec.md §6 "process_key").
    pub async fn process_key(&mut self, key: &str, dispatcher: &dyn ActionDispatcher, tick: u64) -> u32 {
        let entries: Vec<ActionQueueEntry> = self
            .key_queues
            .get_mut(key)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default();
        let count = entries.len() as u32;
        for entry in entries {
            self.dispatch_entry(dispatcher, tick, entry).await;
        }
        count
    }

    async fn dispatch_entry(&mut self, dispatcher: &dyn ActionDispatcher, tick: u64, entry: ActionQueueEntry) {
        let result = dispatcher.dispatch(&entry.action_name, &entry.params).await;
        self.record_result(entry.correlation_id.as_deref(), &result, tick, &entry.action_name, &entry.key);
    }

    fn record_result(
        &mut self,
        correlation_id: Option<&str>,
        result: &Result<serde_json::Value, RuntimeError>,
        tick: u64,
        action_name: &str,
        key: &Option<String>,
    ) {
        let Some(correlation_id) = correlation_id else {
            return;
        };
        let record = match result {
            Ok(value) => CompletionRecord {
                status: CompletionRecordStatus::Success,
                result: Some(value.clone()),
                error_msg: None,
                tick,
                action_name: action_name.to_string(),
                key: key.clone(),
            },
            Err(err) => CompletionRecord {
                status: CompletionRecordStatus::Error,
                result: None,
                error_msg: Some(err.message.clone()),
                tick,
                action_name: action_name.to_string(),
                key: key.clone(),
            },
        };
        self.results_by_correlation.insert(correlation_id.to_string(), record);
    }

    /// Non-destructive read (spec.md §6 `get_result`).
    pub fn get_result(&self, correlation_id: &str) -> Option<&CompletionRecord> {
        self.results_by_correlation.get(correlation_id)
    }

    /// Consuming read (spec.md §6 `get_and_clear_result`).
    pub fn get_and_clear_result(&mut self, correlation_id: &str) -> Option<CompletionRecord> {
        self.results_by_correlation.remove(correlation_id)
    }

    /// Clear a single key's sub-queue, or everything if `key` is `None`
    /// (spec.md §6 `clear(key?)`).
    pub fn clear(&mut self, key: Option<&str>) {
        match key {
            Some(k) => {
                self.key_queues.remove(k);
                self.key_order.retain(|existing| existing != k);
            }
            None => {
                self.key_queues.clear();
                self.key_order.clear();
                self.next_key_index = 0;
                self.unkeyed_queue.clear();
            }
        }
    }

    /// Snapshot every field named in spec.md §6 "Persisted state" for
    /// serialization (see `queue::persistence`).
    pub fn snapshot(&self) -> PersistedQueue {
        PersistedQueue {
            next_seq: self.next_seq,
            key_queues: self
                .key_queues
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect(),
            unkeyed_queue: self.unkeyed_queue.iter().cloned().collect(),
            key_order: self.key_order.clone(),
            next_key_index: self.next_key_index,
            idempotency_seen: self.idempotency_seen.iter().cloned().collect(),
            results_by_correlation: self.results_by_correlation.clone(),
            immediate_mode: self.immediate_mode,
            max_queue_size: self.max_queue_size,
        }
    }

    /// Restore a queue from a prior [`PersistedQueue`] snapshot (spec.md
    /// §6 "process restart resumes without loss").
    pub fn restore(snapshot: PersistedQueue) -> Self {
        Self {
            next_seq: snapshot.next_seq,
            key_queues: snapshot
                .key_queues
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect(),
            unkeyed_queue: snapshot.unkeyed_queue.into_iter().collect(),
            key_order: snapshot.key_order,
            next_key_index: snapshot.next_key_index,
            idempotency_seen: snapshot.idempotency_seen.into_iter().collect(),
            results_by_correlation: snapshot.results_by_correlation,
            immediate_mode: snapshot.immediate_mode,
            max_queue_size: snapshot.max_queue_size,
        }
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            len: self.len(),
            key_count: self.key_order.len(),
            immediate_mode: self.immediate_mode,
            max_queue_size: self.max_queue_size,
        }
    }
}

/// The wire shape of the persisted blob (spec.md §6 "Persisted state").
/// Kept as a plain `serde`-derived struct, serialized as JSON per the
/// `queue_persistence_path` config field — see `queue::persistence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedQueue {
    pub next_seq: u64,
    pub key_queues: HashMap<String, Vec<ActionQueueEntry>>,
    pub unkeyed_queue: Vec<ActionQueueEntry>,
    pub key_order: Vec<String>,
    pub next_key_index: usize,
    pub idempotency_seen: Vec<String>,
    pub results_by_correlation: HashMap<String, CompletionRecord>,
    pub immediate_mode: bool,
    pub max_queue_size: usize,
}

/// Summary returned by `get_status` (spec.md §6).
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub len: usize,
    pub key_count: usize,
    pub immediate_mode: bool,
    pub max_queue_size: usize,
}
