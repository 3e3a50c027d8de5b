//! The Action Queue (spec.md §4.7): batching, fairness, idempotency,
//! correlation results, and restart-surviving persistence.

pub mod action_queue;
pub mod persistence;

pub use action_queue::{
    ActionDispatcher, ActionQueue, ActionQueueEntry, CompletionRecord, CompletionRecordStatus, EnqueueOutcome,
    PersistedQueue, QueueStatus,
};
