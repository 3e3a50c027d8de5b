//! Serialized-blob persistence for the action queue (spec.md §4.7
//! "Persistence": "Queue state is serialized on every mutation so that
//! process restart resumes without loss.").
//!
//! The wire format is `serde_json`, matching every other persisted/wire
//! payload in this crate (see `SPEC_FULL.md` §4.7).

use crate::queue::action_queue::{ActionQueue, PersistedQueue};
use log::{info, warn};
use std::path::Path;

/// Write the queue's current state to `path` as JSON. Called after every
/// queue mutation per spec.md §4.7; failures are logged rather than
/// propagated since a missed persist only costs at-most-once durability on
/// an unclean restart, not correctness of the running process.
pub async fn save(queue: &ActionQueue, path: &Path) {
    let snapshot = queue.snapshot();
    match serde_json::to_vec_pretty(&snapshot) {
        Ok(bytes) => {
            if let Err(err) = tokio::fs::write(path, bytes).await {
                warn!("failed to persist action queue to {}: {}", path.display(), err);
            }
        }
        Err(err) => warn!("failed to encode action queue snapshot: {}", err),
    }
}

/// Load a previously persisted queue from `path`, or start fresh with
/// `max_queue_size` if no persisted state exists yet.
pub async fn load(path: &Path, max_queue_size: usize) -> ActionQueue {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<PersistedQueue>(&bytes) {
            Ok(snapshot) => {
                info!("resumed action queue from {}", path.display());
                ActionQueue::restore(snapshot)
            }
            Err(err) => {
                warn!("discarding corrupt action queue snapshot at {}: {}", path.display(), err);
                ActionQueue::new(max_queue_size)
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => ActionQueue::new(max_queue_size),
        Err(err) => {
            warn!("failed to read action queue snapshot at {}: {}", path.display(), err);
            ActionQueue::new(max_queue_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::action_queue::{ActionDispatcher, EnqueueOutcome};
    use crate::error::RuntimeError;
    use async_trait::async_trait;

    struct NoopDispatcher;
    #[async_trait]
    impl ActionDispatcher for NoopDispatcher {
        async fn dispatch(&self, _action_name: &str, params: &serde_json::Value) -> Result<serde_json::Value, RuntimeError> {
            Ok(params.clone())
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips_pending_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        let dispatcher = NoopDispatcher;
        let mut queue = ActionQueue::new(100);
        let outcome = queue
            .enqueue(&dispatcher, 0, "walk_to", serde_json::json!({"x": 1}), None, 0, None, None)
            .await;
        assert!(matches!(outcome, EnqueueOutcome::Queued));

        save(&queue, &path).await;
        let restored = load(&path, 100).await;
        assert_eq!(restored.len(), 1);
    }

    #[tokio::test]
    async fn load_with_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let queue = load(&path, 50).await;
        assert!(queue.is_empty());
        assert_eq!(queue.status().max_queue_size, 50);
    }
}
