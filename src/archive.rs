//! Best-effort event archiver.
//!
//! Published events are serialized and handed to the configured store on a
//! dedicated worker thread. Publishers enqueue with a non-blocking
//! `try_send` and are never stalled or failed by the archive path; queue
//! drops and store errors are counted and logged instead of being
//! swallowed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::event::Event;
use crate::storage::EventStore;

#[derive(Debug)]
struct ArchiveMsg {
    key: String,
    bytes: Vec<u8>,
    retention: Option<Duration>,
}

/// Archive worker handle owned by the bus.
#[derive(Debug)]
pub(crate) struct EventArchiver {
    tx: Sender<ArchiveMsg>,
    retention: Option<Duration>,
    dropped: AtomicU64,
    store_failures: Arc<AtomicU64>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl EventArchiver {
    pub(crate) fn new(
        queue_capacity: usize,
        retention: Option<Duration>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        let (tx, rx) = bounded::<ArchiveMsg>(queue_capacity.max(1));

        let store_failures = Arc::new(AtomicU64::new(0));
        let worker_failures = Arc::clone(&store_failures);
        let join = thread::Builder::new()
            .name("tallybus-archive".to_string())
            .spawn(move || worker_loop(store, worker_failures, rx))
            .expect("failed to spawn tallybus archive worker");

        Self {
            tx,
            retention,
            dropped: AtomicU64::new(0),
            store_failures,
            join: Mutex::new(Some(join)),
        }
    }

    /// Non-blocking enqueue of a published event.
    pub(crate) fn enqueue(&self, event: &Event) {
        let bytes = match serde_json::to_vec(event) {
            Ok(bytes) => bytes,
            Err(error) => {
                self.store_failures.fetch_add(1, Ordering::Relaxed);
                warn!(event_id = %event.id(), %error, "Failed to serialize event for archive");
                return;
            }
        };

        let msg = ArchiveMsg {
            key: archive_key(event),
            bytes,
            retention: self.retention,
        };

        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(event_id = %event.id(), "Archive queue full, event dropped");
            }
        }
    }

    #[must_use]
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub(crate) fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }
}

impl Drop for EventArchiver {
    fn drop(&mut self) {
        // Close the channel so the worker can terminate.
        let (dummy_tx, _) = bounded::<ArchiveMsg>(1);
        let old_tx = std::mem::replace(&mut self.tx, dummy_tx);
        drop(old_tx);

        let mut guard = self.join.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            // Detach instead of joining: the worker exits once the last
            // sender is gone, and nothing here may block a drop path.
            drop(handle);
        }
    }
}

/// Storage key for an archived event: `events/<type>/<id>`.
pub(crate) fn archive_key(event: &Event) -> String {
    format!("events/{}/{}", event.event_type(), event.id())
}

fn worker_loop(
    store: Arc<dyn EventStore>,
    store_failures: Arc<AtomicU64>,
    rx: Receiver<ArchiveMsg>,
) {
    for msg in &rx {
        if let Err(error) = store.save(&msg.key, &msg.bytes, msg.retention) {
            store_failures.fetch_add(1, Ordering::Relaxed);
            warn!(key = %msg.key, %error, "Failed to archive event");
        }
    }
}
