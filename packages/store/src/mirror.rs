//! Read-only mirror of the durable history log.
//!
//! Feeds a history panel or a late-joining replica: it consumes an
//! ordered replay subscription, verifies the sequence stays gap-free,
//! and exposes an in-memory snapshot of everything seen so far. The
//! mirror never writes back and never resubscribes after a failure.

use crate::backend::{ReplayFeed, StoreError};
use crate::record::DurableEntryRecord;
use arbor_history::HistoryEntry;
use std::sync::{Arc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorState {
    /// Following the feed; the snapshot grows as records arrive.
    Streaming,
    /// The feed broke or produced a gap. Sticky: the snapshot freezes
    /// at whatever was received before the failure.
    Failed(String),
}

struct Inner {
    records: Vec<DurableEntryRecord>,
    next_index: u64,
    state: MirrorState,
}

#[derive(Clone)]
pub struct HistoryMirror {
    inner: Arc<Mutex<Inner>>,
}

impl HistoryMirror {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                records: vec![],
                next_index: 0,
                state: MirrorState::Streaming,
            })),
        }
    }

    /// Drive the mirror from a replay feed until the feed closes or
    /// fails. Clone the mirror before calling to keep a read handle.
    pub async fn run(&self, feed: ReplayFeed) {
        let mut stream = UnboundedReceiverStream::new(feed);
        while let Some(item) = stream.next().await {
            let record = match item {
                Ok(record) => record,
                Err(err) => {
                    self.fail(err.to_string());
                    return;
                }
            };

            let mut inner = self.inner.lock().unwrap();
            if record.index != inner.next_index {
                let err = StoreError::OutOfOrder {
                    expected: inner.next_index,
                    got: record.index,
                };
                drop(inner);
                self.fail(err.to_string());
                return;
            }
            inner.next_index += 1;
            inner.records.push(record);
        }
    }

    pub fn state(&self) -> MirrorState {
        self.inner.lock().unwrap().state.clone()
    }

    pub fn records(&self) -> Vec<DurableEntryRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    /// The mirrored entries in durable order, without the envelope.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|r| r.entry.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fail(&self, reason: String) {
        tracing::error!(%reason, "history mirror stopped");
        self.inner.lock().unwrap().state = MirrorState::Failed(reason);
    }
}

impl Default for HistoryMirror {
    fn default() -> Self {
        Self::new()
    }
}
