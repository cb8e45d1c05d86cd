//! In-memory store backend.
//!
//! Implements the same transactional semantics an external document
//! store provides: a versionless CAS on the small metadata record, and
//! ordered subscription fan-out. Used by tests and by hosts that keep
//! history in-process.

use crate::backend::{HistoryStore, ReplayFeed, StoreError};
use crate::record::{DurableEntryRecord, LedgerTail};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

struct Inner {
    records: Vec<DurableEntryRecord>,
    tail: Option<LedgerTail>,
    subscribers: Vec<mpsc::UnboundedSender<Result<DurableEntryRecord, StoreError>>>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    parent: watch::Sender<bool>,
}

impl MemoryStore {
    /// A store whose parent document does not exist yet.
    pub fn new() -> Self {
        Self::build(false)
    }

    /// A store whose parent document already exists.
    pub fn with_parent() -> Self {
        Self::build(true)
    }

    fn build(parent_exists: bool) -> Self {
        let (parent, _) = watch::channel(parent_exists);
        Self {
            inner: Mutex::new(Inner {
                records: vec![],
                tail: None,
                subscribers: vec![],
            }),
            parent,
        }
    }

    /// Create the parent document, releasing any bounded waits.
    pub fn create_parent(&self) {
        self.parent.send_replace(true);
    }

    /// Push an error onto every open replay feed (simulates a failing
    /// store-side subscription).
    pub async fn fail_subscribers(&self, reason: &str) {
        let inner = self.inner.lock().await;
        for tx in &inner.subscribers {
            let _ = tx.send(Err(StoreError::Feed(reason.to_string())));
        }
    }

    pub async fn records(&self) -> Vec<DurableEntryRecord> {
        self.inner.lock().await.records.clone()
    }

    fn commit(inner: &mut Inner, record: DurableEntryRecord) {
        inner.tail = Some(record.tail());
        inner
            .subscribers
            .retain(|tx| tx.send(Ok(record.clone())).is_ok());
        inner.records.push(record);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn wait_parent(&self, timeout: Duration) -> Result<(), StoreError> {
        let mut rx = self.parent.subscribe();
        let wait = async {
            loop {
                if *rx.borrow() {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(()) if *self.parent.borrow() => Ok(()),
            _ => Err(StoreError::ParentTimeout(timeout)),
        }
    }

    async fn tail(&self) -> Result<Option<LedgerTail>, StoreError> {
        Ok(self.inner.lock().await.tail.clone())
    }

    async fn append(&self, record: DurableEntryRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        Self::commit(&mut inner, record);
        Ok(())
    }

    async fn append_if(
        &self,
        expected: Option<LedgerTail>,
        record: DurableEntryRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.tail != expected {
            return Err(StoreError::Conflict {
                expected,
                found: inner.tail.clone(),
            });
        }
        Self::commit(&mut inner, record);
        Ok(())
    }

    async fn subscribe(&self) -> ReplayFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        for record in &inner.records {
            let _ = tx.send(Ok(record.clone()));
        }
        inner.subscribers.push(tx);
        rx
    }
}
