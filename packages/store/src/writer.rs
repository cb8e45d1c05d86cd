//! # Durable History Writers
//!
//! Two flush strategies over the same backend:
//!
//! - [`SequentialWriter`]: single expected writer. Reads the durable
//!   tail once, then computes indices locally: one round trip per
//!   session instead of per flush.
//! - [`ConcurrentWriter`]: multiple writers racing on the same log.
//!   Never caches; every flush is a read-modify-write transaction on
//!   the metadata record, retried a bounded number of times on
//!   conflict. One extra round trip per flush buys gap-free ordering
//!   under concurrency.
//!
//! Either writer, once it fails, disables itself for the rest of the
//! session and emits a single diagnostic: local undo/redo keeps
//! working, only long-term durability is lost.

use crate::backend::{HistoryStore, StoreError};
use crate::record::DurableEntryRecord;
use arbor_history::HistoryEntry;
use arbor_patch::EntryId;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Bounded wait for the co-located parent document.
pub const DEFAULT_PARENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transaction attempts per flush for the concurrent writer.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

struct Session {
    next_index: u64,
    /// Id of the previous record in the chain: the cached tail for the
    /// first write, then whatever this session last wrote.
    last_written: Option<EntryId>,
}

pub struct SequentialWriter<S: HistoryStore> {
    store: Arc<S>,
    parent_timeout: Duration,
    session: Option<Session>,
    disabled: bool,
}

impl<S: HistoryStore> SequentialWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_parent_timeout(store, DEFAULT_PARENT_TIMEOUT)
    }

    pub fn with_parent_timeout(store: Arc<S>, parent_timeout: Duration) -> Self {
        Self {
            store,
            parent_timeout,
            session: None,
            disabled: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Persist one completed entry. Returns its durable index.
    pub async fn flush(&mut self, entry: &HistoryEntry) -> Result<u64, StoreError> {
        if self.disabled {
            return Err(StoreError::Disabled);
        }
        if self.session.is_none() {
            match self.open_session().await {
                Ok(session) => self.session = Some(session),
                Err(err) => {
                    self.disable(&err);
                    return Err(err);
                }
            }
        }

        let session = self.session.as_mut().expect("session opened above");
        let record = DurableEntryRecord {
            index: session.next_index,
            created: Utc::now(),
            previous_entry_id: session.last_written.clone(),
            entry: entry.clone(),
        };
        let index = record.index;

        match self.store.append(record).await {
            Ok(()) => {
                session.next_index += 1;
                session.last_written = Some(entry.id.clone());
                tracing::debug!(index, entry = %entry.id, "history entry persisted");
                Ok(index)
            }
            Err(err) => {
                self.disable(&err);
                Err(err)
            }
        }
    }

    /// Consume the ledger's completion sink until it closes.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HistoryEntry>) {
        while let Some(entry) = rx.recv().await {
            // The first failure logged inside flush; later flushes are
            // dropped silently per the session-disable policy.
            let _ = self.flush(&entry).await;
        }
    }

    /// One durable read per session: the cached tail seeds both the
    /// index counter and the first record's parent link.
    async fn open_session(&self) -> Result<Session, StoreError> {
        self.store.wait_parent(self.parent_timeout).await?;
        let tail = self.store.tail().await?;
        Ok(Session {
            next_index: tail.as_ref().map(|t| t.index + 1).unwrap_or(0),
            last_written: tail.map(|t| t.id),
        })
    }

    fn disable(&mut self, err: &StoreError) {
        self.disabled = true;
        tracing::error!(%err, "durable history writing disabled for this session");
    }
}

pub struct ConcurrentWriter<S: HistoryStore> {
    store: Arc<S>,
    parent_timeout: Duration,
    max_attempts: u32,
    parent_seen: bool,
    disabled: bool,
}

impl<S: HistoryStore> ConcurrentWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            parent_timeout: DEFAULT_PARENT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            parent_seen: false,
            disabled: false,
        }
    }

    pub fn with_limits(store: Arc<S>, parent_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            store,
            parent_timeout,
            max_attempts,
            parent_seen: false,
            disabled: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Persist one completed entry under a fresh transaction: read the
    /// tail, compute `index = tail + 1`, commit record and metadata
    /// atomically. A conflicting concurrent commit triggers a retry
    /// from a fresh read.
    pub async fn flush(&mut self, entry: &HistoryEntry) -> Result<u64, StoreError> {
        if self.disabled {
            return Err(StoreError::Disabled);
        }
        if !self.parent_seen {
            if let Err(err) = self.store.wait_parent(self.parent_timeout).await {
                self.disable(&err);
                return Err(err);
            }
            self.parent_seen = true;
        }

        for attempt in 1..=self.max_attempts {
            let tail = match self.store.tail().await {
                Ok(tail) => tail,
                Err(err) => {
                    self.disable(&err);
                    return Err(err);
                }
            };
            let record = DurableEntryRecord {
                index: tail.as_ref().map(|t| t.index + 1).unwrap_or(0),
                created: Utc::now(),
                previous_entry_id: tail.as_ref().map(|t| t.id.clone()),
                entry: entry.clone(),
            };
            let index = record.index;

            match self.store.append_if(tail, record).await {
                Ok(()) => {
                    tracing::debug!(index, entry = %entry.id, attempt, "history entry persisted");
                    return Ok(index);
                }
                Err(StoreError::Conflict { .. }) => {
                    tracing::trace!(entry = %entry.id, attempt, "append conflict; retrying");
                }
                Err(err) => {
                    self.disable(&err);
                    return Err(err);
                }
            }
        }

        let err = StoreError::RetriesExhausted(self.max_attempts);
        self.disable(&err);
        Err(err)
    }

    /// Consume the ledger's completion sink until it closes.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HistoryEntry>) {
        while let Some(entry) = rx.recv().await {
            let _ = self.flush(&entry).await;
        }
    }

    fn disable(&mut self, err: &StoreError) {
        self.disabled = true;
        tracing::error!(%err, "durable history writing disabled for this session");
    }
}
