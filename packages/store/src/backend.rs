//! Backend abstraction over the external transactional store.

use crate::record::{DurableEntryRecord, LedgerTail};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The co-located parent document never appeared within the
    /// bounded wait. Durable writing is abandoned for the session.
    #[error("parent document not available within {0:?}")]
    ParentTimeout(Duration),

    /// A concurrent writer moved the metadata between our read and our
    /// commit. The transaction must be retried from a fresh read.
    #[error("append conflict: expected tail {expected:?}, found {found:?}")]
    Conflict {
        expected: Option<LedgerTail>,
        found: Option<LedgerTail>,
    },

    #[error("append retries exhausted after {0} attempts")]
    RetriesExhausted(u32),

    /// Durable writing was already disabled for this session.
    #[error("durable history writing is disabled for this session")]
    Disabled,

    /// The ordered replay feed produced a gap.
    #[error("replay feed out of order: expected index {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    /// The replay feed itself failed.
    #[error("replay feed error: {0}")]
    Feed(String),
}

/// Ordered-by-index replay subscription: already-persisted records
/// first, then live appends; errors arrive in-band.
pub type ReplayFeed = mpsc::UnboundedReceiver<Result<DurableEntryRecord, StoreError>>;

/// The external transactional store holding the durable history log
/// and its co-located metadata record.
///
/// Mutual exclusion is scoped to the small metadata record, never the
/// whole document: [`HistoryStore::append_if`] is the read-modify-write
/// transaction a concurrent writer builds on.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Resolve once the co-located parent document exists, or fail
    /// after the bounded wait.
    async fn wait_parent(&self, timeout: Duration) -> Result<(), StoreError>;

    /// Point query for the current tail `{index, id}`.
    async fn tail(&self) -> Result<Option<LedgerTail>, StoreError>;

    /// Unconditional append, for a writer that knows it is alone.
    async fn append(&self, record: DurableEntryRecord) -> Result<(), StoreError>;

    /// Transactional append: commits the record and advances the
    /// metadata only if the tail still matches `expected`; fails with
    /// [`StoreError::Conflict`] otherwise.
    async fn append_if(
        &self,
        expected: Option<LedgerTail>,
        record: DurableEntryRecord,
    ) -> Result<(), StoreError>;

    /// Open an ordered replay subscription.
    async fn subscribe(&self) -> ReplayFeed;
}
