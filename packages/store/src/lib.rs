//! # Arbor Store
//!
//! Durable history persistence: completed ledger entries flow into an
//! external transactional store as an append-only, gap-free sequence.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ ledger completion sink (mpsc)               │
//! └─────────────────────────────────────────────┘
//!        ↓ SequentialWriter | ConcurrentWriter
//! ┌─────────────────────────────────────────────┐
//! │ HistoryStore backend                        │
//! │  - records keyed by index                   │
//! │  - co-located tail metadata {index, id}     │
//! │  - CAS append for concurrent writers        │
//! └─────────────────────────────────────────────┘
//!        ↓ ordered-by-index subscription
//! ┌─────────────────────────────────────────────┐
//! │ HistoryMirror: read-only replay/display     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Policy
//!
//! Durable persistence failing never blocks local editing: a writer
//! that times out waiting for the parent document or exhausts its
//! transaction retries disables itself for the rest of the session,
//! emits one diagnostic, and drops subsequent flushes. Replay errors
//! put the mirror into a sticky failed state; nothing auto-retries.

mod backend;
mod memory;
mod mirror;
mod record;
mod writer;

pub use backend::{HistoryStore, ReplayFeed, StoreError};
pub use memory::MemoryStore;
pub use mirror::{HistoryMirror, MirrorState};
pub use record::{DurableEntryRecord, LedgerTail};
pub use writer::{ConcurrentWriter, SequentialWriter, DEFAULT_MAX_ATTEMPTS, DEFAULT_PARENT_TIMEOUT};
