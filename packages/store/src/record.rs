//! Durable record shapes.

use arbor_history::HistoryEntry;
use arbor_patch::EntryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The co-located ledger metadata: where the durable log currently
/// ends. Lets a new writer resume indexing without scanning the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTail {
    pub index: u64,
    pub id: EntryId,
}

/// One persisted history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableEntryRecord {
    /// Position in the append-only sequence; gap-free from 0.
    pub index: u64,
    /// Server-side write timestamp.
    pub created: DateTime<Utc>,
    /// Id of the previous entry in the sequence; `None` for the first.
    pub previous_entry_id: Option<EntryId>,
    pub entry: HistoryEntry,
}

impl DurableEntryRecord {
    pub fn tail(&self) -> LedgerTail {
        LedgerTail {
            index: self.index,
            id: self.entry.id.clone(),
        }
    }
}
