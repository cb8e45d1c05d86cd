//! History entry data model.

use arbor_patch::{EntryId, ExchangeId, PatchRecord, TreeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Lifecycle state of an entry. Transitions `Recording → Complete`
/// exactly once, when the last open exchange closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryState {
    Recording,
    Complete,
}

/// One logical action, aggregating every tree's patch records produced
/// by that action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: EntryId,
    /// Tree that initiated the action.
    pub tree: TreeId,
    pub action: String,
    pub undoable: bool,
    pub created: DateTime<Utc>,
    pub records: Vec<PatchRecord>,
    pub state: EntryState,
    /// Outstanding async confirmations gating completion. Not
    /// persisted: a durable entry is always complete.
    #[serde(skip, default)]
    pub(crate) open_exchanges: HashSet<ExchangeId>,
}

impl HistoryEntry {
    pub(crate) fn new(
        id: EntryId,
        tree: TreeId,
        action: impl Into<String>,
        undoable: bool,
        initial_exchange: ExchangeId,
    ) -> Self {
        let mut open_exchanges = HashSet::new();
        open_exchanges.insert(initial_exchange);
        Self {
            id,
            tree,
            action: action.into(),
            undoable,
            created: Utc::now(),
            records: vec![],
            state: EntryState::Recording,
            open_exchanges,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == EntryState::Complete
    }

    /// True once completed with at least one record: only such entries
    /// are ever persisted or offered for undo.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn open_exchange_count(&self) -> usize {
        self.open_exchanges.len()
    }
}
