//! # History Ledger
//!
//! In-memory append-only log of history entries with exchange-count
//! completion tracking.
//!
//! ## Completion Protocol
//!
//! Every async fan-out branch of an action (the action itself, each
//! shared-model push to a dependent tree) opens one exchange on the
//! entry. An exchange is closed either explicitly or by delivering a
//! patch record tagged with it: one message is simultaneously "here is
//! the diff" and "this branch is done". When the last exchange closes
//! the entry completes; a completed entry with zero records is
//! discarded outright.
//!
//! Every guarantee here is local and synchronous: callers serialize
//! access (the container keeps the ledger behind a mutex) and the
//! exchange counts are the only cross-task barrier.

use crate::entry::{EntryState, HistoryEntry};
use crate::undo::UndoStack;
use arbor_patch::{EntryId, ExchangeId, PatchRecord, TreeId};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;

/// Contract breaches between the monitor and the ledger. Fatal: callers
/// must propagate these, never swallow them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("history entry already exists: {0}")]
    DuplicateEntry(EntryId),

    #[error("unknown history entry: {0}")]
    UnknownEntry(EntryId),

    #[error("history entry {0} is already complete")]
    EntryComplete(EntryId),

    #[error("exchange {exchange} is already open on entry {entry}")]
    DuplicateExchange { entry: EntryId, exchange: ExchangeId },

    #[error("exchange {exchange} is not open on entry {entry}")]
    ExchangeNotOpen { entry: EntryId, exchange: ExchangeId },
}

/// Append-only ordered log of history entries.
pub struct HistoryLedger {
    entries: HashMap<EntryId, HistoryEntry>,
    /// Entry ids in creation order. Discarded entries are pruned.
    order: Vec<EntryId>,
    undo_stack: UndoStack,
    /// Completed non-empty entries are cloned onto this sink for
    /// durable persistence, when one is attached.
    completed_tx: Option<mpsc::UnboundedSender<HistoryEntry>>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: vec![],
            undo_stack: UndoStack::new(),
            completed_tx: None,
        }
    }

    /// Attach a durable-persistence sink. Completed non-empty entries
    /// are cloned onto it from then on.
    pub fn set_completed_sink(&mut self, tx: mpsc::UnboundedSender<HistoryEntry>) {
        self.completed_tx = Some(tx);
    }

    /// Open a new recording entry with one open exchange.
    pub fn create_history_entry(
        &mut self,
        entry_id: EntryId,
        exchange_id: ExchangeId,
        action: &str,
        tree: TreeId,
        undoable: bool,
    ) -> Result<(), LedgerError> {
        if self.entries.contains_key(&entry_id) {
            tracing::error!(entry = %entry_id, "attempted to create duplicate history entry");
            return Err(LedgerError::DuplicateEntry(entry_id));
        }
        tracing::debug!(entry = %entry_id, exchange = %exchange_id, action, "create history entry");
        self.entries.insert(
            entry_id.clone(),
            HistoryEntry::new(entry_id.clone(), tree, action, undoable, exchange_id),
        );
        self.order.push(entry_id);
        Ok(())
    }

    /// Add an open exchange to an existing, still-recording entry.
    pub fn start_exchange(
        &mut self,
        entry_id: &EntryId,
        exchange_id: ExchangeId,
    ) -> Result<(), LedgerError> {
        let entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| LedgerError::UnknownEntry(entry_id.clone()))?;
        if entry.is_complete() {
            tracing::error!(entry = %entry_id, "start_exchange on completed entry");
            return Err(LedgerError::EntryComplete(entry_id.clone()));
        }
        if !entry.open_exchanges.insert(exchange_id.clone()) {
            tracing::error!(entry = %entry_id, exchange = %exchange_id, "exchange opened twice");
            return Err(LedgerError::DuplicateExchange {
                entry: entry_id.clone(),
                exchange: exchange_id,
            });
        }
        tracing::trace!(entry = %entry_id, exchange = %exchange_id, "exchange opened");
        Ok(())
    }

    /// Close an open exchange. When the last one closes the entry
    /// completes; empty completed entries are discarded.
    pub fn end_exchange(
        &mut self,
        entry_id: &EntryId,
        exchange_id: &ExchangeId,
    ) -> Result<(), LedgerError> {
        let entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| LedgerError::UnknownEntry(entry_id.clone()))?;
        if !entry.open_exchanges.remove(exchange_id) {
            tracing::error!(entry = %entry_id, exchange = %exchange_id, "exchange closed twice or never opened");
            return Err(LedgerError::ExchangeNotOpen {
                entry: entry_id.clone(),
                exchange: exchange_id.clone(),
            });
        }
        tracing::trace!(entry = %entry_id, exchange = %exchange_id, "exchange closed");

        if entry.open_exchanges.is_empty() {
            self.complete_entry(entry_id);
        }
        Ok(())
    }

    /// Deliver one tree's patch record for an entry.
    ///
    /// Tolerates out-of-order arrival by lazily creating the entry (the
    /// record may reach the ledger before the opening message). The
    /// record is appended only when non-empty; the tagged exchange is
    /// always closed, since delivery doubles as the completion signal.
    pub fn add_tree_patch_record(
        &mut self,
        entry_id: EntryId,
        exchange_id: ExchangeId,
        record: PatchRecord,
    ) -> Result<(), LedgerError> {
        let entry = match self.entries.get_mut(&entry_id) {
            Some(entry) => {
                if entry.is_complete() {
                    tracing::error!(entry = %entry_id, "patch record for completed entry");
                    return Err(LedgerError::EntryComplete(entry_id));
                }
                entry
            }
            None => {
                tracing::debug!(entry = %entry_id, "patch record arrived before entry; creating lazily");
                let lazy = HistoryEntry::new(
                    entry_id.clone(),
                    record.tree.clone(),
                    record.action.clone(),
                    false,
                    exchange_id.clone(),
                );
                self.order.push(entry_id.clone());
                self.entries.entry(entry_id.clone()).or_insert(lazy)
            }
        };

        if !record.is_empty() {
            entry.records.push(record);
        }
        self.end_exchange(&entry_id, &exchange_id)
    }

    fn complete_entry(&mut self, entry_id: &EntryId) {
        let entry = self
            .entries
            .get_mut(entry_id)
            .expect("complete_entry called with entry present");
        entry.state = EntryState::Complete;

        if entry.is_empty() {
            tracing::debug!(entry = %entry_id, "discarding empty completed entry");
            self.entries.remove(entry_id);
            self.order.retain(|id| id != entry_id);
            return;
        }

        tracing::debug!(entry = %entry_id, records = self.entries[entry_id].records.len(), "entry complete");
        let entry = &self.entries[entry_id];
        if entry.undoable {
            self.undo_stack.push(entry_id.clone());
        }
        if let Some(tx) = &self.completed_tx {
            // Receiver dropped means durable persistence shut down;
            // local history keeps working.
            let _ = tx.send(entry.clone());
        }
    }

    pub fn entry(&self, entry_id: &EntryId) -> Option<&HistoryEntry> {
        self.entries.get(entry_id)
    }

    /// Completed and recording entries in creation order.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo_stack
    }

    pub fn undo_stack_mut(&mut self) -> &mut UndoStack {
        &mut self.undo_stack
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_patch::{PatchPair, PatchPath};
    use serde_json::json;

    fn record(tree: &str, action: &str) -> PatchRecord {
        let state = json!({ "text": "" });
        let pair = PatchPair::replace(&state, PatchPath::parse("/text"), json!("hi")).unwrap();
        PatchRecord::from_pairs(TreeId::new(tree), action, vec![pair])
    }

    fn ids(n: &str) -> (EntryId, ExchangeId) {
        (EntryId::new(format!("e-{n}")), ExchangeId::new(format!("x-{n}")))
    }

    #[test]
    fn test_create_and_complete_with_record() {
        let mut ledger = HistoryLedger::new();
        let (e, x) = ids("1");

        ledger
            .create_history_entry(e.clone(), x.clone(), "setText", TreeId::new("t1"), true)
            .unwrap();
        assert!(!ledger.entry(&e).unwrap().is_complete());

        ledger
            .add_tree_patch_record(e.clone(), x, record("t1", "setText"))
            .unwrap();

        let entry = ledger.entry(&e).unwrap();
        assert!(entry.is_complete());
        assert_eq!(entry.records.len(), 1);
        assert_eq!(ledger.undo_stack().len(), 1);
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let mut ledger = HistoryLedger::new();
        let (e, x) = ids("1");
        ledger
            .create_history_entry(e.clone(), x.clone(), "a", TreeId::new("t1"), true)
            .unwrap();
        assert_eq!(
            ledger.create_history_entry(e.clone(), x, "a", TreeId::new("t1"), true),
            Err(LedgerError::DuplicateEntry(e))
        );
    }

    #[test]
    fn test_exchange_protocol_violations() {
        let mut ledger = HistoryLedger::new();
        let (e, x) = ids("1");
        let x2 = ExchangeId::new("x-2");

        // Unknown entry
        assert!(matches!(
            ledger.start_exchange(&e, x.clone()),
            Err(LedgerError::UnknownEntry(_))
        ));

        ledger
            .create_history_entry(e.clone(), x.clone(), "a", TreeId::new("t1"), true)
            .unwrap();

        // Duplicate exchange id
        assert!(matches!(
            ledger.start_exchange(&e, x.clone()),
            Err(LedgerError::DuplicateExchange { .. })
        ));

        // Closing an exchange that was never opened
        assert!(matches!(
            ledger.end_exchange(&e, &x2),
            Err(LedgerError::ExchangeNotOpen { .. })
        ));

        // Double close
        ledger.start_exchange(&e, x2.clone()).unwrap();
        ledger.end_exchange(&e, &x2).unwrap();
        assert!(matches!(
            ledger.end_exchange(&e, &x2),
            Err(LedgerError::ExchangeNotOpen { .. })
        ));
    }

    #[test]
    fn test_empty_completed_entry_is_discarded() {
        let mut ledger = HistoryLedger::new();
        let (e, x) = ids("1");
        ledger
            .create_history_entry(e.clone(), x.clone(), "noop", TreeId::new("t1"), true)
            .unwrap();
        ledger
            .add_tree_patch_record(e.clone(), x, PatchRecord::empty(TreeId::new("t1"), "noop"))
            .unwrap();

        assert!(ledger.entry(&e).is_none());
        assert_eq!(ledger.entries().count(), 0);
        assert_eq!(ledger.undo_stack().len(), 0);
    }

    #[test]
    fn test_entry_completes_only_when_all_exchanges_close() {
        let mut ledger = HistoryLedger::new();
        let (e, x) = ids("1");
        let x2 = ExchangeId::new("x-2");
        let x3 = ExchangeId::new("x-3");

        ledger
            .create_history_entry(e.clone(), x.clone(), "a", TreeId::new("t1"), true)
            .unwrap();
        ledger.start_exchange(&e, x2.clone()).unwrap();
        ledger.start_exchange(&e, x3.clone()).unwrap();

        ledger
            .add_tree_patch_record(e.clone(), x, record("t1", "a"))
            .unwrap();
        assert!(!ledger.entry(&e).unwrap().is_complete());

        ledger.end_exchange(&e, &x2).unwrap();
        assert!(!ledger.entry(&e).unwrap().is_complete());

        ledger
            .add_tree_patch_record(e.clone(), x3, record("t2", "a"))
            .unwrap();
        let entry = ledger.entry(&e).unwrap();
        assert!(entry.is_complete());
        assert_eq!(entry.records.len(), 2);
    }

    #[test]
    fn test_unrelated_entries_record_concurrently() {
        let mut ledger = HistoryLedger::new();
        let (ea, xa) = ids("a");
        let (eb, xb) = ids("b");
        let xa2 = ExchangeId::new("x-a2");
        let xb2 = ExchangeId::new("x-b2");

        // Two independent entries open, each with a fan-out exchange.
        ledger
            .create_history_entry(ea.clone(), xa.clone(), "editA", TreeId::new("t1"), true)
            .unwrap();
        ledger
            .create_history_entry(eb.clone(), xb.clone(), "editB", TreeId::new("t2"), true)
            .unwrap();
        ledger.start_exchange(&ea, xa2.clone()).unwrap();
        ledger.start_exchange(&eb, xb2.clone()).unwrap();

        // Deliveries interleave across the entries.
        ledger
            .add_tree_patch_record(eb.clone(), xb, record("t2", "editB"))
            .unwrap();
        ledger
            .add_tree_patch_record(ea.clone(), xa, record("t1", "editA"))
            .unwrap();
        assert!(!ledger.entry(&ea).unwrap().is_complete());
        assert!(!ledger.entry(&eb).unwrap().is_complete());

        // A completes while B is still recording.
        ledger.end_exchange(&ea, &xa2).unwrap();
        assert!(ledger.entry(&ea).unwrap().is_complete());
        assert!(!ledger.entry(&eb).unwrap().is_complete());

        ledger
            .add_tree_patch_record(eb.clone(), xb2, record("t3", "editB"))
            .unwrap();
        let b = ledger.entry(&eb).unwrap();
        assert!(b.is_complete());
        assert_eq!(b.records.len(), 2);
        assert_eq!(ledger.entry(&ea).unwrap().records.len(), 1);

        // Undo stack reflects completion order: A below B.
        assert_eq!(ledger.undo_stack().len(), 2);
        assert_eq!(ledger.undo_stack().peek_undo(), Some(&eb));
        ledger.undo_stack_mut().commit_undo();
        assert_eq!(ledger.undo_stack().peek_undo(), Some(&ea));
    }

    #[test]
    fn test_out_of_order_record_creates_entry_lazily() {
        let mut ledger = HistoryLedger::new();
        let (e, x) = ids("1");

        ledger
            .add_tree_patch_record(e.clone(), x, record("t1", "lateArrival"))
            .unwrap();

        let entry = ledger.entry(&e).unwrap();
        assert!(entry.is_complete());
        // Lazily created entries are not undoable by default.
        assert!(!entry.undoable);
        assert_eq!(ledger.undo_stack().len(), 0);
    }

    #[test]
    fn test_record_for_completed_entry_rejected() {
        let mut ledger = HistoryLedger::new();
        let (e, x) = ids("1");
        ledger
            .create_history_entry(e.clone(), x.clone(), "a", TreeId::new("t1"), true)
            .unwrap();
        ledger
            .add_tree_patch_record(e.clone(), x.clone(), record("t1", "a"))
            .unwrap();

        assert_eq!(
            ledger.add_tree_patch_record(e.clone(), x, record("t1", "a")),
            Err(LedgerError::EntryComplete(e))
        );
    }

    #[test]
    fn test_completed_entries_reach_sink() {
        let mut ledger = HistoryLedger::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        ledger.set_completed_sink(tx);

        let (e, x) = ids("1");
        ledger
            .create_history_entry(e.clone(), x.clone(), "a", TreeId::new("t1"), true)
            .unwrap();
        ledger
            .add_tree_patch_record(e.clone(), x, record("t1", "a"))
            .unwrap();

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.id, e);
        assert!(sent.is_complete());

        // Empty entries never reach the sink.
        let (e2, x2) = ids("2");
        ledger
            .create_history_entry(e2.clone(), x2.clone(), "noop", TreeId::new("t1"), true)
            .unwrap();
        ledger
            .add_tree_patch_record(e2, x2, PatchRecord::empty(TreeId::new("t1"), "noop"))
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
