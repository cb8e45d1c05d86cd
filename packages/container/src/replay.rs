//! # Undo/Redo Replay Engine
//!
//! Orchestrates inverse/forward patch replay across the affected trees.
//!
//! Every round trip to a tree (begin, apply, finish) is wrapped as a
//! fresh non-undoable coordinator-origin history entry whose single
//! exchange the container closes with an empty record, so the replay
//! itself is never undoable and never re-enters the monitor's normal
//! user-action path. Wrapper entries complete empty and are discarded
//! by the ledger.
//!
//! Control flow is plain async functions with sequential awaits; the
//! undo cursor moves only after every affected tree acknowledged
//! "finish".
//!
//! Replaying one entry groups its records per tree and runs a single
//! begin/apply/finish cycle per tree, rather than one cycle per record.
//! This is observationally equivalent to record-by-record replay: each
//! record's patches touch only its own tree, the grouped array keeps
//! every tree's ops in the same relative order the records prescribe,
//! and a tree's begin/finish bracket suppresses propagation for the
//! whole batch just as it would for each record individually.

use crate::container::Container;
use crate::contract::{Tree, TreeError};
use crate::error::ContainerError;
use arbor_history::HistoryEntry;
use arbor_patch::{EntryId, ExchangeId, PatchOp, PatchRecord, TreeId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    Undo,
    Redo,
}

impl Container {
    /// Replay the entry left of the cursor: inverse patches, reverse
    /// record order. The cursor decrements only after every affected
    /// tree acknowledged "finish".
    pub async fn undo(&self) -> Result<EntryId, ContainerError> {
        let entry = self.cursor_entry(Direction::Undo)?;
        tracing::debug!(entry = %entry.id, action = %entry.action, "undo");
        self.replay_entry(&entry, Direction::Undo).await?;
        self.with_ledger(|ledger| ledger.undo_stack_mut().commit_undo());
        Ok(entry.id)
    }

    /// Replay the entry right of the cursor: forward patches, forward
    /// record order.
    pub async fn redo(&self) -> Result<EntryId, ContainerError> {
        let entry = self.cursor_entry(Direction::Redo)?;
        tracing::debug!(entry = %entry.id, action = %entry.action, "redo");
        self.replay_entry(&entry, Direction::Redo).await?;
        self.with_ledger(|ledger| ledger.undo_stack_mut().commit_redo());
        Ok(entry.id)
    }

    /// Bulk initial load: replay persisted entries into the registered
    /// trees. Per-tree patches are coalesced across entries into one
    /// ordered array, one begin/apply/finish cycle per tree, purely
    /// for throughput. Loaded entries do not populate the undo stack.
    pub async fn load_history(&self, entries: &[HistoryEntry]) -> Result<(), ContainerError> {
        let mut per_tree: Vec<(TreeId, Vec<PatchOp>)> = vec![];
        for entry in entries {
            for record in &entry.records {
                let ops = record.patches.iter().cloned();
                push_ops(&mut per_tree, &record.tree, ops);
            }
        }
        for (tree_id, ops) in per_tree {
            self.apply_to_tree(&tree_id, &ops, "history.load").await?;
        }
        Ok(())
    }

    fn cursor_entry(&self, direction: Direction) -> Result<HistoryEntry, ContainerError> {
        self.with_ledger(|ledger| {
            let id = match direction {
                Direction::Undo => ledger
                    .undo_stack()
                    .peek_undo()
                    .ok_or(ContainerError::NothingToUndo)?,
                Direction::Redo => ledger
                    .undo_stack()
                    .peek_redo()
                    .ok_or(ContainerError::NothingToRedo)?,
            }
            .clone();
            ledger
                .entry(&id)
                .cloned()
                .ok_or(ContainerError::Ledger(arbor_history::LedgerError::UnknownEntry(id)))
        })
    }

    async fn replay_entry(
        &self,
        entry: &HistoryEntry,
        direction: Direction,
    ) -> Result<(), ContainerError> {
        // Group ops per tree, preserving replay order: undo walks the
        // records backwards and each record's inverses backwards, which
        // correctly inverts interleaved cross-tree effects.
        let mut per_tree: Vec<(TreeId, Vec<PatchOp>)> = vec![];
        match direction {
            Direction::Undo => {
                for record in entry.records.iter().rev() {
                    let ops = record.inverse_patches.iter().rev().cloned();
                    push_ops(&mut per_tree, &record.tree, ops);
                }
            }
            Direction::Redo => {
                for record in &entry.records {
                    let ops = record.patches.iter().cloned();
                    push_ops(&mut per_tree, &record.tree, ops);
                }
            }
        }

        let action = match direction {
            Direction::Undo => "history.undo",
            Direction::Redo => "history.redo",
        };
        for (tree_id, ops) in per_tree {
            self.apply_to_tree(&tree_id, &ops, action).await?;
        }
        Ok(())
    }

    /// The begin/apply/finish cycle against one tree, each leg wrapped
    /// as its own non-undoable entry.
    async fn apply_to_tree(
        &self,
        tree_id: &TreeId,
        ops: &[PatchOp],
        action: &str,
    ) -> Result<(), ContainerError> {
        let tree = self.tree(tree_id)?;

        self.wrapped_call(&tree, tree_id, action, |tree, e, x| async move {
            tree.start_applying_container_patches(&e, &x).await
        })
        .await?;

        let ops_owned = ops.to_vec();
        self.wrapped_call(&tree, tree_id, action, |tree, e, x| async move {
            tree.apply_container_patches(&e, &x, &ops_owned).await
        })
        .await?;

        self.wrapped_call(&tree, tree_id, action, |tree, e, x| async move {
            tree.finish_applying_container_patches(&e, &x).await
        })
        .await
    }

    /// Run one container→tree call inside a fresh coordinator-origin
    /// entry. The wrapper exchange is always closed, even when the call
    /// fails, so the ledger never leaks an open entry.
    async fn wrapped_call<F, Fut>(
        &self,
        tree: &Arc<dyn Tree>,
        tree_id: &TreeId,
        action: &str,
        call: F,
    ) -> Result<(), ContainerError>
    where
        F: FnOnce(Arc<dyn Tree>, EntryId, ExchangeId) -> Fut,
        Fut: std::future::Future<Output = Result<(), TreeError>>,
    {
        let entry_id = EntryId::mint();
        let exchange_id = ExchangeId::mint();
        self.with_ledger(|ledger| {
            ledger.create_history_entry(
                entry_id.clone(),
                exchange_id.clone(),
                action,
                tree_id.clone(),
                false,
            )
        })?;

        let result = call(tree.clone(), entry_id.clone(), exchange_id.clone()).await;

        self.with_ledger(|ledger| {
            ledger.add_tree_patch_record(
                entry_id,
                exchange_id,
                PatchRecord::empty(tree_id.clone(), action),
            )
        })?;

        result.map_err(Into::into)
    }
}

fn push_ops(
    per_tree: &mut Vec<(TreeId, Vec<PatchOp>)>,
    tree: &TreeId,
    ops: impl Iterator<Item = PatchOp>,
) {
    match per_tree.iter_mut().find(|(t, _)| t == tree) {
        Some((_, existing)) => existing.extend(ops),
        None => per_tree.push((tree.clone(), ops.collect())),
    }
}
