//! # Tree/Container Contract
//!
//! The container→tree half of the protocol. Every method returns an
//! awaited completion: the container must not consider an undo, redo,
//! or bulk load complete until begin/apply/finish round-trips for every
//! affected tree.
//!
//! The tree→container half is the [`crate::Container`] ledger surface
//! (`add_history_entry`, `start_exchange`, `add_tree_patch_record`).
//!
//! Exchange ownership: the exchange id passed into these methods is
//! owned by the container, which closes it after the call resolves. A
//! tree that wants its own changes recorded under the same entry must
//! open a fresh exchange via `Container::start_exchange` and deliver a
//! record for it, never by closing the one it was handed.

use arbor_patch::{EntryId, ExchangeId, PatchError, PatchOp};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("tree rejected operation: {0}")]
    Rejected(String),
}

/// An independently-owned unit of document state capable of receiving
/// external patches and shared-model updates.
#[async_trait]
pub trait Tree: Send + Sync {
    /// Disable shared-model auto-propagation before external patches
    /// are applied, so replay never re-enters the user-action path.
    async fn start_applying_container_patches(
        &self,
        entry_id: &EntryId,
        exchange_id: &ExchangeId,
    ) -> Result<(), TreeError>;

    /// Apply patches in strict array order.
    async fn apply_container_patches(
        &self,
        entry_id: &EntryId,
        exchange_id: &ExchangeId,
        patches: &[PatchOp],
    ) -> Result<(), TreeError>;

    /// Re-enable propagation and force a resync of derived state.
    async fn finish_applying_container_patches(
        &self,
        entry_id: &EntryId,
        exchange_id: &ExchangeId,
    ) -> Result<(), TreeError>;

    /// Receive the new value of a shared model this tree holds a view
    /// of. Acknowledging gates completion of the originating action.
    async fn apply_shared_model_snapshot_from_container(
        &self,
        entry_id: &EntryId,
        exchange_id: &ExchangeId,
        snapshot: Value,
    ) -> Result<(), TreeError>;
}
