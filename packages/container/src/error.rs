use crate::contract::TreeError;
use arbor_history::LedgerError;
use arbor_patch::{PatchError, SharedModelId, TreeId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("tree not registered: {0}")]
    UnknownTree(TreeId),

    #[error("tree already registered: {0}")]
    TreeAlreadyRegistered(TreeId),

    #[error("shared model {model} already mounted on tree {tree}")]
    AlreadyMounted {
        tree: TreeId,
        model: SharedModelId,
    },

    #[error("unknown shared model: {0}")]
    UnknownSharedModel(SharedModelId),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    /// The action body failed; all captured mutations were rolled back
    /// and the ledger was never notified.
    #[error("action '{action}' failed and was rolled back")]
    ActionFailed {
        action: String,
        #[source]
        source: Box<ContainerError>,
    },

    /// A dependent tree failed to apply a shared-model push. The
    /// originating entry still completes; see DESIGN.md.
    #[error("shared model push to tree {tree} failed")]
    SharedModelPushFailed {
        tree: TreeId,
        #[source]
        source: TreeError,
    },

    /// Domain-level failure raised by an action body.
    #[error("action error: {0}")]
    Action(String),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}
