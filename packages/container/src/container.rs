//! # Container Coordinator
//!
//! Owns the tree registry, the shared-model registry, the history
//! ledger, and the undo stack, and runs the action-tracking monitor.
//!
//! Concurrency model: cooperative async. None of the internal locks is
//! held across an await; the ledger's exchange counts are the only
//! cross-task barrier. Two unrelated actions may record concurrently;
//! their exchange sets never overlap.

use crate::contract::Tree;
use crate::error::ContainerError;
use crate::monitor::{ActionMonitor, ActionScope, EntryOrigin};
use crate::registry::TreeRegistry;
use crate::shared_model::SharedModelRegistry;
use arbor_history::{HistoryEntry, HistoryLedger};
use arbor_patch::{
    resolve, EntryId, ExchangeId, PatchPath, PatchRecord, SharedModelId, TreeId,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct Container {
    trees: Mutex<TreeRegistry>,
    shared: Mutex<SharedModelRegistry>,
    ledger: Mutex<HistoryLedger>,
    monitor: ActionMonitor,
}

impl Container {
    pub fn new() -> Self {
        Self::with_monitor(ActionMonitor::new())
    }

    /// Build a container with a configured monitor (transient-path
    /// filtering).
    pub fn with_monitor(monitor: ActionMonitor) -> Self {
        Self {
            trees: Mutex::new(TreeRegistry::new()),
            shared: Mutex::new(SharedModelRegistry::new()),
            ledger: Mutex::new(HistoryLedger::new()),
            monitor,
        }
    }

    // ---- registration --------------------------------------------------

    pub fn register_tree(&self, id: TreeId, tree: Arc<dyn Tree>) -> Result<(), ContainerError> {
        self.trees.lock().unwrap().register(id, tree)
    }

    /// Deregister a tree and drop its shared-model views.
    pub fn deregister_tree(&self, id: &TreeId) {
        self.trees.lock().unwrap().deregister(id);
        self.shared.lock().unwrap().unmount_tree(id);
    }

    /// Declare, at mount time, that the subtree under `root` of `tree`'s
    /// state belongs to shared model `model`.
    pub fn mount_shared_model(
        &self,
        tree: &TreeId,
        model: SharedModelId,
        root: PatchPath,
        initial: Value,
    ) -> Result<(), ContainerError> {
        if !self.trees.lock().unwrap().contains(tree) {
            return Err(ContainerError::UnknownTree(tree.clone()));
        }
        self.shared.lock().unwrap().mount(tree, model, root, initial)
    }

    // ---- the monitor path ----------------------------------------------

    /// Run one mutating operation on a tree under the action-tracking
    /// monitor.
    ///
    /// On success: opens (or reuses, for coordinator origin) a history
    /// entry, awaits shared-model propagation to every dependent tree,
    /// then delivers the filtered patch record, which also closes the
    /// action's exchange. Propagation finishing before the action
    /// reports done is what keeps undo ordering correct.
    ///
    /// On failure: every captured mutation is rolled back via its
    /// inverse and the ledger is never notified.
    pub async fn run_action<F>(
        &self,
        tree_id: &TreeId,
        action: &str,
        origin: EntryOrigin,
        state: &mut Value,
        f: F,
    ) -> Result<EntryId, ContainerError>
    where
        F: FnOnce(&mut ActionScope<'_>) -> Result<(), ContainerError>,
    {
        let bindings = self.shared.lock().unwrap().bindings_for(tree_id);
        let mut scope = ActionScope::new(&mut *state, bindings);

        if let Err(err) = f(&mut scope) {
            scope.rollback();
            tracing::debug!(tree = %tree_id, action, %err, "action failed; rolled back locally");
            return Err(ContainerError::ActionFailed {
                action: action.to_string(),
                source: Box::new(err),
            });
        }
        let (staged, touched) = scope.finish();

        let (entry_id, exchange_id) = match origin {
            EntryOrigin::User { undoable } => {
                let entry_id = EntryId::mint();
                let exchange_id = ExchangeId::mint();
                self.ledger.lock().unwrap().create_history_entry(
                    entry_id.clone(),
                    exchange_id.clone(),
                    action,
                    tree_id.clone(),
                    undoable,
                )?;
                (entry_id, exchange_id)
            }
            EntryOrigin::Coordinator { entry, exchange } => (entry, exchange),
        };

        // Propagation barrier: dependents must acknowledge before the
        // record is delivered and this action reports done.
        let mut push_failure = None;
        for (model, count) in touched {
            debug_assert!(count > 0);
            if let Some(failure) = self
                .propagate_shared_model(tree_id, &model, &entry_id, state)
                .await?
            {
                if push_failure.is_none() {
                    push_failure = Some(failure);
                }
            }
        }

        let record =
            PatchRecord::from_pairs(tree_id.clone(), action, self.monitor.filter(staged));
        self.ledger
            .lock()
            .unwrap()
            .add_tree_patch_record(entry_id.clone(), exchange_id, record)?;

        match push_failure {
            Some(err) => Err(err),
            None => Ok(entry_id),
        }
    }

    /// Fan out one shared model's new value to every other tree holding
    /// a view of it, one awaited exchange per dependent.
    ///
    /// A dependent failing to apply the push does not abort the entry:
    /// its exchange still closes so the entry completes, and the
    /// failure is surfaced to the caller afterwards (see DESIGN.md).
    async fn propagate_shared_model(
        &self,
        origin_tree: &TreeId,
        model: &SharedModelId,
        entry_id: &EntryId,
        state: &Value,
    ) -> Result<Option<ContainerError>, ContainerError> {
        let root = {
            let shared = self.shared.lock().unwrap();
            shared
                .root_for(origin_tree, model)
                .ok_or_else(|| ContainerError::UnknownSharedModel(model.clone()))?
        };
        let snapshot = resolve(state, &root).cloned().unwrap_or(Value::Null);

        let changed = self
            .shared
            .lock()
            .unwrap()
            .update_value(model, snapshot.clone())?;
        if !changed {
            tracing::trace!(%model, "shared model unchanged; skipping propagation");
            return Ok(None);
        }

        let dependents: Vec<TreeId> = self
            .shared
            .lock()
            .unwrap()
            .views_of(model)
            .into_iter()
            .filter(|t| t != origin_tree)
            .collect();

        let mut failure = None;
        for dependent in dependents {
            let tree = self.tree(&dependent)?;
            let exchange = ExchangeId::mint();
            self.ledger
                .lock()
                .unwrap()
                .start_exchange(entry_id, exchange.clone())?;

            let result = tree
                .apply_shared_model_snapshot_from_container(entry_id, &exchange, snapshot.clone())
                .await;

            self.ledger.lock().unwrap().end_exchange(entry_id, &exchange)?;

            if let Err(err) = result {
                tracing::error!(tree = %dependent, %model, %err, "shared model push failed");
                if failure.is_none() {
                    failure = Some(ContainerError::SharedModelPushFailed {
                        tree: dependent.clone(),
                        source: err,
                    });
                }
            }
        }
        Ok(failure)
    }

    // ---- tree → coordinator surface --------------------------------------

    /// Open a history entry on behalf of a tree (out-of-process trees
    /// call this instead of going through [`Container::run_action`]).
    pub fn add_history_entry(
        &self,
        entry_id: EntryId,
        exchange_id: ExchangeId,
        tree: TreeId,
        action: &str,
        undoable: bool,
    ) -> Result<(), ContainerError> {
        self.ledger
            .lock()
            .unwrap()
            .create_history_entry(entry_id, exchange_id, action, tree, undoable)
            .map_err(Into::into)
    }

    pub fn start_exchange(
        &self,
        entry_id: &EntryId,
        exchange_id: ExchangeId,
    ) -> Result<(), ContainerError> {
        self.ledger
            .lock()
            .unwrap()
            .start_exchange(entry_id, exchange_id)
            .map_err(Into::into)
    }

    /// Deliver one tree's patch record; also closes the tagged exchange.
    pub fn add_tree_patch_record(
        &self,
        entry_id: EntryId,
        exchange_id: ExchangeId,
        record: PatchRecord,
    ) -> Result<(), ContainerError> {
        self.ledger
            .lock()
            .unwrap()
            .add_tree_patch_record(entry_id, exchange_id, record)
            .map_err(Into::into)
    }

    // ---- introspection ----------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.ledger.lock().unwrap().undo_stack().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.ledger.lock().unwrap().undo_stack().can_redo()
    }

    pub fn history_entry(&self, id: &EntryId) -> Option<HistoryEntry> {
        self.ledger.lock().unwrap().entry(id).cloned()
    }

    /// Snapshot of the ledger in creation order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.ledger.lock().unwrap().entries().cloned().collect()
    }

    /// Attach a durable-persistence sink; completed non-empty entries
    /// arrive on the returned receiver.
    pub fn completed_entries(&self) -> mpsc::UnboundedReceiver<HistoryEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ledger.lock().unwrap().set_completed_sink(tx);
        rx
    }

    pub(crate) fn tree(&self, id: &TreeId) -> Result<Arc<dyn Tree>, ContainerError> {
        self.trees
            .lock()
            .unwrap()
            .get(id)
            .ok_or_else(|| ContainerError::UnknownTree(id.clone()))
    }

    pub(crate) fn with_ledger<R>(&self, f: impl FnOnce(&mut HistoryLedger) -> R) -> R {
        f(&mut self.ledger.lock().unwrap())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}
