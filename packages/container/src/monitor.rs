//! # Action-Tracking Monitor
//!
//! The interception layer wrapping every mutating operation on a tree.
//!
//! An [`ActionScope`] captures the structural mutations an operation
//! produces: each staged [`PatchPair`] is applied to the tree's local
//! state, tested against the mounted shared-model bindings, and kept
//! for the record. On failure the scope replays the inverses in reverse
//! order: local rollback only, the ledger never hears about it.
//!
//! Nesting: only the outermost operation owns the record. Nested
//! operations run through [`ActionScope::run_nested`] and fold their
//! mutations into the enclosing scope.

use crate::error::ContainerError;
use crate::shared_model::SharedModelBinding;
use arbor_patch::{EntryId, ExchangeId, PatchError, PatchPair, PatchPath, SharedModelId};
use serde_json::Value;

/// Who initiated an action. Replaces name-based sniffing of
/// coordinator-originated operations with an explicit call-site tag.
#[derive(Debug, Clone)]
pub enum EntryOrigin {
    /// A user action: mints fresh ids and opens a new ledger entry.
    User { undoable: bool },
    /// A coordinator-requested operation: records into the entry and
    /// exchange supplied by the coordinator.
    Coordinator {
        entry: EntryId,
        exchange: ExchangeId,
    },
}

/// Monitor configuration: which state regions are internally
/// meaningless (transient counters and the like) and get filtered out
/// of assembled records.
#[derive(Default)]
pub struct ActionMonitor {
    transient: Vec<PatchPath>,
}

impl ActionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transient_paths(transient: Vec<PatchPath>) -> Self {
        Self { transient }
    }

    fn is_transient(&self, pair: &PatchPair) -> bool {
        self.transient
            .iter()
            .any(|prefix| pair.forward.path().starts_with(prefix))
    }

    /// Drop internally-meaningless pairs before the record is built.
    pub(crate) fn filter(&self, pairs: Vec<PatchPair>) -> Vec<PatchPair> {
        pairs.into_iter().filter(|p| !self.is_transient(p)).collect()
    }
}

/// Scoped capture of one operation's structural mutations.
pub struct ActionScope<'a> {
    state: &'a mut Value,
    bindings: Vec<SharedModelBinding>,
    staged: Vec<PatchPair>,
    /// Per-model modification counters, in first-touch order.
    touched: Vec<(SharedModelId, usize)>,
}

impl<'a> ActionScope<'a> {
    pub(crate) fn new(state: &'a mut Value, bindings: Vec<SharedModelBinding>) -> Self {
        Self {
            state,
            bindings,
            staged: vec![],
            touched: vec![],
        }
    }

    /// Read-only view of the tree state mid-operation.
    pub fn state(&self) -> &Value {
        self.state
    }

    /// Apply and capture a prepared pair.
    pub fn apply_pair(&mut self, pair: PatchPair) -> Result<(), PatchError> {
        pair.forward.apply(self.state)?;
        self.classify(&pair);
        self.staged.push(pair);
        Ok(())
    }

    /// Replace the value at `path`, capturing the inverse.
    pub fn replace(&mut self, path: PatchPath, value: Value) -> Result<(), PatchError> {
        let pair = PatchPair::replace(self.state, path, value)?;
        self.apply_pair(pair)
    }

    /// Add a value at `path`; the inverse removes it.
    pub fn add(&mut self, path: PatchPath, value: Value) -> Result<(), PatchError> {
        self.apply_pair(PatchPair::add(path, value))
    }

    /// Remove the value at `path`, capturing it for the inverse.
    pub fn remove(&mut self, path: PatchPath) -> Result<(), PatchError> {
        let pair = PatchPair::remove(self.state, path)?;
        self.apply_pair(pair)
    }

    /// Run a nested operation. Its mutations fold into this scope; it
    /// never gets an entry of its own.
    pub fn run_nested<F>(&mut self, f: F) -> Result<(), ContainerError>
    where
        F: FnOnce(&mut ActionScope<'_>) -> Result<(), ContainerError>,
    {
        f(self)
    }

    fn classify(&mut self, pair: &PatchPair) {
        for binding in &self.bindings {
            if pair.forward.path().starts_with(&binding.root) {
                match self.touched.iter_mut().find(|(m, _)| m == &binding.model) {
                    Some((_, count)) => *count += 1,
                    None => self.touched.push((binding.model.clone(), 1)),
                }
            }
        }
    }

    /// Roll back everything staged, in reverse order. Inverses are
    /// exact by construction; a failure here means the state was
    /// mutated outside the scope and is logged, not propagated.
    pub(crate) fn rollback(&mut self) {
        for pair in self.staged.drain(..).rev() {
            if let Err(err) = pair.inverse.apply(self.state) {
                tracing::error!(%err, path = %pair.inverse.path(), "rollback patch failed");
            }
        }
        self.touched.clear();
    }

    /// Consume the scope, yielding staged pairs and touched models.
    pub(crate) fn finish(self) -> (Vec<PatchPair>, Vec<(SharedModelId, usize)>) {
        (self.staged, self.touched)
    }
}
