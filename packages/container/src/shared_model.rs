//! Shared-model registry.
//!
//! A shared model is state logically owned by one tree but readable and
//! writable by others through explicit propagation. Which subtree of a
//! tree's state belongs to which model is declared once, at mount time;
//! classification at capture time is a segment-wise prefix compare.

use crate::error::ContainerError;
use arbor_patch::{PatchPath, SharedModelId, TreeId};
use serde_json::Value;
use std::collections::HashMap;

/// Declares that the state subtree under `root` in one tree belongs to
/// shared model `model`.
#[derive(Debug, Clone)]
pub struct SharedModelBinding {
    pub model: SharedModelId,
    pub root: PatchPath,
}

struct ModelState {
    /// Last known value, used to suppress no-op propagation.
    value: Value,
    /// Trees holding a view, in mount order (deterministic fan-out).
    views: Vec<TreeId>,
}

#[derive(Default)]
pub struct SharedModelRegistry {
    models: HashMap<SharedModelId, ModelState>,
    bindings: HashMap<TreeId, Vec<SharedModelBinding>>,
}

impl SharedModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a view of `model` into `tree` at `root`. The first mount
    /// establishes the model with `initial` as its value.
    pub fn mount(
        &mut self,
        tree: &TreeId,
        model: SharedModelId,
        root: PatchPath,
        initial: Value,
    ) -> Result<(), ContainerError> {
        let tree_bindings = self.bindings.entry(tree.clone()).or_default();
        if tree_bindings.iter().any(|b| b.model == model) {
            return Err(ContainerError::AlreadyMounted {
                tree: tree.clone(),
                model,
            });
        }
        tree_bindings.push(SharedModelBinding {
            model: model.clone(),
            root,
        });

        let state = self.models.entry(model).or_insert(ModelState {
            value: initial,
            views: vec![],
        });
        state.views.push(tree.clone());
        Ok(())
    }

    /// Drop every binding and view for a deregistered tree.
    pub fn unmount_tree(&mut self, tree: &TreeId) {
        self.bindings.remove(tree);
        for state in self.models.values_mut() {
            state.views.retain(|t| t != tree);
        }
    }

    pub fn bindings_for(&self, tree: &TreeId) -> Vec<SharedModelBinding> {
        self.bindings.get(tree).cloned().unwrap_or_default()
    }

    pub fn root_for(&self, tree: &TreeId, model: &SharedModelId) -> Option<PatchPath> {
        self.bindings
            .get(tree)?
            .iter()
            .find(|b| &b.model == model)
            .map(|b| b.root.clone())
    }

    /// Trees holding a view of `model`, in mount order.
    pub fn views_of(&self, model: &SharedModelId) -> Vec<TreeId> {
        self.models
            .get(model)
            .map(|s| s.views.clone())
            .unwrap_or_default()
    }

    pub fn value(&self, model: &SharedModelId) -> Option<&Value> {
        self.models.get(model).map(|s| &s.value)
    }

    /// Store the model's new value. Returns false when nothing changed,
    /// in which case propagation is skipped.
    pub fn update_value(
        &mut self,
        model: &SharedModelId,
        new_value: Value,
    ) -> Result<bool, ContainerError> {
        let state = self
            .models
            .get_mut(model)
            .ok_or_else(|| ContainerError::UnknownSharedModel(model.clone()))?;
        if state.value == new_value {
            return Ok(false);
        }
        state.value = new_value;
        Ok(true)
    }
}
