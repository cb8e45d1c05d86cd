//! Explicit tree registry owned by the container.
//!
//! Trees register and deregister through the container; there is no
//! ambient global registry.

use crate::contract::Tree;
use crate::error::ContainerError;
use arbor_patch::TreeId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct TreeRegistry {
    trees: HashMap<TreeId, Arc<dyn Tree>>,
}

impl TreeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: TreeId, tree: Arc<dyn Tree>) -> Result<(), ContainerError> {
        if self.trees.contains_key(&id) {
            return Err(ContainerError::TreeAlreadyRegistered(id));
        }
        self.trees.insert(id, tree);
        Ok(())
    }

    pub fn deregister(&mut self, id: &TreeId) -> Option<Arc<dyn Tree>> {
        self.trees.remove(id)
    }

    pub fn get(&self, id: &TreeId) -> Option<Arc<dyn Tree>> {
        self.trees.get(id).cloned()
    }

    pub fn contains(&self, id: &TreeId) -> bool {
        self.trees.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
