//! Test tree: a minimal `Tree` over a JSON state document.
//!
//! Mirrors what a real editor tree does at the contract boundary:
//! applies container patches in order, toggles propagation around
//! replay, counts resyncs, and writes incoming shared-model snapshots
//! under its own mount root.

use arbor_container::{Container, ContainerError, EntryOrigin, Tree, TreeError};
use arbor_patch::{EntryId, ExchangeId, PatchOp, PatchPath, TreeId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(vec![]))
}

pub struct JsonTree {
    pub id: TreeId,
    state: tokio::sync::Mutex<Value>,
    propagation_enabled: AtomicBool,
    resync_count: AtomicUsize,
    reject_snapshots: AtomicBool,
    shared_root: Option<PatchPath>,
    events: EventLog,
}

impl JsonTree {
    pub fn new(id: impl Into<TreeId>, initial: Value, events: EventLog) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            state: tokio::sync::Mutex::new(initial),
            propagation_enabled: AtomicBool::new(true),
            resync_count: AtomicUsize::new(0),
            reject_snapshots: AtomicBool::new(false),
            shared_root: None,
            events,
        })
    }

    /// A tree that holds a view of a shared model mounted at `root`.
    pub fn with_shared_root(
        id: impl Into<TreeId>,
        initial: Value,
        root: PatchPath,
        events: EventLog,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            state: tokio::sync::Mutex::new(initial),
            propagation_enabled: AtomicBool::new(true),
            resync_count: AtomicUsize::new(0),
            reject_snapshots: AtomicBool::new(false),
            shared_root: Some(root),
            events,
        })
    }

    /// Make every subsequent shared-model push fail, simulating a
    /// dependent tree that cannot apply the new value.
    pub fn reject_snapshot_pushes(&self) {
        self.reject_snapshots.store(true, Ordering::SeqCst);
    }

    pub async fn state(&self) -> Value {
        self.state.lock().await.clone()
    }

    pub fn resyncs(&self) -> usize {
        self.resync_count.load(Ordering::SeqCst)
    }

    pub fn propagation_enabled(&self) -> bool {
        self.propagation_enabled.load(Ordering::SeqCst)
    }

    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    /// Run a user action on this tree under the container's monitor.
    pub async fn run_action<F>(
        &self,
        container: &Container,
        action: &str,
        f: F,
    ) -> Result<EntryId, ContainerError>
    where
        F: FnOnce(&mut arbor_container::ActionScope<'_>) -> Result<(), ContainerError>,
    {
        let mut state = self.state.lock().await;
        let result = container
            .run_action(
                &self.id,
                action,
                EntryOrigin::User { undoable: true },
                &mut state,
                f,
            )
            .await;
        drop(state);
        self.log(format!("{}:action-complete:{}", self.id, action));
        result
    }
}

#[async_trait]
impl Tree for JsonTree {
    async fn start_applying_container_patches(
        &self,
        _entry_id: &EntryId,
        _exchange_id: &ExchangeId,
    ) -> Result<(), TreeError> {
        self.propagation_enabled.store(false, Ordering::SeqCst);
        self.log(format!("{}:start", self.id));
        Ok(())
    }

    async fn apply_container_patches(
        &self,
        _entry_id: &EntryId,
        _exchange_id: &ExchangeId,
        patches: &[PatchOp],
    ) -> Result<(), TreeError> {
        let mut state = self.state.lock().await;
        for op in patches {
            op.apply(&mut state)?;
        }
        self.log(format!("{}:apply:{}", self.id, patches.len()));
        Ok(())
    }

    async fn finish_applying_container_patches(
        &self,
        _entry_id: &EntryId,
        _exchange_id: &ExchangeId,
    ) -> Result<(), TreeError> {
        self.propagation_enabled.store(true, Ordering::SeqCst);
        self.resync_count.fetch_add(1, Ordering::SeqCst);
        self.log(format!("{}:finish", self.id));
        Ok(())
    }

    async fn apply_shared_model_snapshot_from_container(
        &self,
        _entry_id: &EntryId,
        _exchange_id: &ExchangeId,
        snapshot: Value,
    ) -> Result<(), TreeError> {
        if self.reject_snapshots.load(Ordering::SeqCst) {
            self.log(format!("{}:shared-model-push-rejected", self.id));
            return Err(TreeError::Rejected("snapshot rejected".into()));
        }
        if let Some(root) = &self.shared_root {
            let mut state = self.state.lock().await;
            PatchOp::Replace {
                path: root.clone(),
                value: snapshot,
            }
            .apply(&mut state)?;
        }
        self.log(format!("{}:shared-model-push", self.id));
        Ok(())
    }
}
