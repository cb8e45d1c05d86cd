//! # Arbor Container
//!
//! The coordinator for a document decomposed into independently-owned
//! trees that may share state through explicitly-propagated shared
//! models.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ trees: editors/renderers (external)         │
//! └─────────────────────────────────────────────┘
//!      ↓ run_action              ↑ Tree contract
//! ┌─────────────────────────────────────────────┐
//! │ container: registry + shared models         │
//! │  - monitor: scoped patch capture            │
//! │  - propagation barrier before completion    │
//! │  - replay engine for undo/redo/load         │
//! └─────────────────────────────────────────────┘
//!                     ↓ entries/exchanges
//! ┌─────────────────────────────────────────────┐
//! │ ledger + undo stack (arbor-history)         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **No ambient state**: trees register explicitly with the
//!    container; shared-model regions are declared at mount time
//! 2. **Propagation before completion**: a shared-model write fans out
//!    to every dependent tree and is awaited before the originating
//!    action reports done
//! 3. **Replay is never undoable**: undo/redo round trips run as fresh
//!    coordinator-origin entries, outside the normal user-action path
//! 4. **No partial history**: a failed action rolls back locally and
//!    the ledger never hears about it

mod container;
mod contract;
mod error;
mod monitor;
mod registry;
mod replay;
mod shared_model;

pub use container::Container;
pub use contract::{Tree, TreeError};
pub use error::ContainerError;
pub use monitor::{ActionMonitor, ActionScope, EntryOrigin};
pub use registry::TreeRegistry;
pub use shared_model::{SharedModelBinding, SharedModelRegistry};
