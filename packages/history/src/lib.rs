//! # Arbor History
//!
//! The history ledger and its completion protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ monitor (arbor-container): captures patches │
//! └─────────────────────────────────────────────┘
//!                     ↓ entry/exchange messages
//! ┌─────────────────────────────────────────────┐
//! │ ledger: append-only entry log               │
//! │  - one open exchange per async fan-out      │
//! │  - entry completes when exchanges drain     │
//! │  - empty completed entries are discarded    │
//! └─────────────────────────────────────────────┘
//!          ↓ undoable entries        ↓ completed entries
//! ┌──────────────────────┐  ┌──────────────────────────┐
//! │ undo stack (cursor)  │  │ durable sink (arbor-store)│
//! └──────────────────────┘  └──────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Exchanges are the barrier**: an entry never completes while any
//!    async branch is still outstanding, with no locks across trees
//! 2. **Protocol violations are fatal**: a double-closed exchange or a
//!    write to a completed entry is a contract breach, never recovered
//! 3. **The ledger owns entries**: the undo stack holds ids only and
//!    just navigates its cursor

mod entry;
mod ledger;
mod undo;

pub use entry::{EntryState, HistoryEntry};
pub use ledger::{HistoryLedger, LedgerError};
pub use undo::UndoStack;
