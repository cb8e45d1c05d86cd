//! # Arbor Patch Primitives
//!
//! Structural diff primitives shared by every layer of the history
//! subsystem.
//!
//! ## Design Principles
//!
//! 1. **Pairs, not diffs**: a mutation is captured as a forward op plus
//!    the exact inverse op, so undo never has to recompute anything
//! 2. **Structured paths**: patch targets are segment sequences, never
//!    parsed strings, so shared-model classification is a prefix compare
//! 3. **Immutable records**: once a [`PatchRecord`] is assembled it is
//!    never mutated; the ledger only moves it around
//!
//! ## Invariant
//!
//! For every [`PatchPair`], applying `inverse` after `forward` restores
//! the prior state exactly. [`PatchRecord`] extends this to sequences:
//! `inverse_patches` applied in reverse order undoes `patches` applied
//! in forward order.

mod ids;
mod ops;
mod path;
mod record;

pub use ids::{EntryId, ExchangeId, SharedModelId, TreeId};
pub use ops::{resolve, PatchError, PatchOp, PatchPair};
pub use path::PatchPath;
pub use record::PatchRecord;
