//! The per-tree patch record delivered to the ledger.

use crate::ids::TreeId;
use crate::ops::{PatchOp, PatchPair};
use serde::{Deserialize, Serialize};

/// All structural changes one tree produced for one logical action.
///
/// Immutable once assembled. `inverse_patches` applied in reverse
/// order undoes `patches` applied in forward order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub tree: TreeId,
    pub action: String,
    pub patches: Vec<PatchOp>,
    pub inverse_patches: Vec<PatchOp>,
}

impl PatchRecord {
    /// Assemble a record from captured pairs, preserving capture order.
    pub fn from_pairs(tree: TreeId, action: impl Into<String>, pairs: Vec<PatchPair>) -> Self {
        let mut patches = Vec::with_capacity(pairs.len());
        let mut inverse_patches = Vec::with_capacity(pairs.len());
        for pair in pairs {
            patches.push(pair.forward);
            inverse_patches.push(pair.inverse);
        }
        Self {
            tree,
            action: action.into(),
            patches,
            inverse_patches,
        }
    }

    /// A record carrying no changes. Delivering one still closes its
    /// exchange: "nothing changed" is a valid confirmation.
    pub fn empty(tree: TreeId, action: impl Into<String>) -> Self {
        Self {
            tree,
            action: action.into(),
            patches: vec![],
            inverse_patches: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.inverse_patches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PatchPath;
    use serde_json::json;

    #[test]
    fn test_from_pairs_preserves_order() {
        let state = json!({ "a": 1, "b": 2 });
        let pairs = vec![
            PatchPair::replace(&state, PatchPath::parse("/a"), json!(10)).unwrap(),
            PatchPair::replace(&state, PatchPath::parse("/b"), json!(20)).unwrap(),
        ];
        let record = PatchRecord::from_pairs(TreeId::new("t1"), "setValues", pairs);

        assert_eq!(record.patches.len(), 2);
        assert_eq!(record.patches[0].path(), &PatchPath::parse("/a"));
        assert_eq!(record.patches[1].path(), &PatchPath::parse("/b"));
        assert_eq!(record.inverse_patches[0].path(), &PatchPath::parse("/a"));
        assert!(!record.is_empty());
    }

    #[test]
    fn test_empty_record() {
        let record = PatchRecord::empty(TreeId::new("t1"), "confirm");
        assert!(record.is_empty());
    }

    #[test]
    fn test_record_sequence_round_trip_is_noop() {
        // Interleaved edits: inverses in reverse order must restore
        // the original state even when ops overlap.
        let initial = json!({ "text": "", "items": [] });
        let mut state = initial.clone();

        let mut pairs = vec![];
        let p1 = PatchPair::replace(&state, PatchPath::parse("/text"), json!("hi")).unwrap();
        p1.forward.apply(&mut state).unwrap();
        pairs.push(p1);
        let p2 = PatchPair::add(PatchPath::parse("/items/0"), json!("x"));
        p2.forward.apply(&mut state).unwrap();
        pairs.push(p2);
        let p3 = PatchPair::replace(&state, PatchPath::parse("/text"), json!("hi there")).unwrap();
        p3.forward.apply(&mut state).unwrap();
        pairs.push(p3);

        let record = PatchRecord::from_pairs(TreeId::new("t1"), "edit", pairs);

        for op in record.inverse_patches.iter().rev() {
            op.apply(&mut state).unwrap();
        }
        assert_eq!(state, initial);

        for op in &record.patches {
            op.apply(&mut state).unwrap();
        }
        assert_eq!(state["text"], "hi there");
        assert_eq!(state["items"], json!(["x"]));
    }
}
