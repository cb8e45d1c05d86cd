//! Typed identifiers used across the history subsystem.
//!
//! Ids arrive from external trees as opaque strings; newtypes keep a
//! tree id from ever being passed where an exchange id belongs.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_type!(
    /// Identifies one independently-owned tree within a document.
    TreeId
);

id_type!(
    /// Globally unique id of one history entry (one logical action).
    EntryId
);

id_type!(
    /// Correlation id for one outstanding asynchronous confirmation
    /// gating history-entry completion.
    ExchangeId
);

id_type!(
    /// Identifies a shared model mounted into one or more trees.
    SharedModelId
);

impl EntryId {
    /// Mint a fresh id for a new logical action.
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ExchangeId {
    /// Mint a fresh correlation id for one async fan-out branch.
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
