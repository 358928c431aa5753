//! String-backed identifier newtypes.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, uuid::Uuid::new_v4()))
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a register row (one risk × process pair).
    RowId,
    "row"
);
string_id!(
    /// Identifier of a control, embedded or hub.
    ControlId,
    "ctl"
);
string_id!(
    /// Identifier of a row ↔ hub control association.
    LinkId,
    "lnk"
);
string_id!(
    /// Identifier of a submitted pending change.
    PendingChangeId,
    "chg"
);
string_id!(
    /// Leaf of the risk taxonomy.
    RiskId,
    "risk"
);
string_id!(
    /// Leaf of the process taxonomy.
    ProcessId,
    "proc"
);
string_id!(
    /// A user of the register.
    UserId,
    "user"
);
