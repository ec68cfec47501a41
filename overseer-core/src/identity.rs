//! Identity types for Overseer entities.
//!
//! Agent and decision identifiers are minted by the server and treated as
//! opaque strings on the client; the newtypes exist so the two can never be
//! mixed up at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire timestamp in Unix epoch milliseconds.
///
/// Transcript ordering and the reconciliation dedup window are millisecond
/// arithmetic, so timestamps stay in this form end to end.
pub type TimestampMs = i64;

macro_rules! server_issued_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
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
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

server_issued_id! {
    /// Identifier of one agent session. Only the server creates these.
    AgentId
}

server_issued_id! {
    /// Identifier of one delegation decision in a boss ledger.
    DecisionId
}
