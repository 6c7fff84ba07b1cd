//! Who hooked the current request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role this node plays for the hooked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HookRole {
    /// Nothing is hooked.
    #[default]
    Unhooked,
    /// Hooked by a local caller; this node drives the protocol.
    Primary,
    /// Hooked by a broadcast from the primary.
    Replica,
}

impl HookRole {
    #[must_use]
    pub fn is_hooked(self) -> bool {
        self != HookRole::Unhooked
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HookRole::Unhooked => "unhooked",
            HookRole::Primary => "primary",
            HookRole::Replica => "replica",
        }
    }
}

impl fmt::Display for HookRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
