use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// What an operation does to its remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create or update.
    Write,
    Delete,
    Read,
}

impl OperationKind {
    /// Writes and deletes change remote state and may be queued; reads may
    /// not.
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Read)
    }

    /// Stable one-byte tag used by the cache codec.
    pub fn tag(self) -> u8 {
        match self {
            Self::Write => 0,
            Self::Delete => 1,
            Self::Read => 2,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Write),
            1 => Some(Self::Delete),
            2 => Some(Self::Read),
            _ => None,
        }
    }
}

impl_domain_status_conversions!(OperationKind {
    Write => "write",
    Delete => "delete",
    Read => "read",
});
