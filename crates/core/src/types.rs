//! Identifier types shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one open database session.
///
/// Assigned by the session registry at open time, starting at 1 and
/// increasing monotonically for the lifetime of the registry. An id is
/// never reused while any session is open, so two simultaneously open
/// connections can never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id value
    pub fn new(id: u64) -> Self {
        SessionId(id)
    }

    /// The raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        SessionId(id)
    }
}
