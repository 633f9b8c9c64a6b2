//! Common types for the meshroute environment abstraction.

use serde::{Deserialize, Serialize};

/// Identifier of one coordinator run.
///
/// Run ids are handed out in strictly increasing order; every scheduled
/// item carries the id of the run that dispatched it so that late
/// settlements from an abandoned run can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl RunId {
    /// The id that precedes every real run.
    pub const NONE: RunId = RunId(0);

    /// Returns the id following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}
