//! Instance state and provisioning outcomes.

use serde::Serialize;
use std::fmt;

/// Existence state of an instance as reported by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    Absent,
    Present,
}

/// Result of a successful provision call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    /// Instance restored from the template backup and snapshotted.
    Created,
    /// Instance already existed; nothing was done.
    AlreadyExists,
    /// Instance reverted to its snapshot.
    RestoredFromSnapshot,
}

impl ProvisionOutcome {
    /// Status string used in API responses and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyExists => "already_exists",
            Self::RestoredFromSnapshot => "restored_from_snapshot",
        }
    }
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
