//! Core domain types and shared logic for dbprov.
//!
//! This crate defines the pieces every other crate agrees on:
//! - Service configuration
//! - Validated identifiers and the instance/snapshot naming convention
//! - Instance state and provisioning outcomes

pub mod config;
pub mod error;
pub mod naming;
pub mod outcome;

pub use error::{Error, Result};
pub use naming::{Identifier, InstanceName, SnapshotName};
pub use outcome::{InstanceState, ProvisionOutcome};

/// Maximum length of a template name or caller id.
///
/// The longest derived engine name is `{template}_{caller}_dbss`, which stays
/// well below the engine's 128 character identifier limit.
pub const MAX_IDENTIFIER_LEN: usize = 48;

/// Separator between template name and caller id in an instance name.
pub const INSTANCE_SEPARATOR: char = '_';

/// Suffix appended to an instance name to name its snapshot.
pub const SNAPSHOT_SUFFIX: &str = "_dbss";
