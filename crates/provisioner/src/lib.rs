//! Provisioning orchestration for dbprov.
//!
//! [`Provisioner::provision`] resolves the instance name, serializes work per
//! instance through [`InstanceLocks`], picks a strategy from the instance's
//! current state and records usage through [`UsageTracker`].

pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod tracker;

pub use error::ProvisionError;
pub use locks::{InstanceLockGuard, InstanceLocks};
pub use orchestrator::{Provisioned, Provisioner, Strategy};
pub use tracker::UsageTracker;
