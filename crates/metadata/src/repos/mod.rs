//! Repository traits for metadata operations.

pub mod usage;

pub use usage::UsageRepo;
