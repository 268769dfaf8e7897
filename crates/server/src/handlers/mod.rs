//! HTTP request handlers.

pub mod health;
pub mod instances;
pub mod provision;

pub use health::*;
pub use instances::*;
pub use provision::*;
