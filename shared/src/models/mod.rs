//! Data models
//!
//! Shared between the kitchen server and catalog tooling.

pub mod product;

// Re-exports
pub use product::*;
