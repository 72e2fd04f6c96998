//! Kitchen order module
//!
//! - Wire message consumed from the orders queue
//! - Stored kitchen order with its lifecycle status
//! - Live events broadcast to viewers

pub mod event;
pub mod types;

// Re-exports
pub use event::LiveEvent;
pub use types::*;
