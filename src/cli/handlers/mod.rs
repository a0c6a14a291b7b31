//! CLI command handlers module
//!
//! This module is organized by functional domains:
//! - ask: Streamed answers in the terminal
//! - retrieve: Passage selection without generation
//! - serve: API server
//! - info: Information display (config)

pub mod ask;
pub mod info;
pub mod retrieve;
pub mod serve;

// Re-export all public handlers
pub use ask::*;
pub use info::*;
pub use retrieve::*;
pub use serve::*;
