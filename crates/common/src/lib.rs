//! screenrec common utilities
//!
//! Shared infrastructure for all screenrec crates:
//! - Error types and result aliases
//! - Clock and pacing utilities for the capture loops
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
