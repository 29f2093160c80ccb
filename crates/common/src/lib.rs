//! CaptureScreen Common Utilities
//!
//! Shared infrastructure for all CaptureScreen crates:
//! - Error taxonomy and result alias
//! - Wall-clock and elapsed-time helpers
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
