//! CaptureScreen Linux Platform Integration
//!
//! - **XDG Desktop Portal:** user-consented screen selection on Wayland
//! - **Display Detection:** which display server the session runs on

pub mod display;
pub mod portal;

pub use display::*;
