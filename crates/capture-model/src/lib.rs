//! CaptureScreen Capture Model
//!
//! Plain data shared between the capture engine and its callers:
//!
//! - **Quality:** fixed resolution/frame-rate/bitrate tiers
//! - **CaptureConfig:** the frozen per-session settings snapshot
//! - **Artifact:** a finished recording or screenshot held in memory

pub mod artifact;
pub mod config;
pub mod quality;

pub use artifact::{Artifact, ArtifactHandle, ArtifactKind};
pub use config::{CaptureConfig, CaptureOverrides};
pub use quality::{Quality, QualityProfile};
