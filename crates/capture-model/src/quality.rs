//! Quality tiers and their fixed capture/encode parameters.

use std::fmt;
use std::str::FromStr;

use capturescreen_common::error::CaptureError;
use serde::{Deserialize, Serialize};

/// User-selectable capture quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// 1080p at 30 fps, 2.5 Mbps.
    #[default]
    High,
    /// 720p at 15 fps, 1 Mbps.
    Medium,
}

/// The resolved parameters for a quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    /// Target video bitrate in bits per second.
    pub bitrate_bps: u32,
}

impl Quality {
    pub const ALL: [Quality; 2] = [Quality::High, Quality::Medium];

    /// The fixed parameters for this tier.
    pub const fn profile(self) -> QualityProfile {
        match self {
            Quality::High => QualityProfile {
                frame_rate: 30,
                width: 1920,
                height: 1080,
                bitrate_bps: 2_500_000,
            },
            Quality::Medium => QualityProfile {
                frame_rate: 15,
                width: 1280,
                height: 720,
                bitrate_bps: 1_000_000,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "1080p" => Ok(Quality::High),
            "medium" | "720p" => Ok(Quality::Medium),
            other => Err(CaptureError::config(format!(
                "Unknown quality '{other}'. Use: high, medium"
            ))),
        }
    }
}
