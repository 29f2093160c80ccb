//! The per-session capture configuration snapshot.

use std::time::Duration;

use capturescreen_common::config::CaptureDefaults;
use capturescreen_common::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};

use crate::quality::Quality;

/// Upper bound of the auto-stop setting, in seconds.
pub const MAX_AUTO_STOP_SECS: u32 = 300;

/// Granularity of the auto-stop setting, in seconds.
pub const AUTO_STOP_STEP_SECS: u32 = 10;

/// Per-invocation replacements for the configured capture defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureOverrides {
    pub quality: Option<Quality>,
    pub audio_enabled: Option<bool>,
    pub auto_stop_secs: Option<u32>,
}

/// Settings captured when a session starts.
///
/// The session keeps its own copy, so whatever the caller changes afterwards
/// never reaches an in-flight recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    pub quality: Quality,
    pub audio_enabled: bool,
    /// Seconds until the recording stops by itself; 0 disables auto-stop.
    pub auto_stop_secs: u32,
}

impl CaptureConfig {
    pub fn new(quality: Quality, audio_enabled: bool, auto_stop_secs: u32) -> Self {
        Self {
            quality,
            audio_enabled,
            auto_stop_secs,
        }
    }

    /// Build a config from the application defaults, with any overrides
    /// taking precedence.
    ///
    /// An overridden field is never read from `defaults`, so an unparseable
    /// configured quality does not block an explicit one.
    pub fn from_defaults(
        defaults: &CaptureDefaults,
        overrides: CaptureOverrides,
    ) -> CaptureResult<Self> {
        let quality = match overrides.quality {
            Some(quality) => quality,
            None => defaults.quality.parse()?,
        };
        let config = Self {
            quality,
            audio_enabled: overrides.audio_enabled.unwrap_or(defaults.audio_enabled),
            auto_stop_secs: overrides.auto_stop_secs.unwrap_or(defaults.auto_stop_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the auto-stop value against the `[0, 300]` step-10 contract.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.auto_stop_secs > MAX_AUTO_STOP_SECS {
            return Err(CaptureError::config(format!(
                "auto-stop of {}s exceeds the {MAX_AUTO_STOP_SECS}s maximum",
                self.auto_stop_secs
            )));
        }
        if self.auto_stop_secs % AUTO_STOP_STEP_SECS != 0 {
            return Err(CaptureError::config(format!(
                "auto-stop of {}s is not a multiple of {AUTO_STOP_STEP_SECS}s",
                self.auto_stop_secs
            )));
        }
        Ok(())
    }

    /// The auto-stop deadline, if one should be armed.
    pub fn auto_stop(&self) -> Option<Duration> {
        (self.auto_stop_secs > 0).then(|| Duration::from_secs(u64::from(self.auto_stop_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_disables_auto_stop() {
        let config = CaptureConfig::new(Quality::High, false, 0);
        assert!(config.validate().is_ok());
        assert_eq!(config.auto_stop(), None);
    }

    #[test]
    fn defaults_parse_into_a_valid_snapshot() {
        let config =
            CaptureConfig::from_defaults(&CaptureDefaults::default(), CaptureOverrides::default())
                .unwrap();
        assert_eq!(config.quality, Quality::High);
        assert_eq!(config.auto_stop(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn overrides_take_precedence() {
        let overrides = CaptureOverrides {
            quality: Some(Quality::Medium),
            audio_enabled: Some(true),
            auto_stop_secs: Some(60),
        };
        let config = CaptureConfig::from_defaults(&CaptureDefaults::default(), overrides).unwrap();
        assert_eq!(config, CaptureConfig::new(Quality::Medium, true, 60));
    }

    #[test]
    fn overridden_quality_skips_the_configured_one() {
        let defaults = CaptureDefaults {
            quality: "ultra".to_string(),
            ..CaptureDefaults::default()
        };
        let overrides = CaptureOverrides {
            quality: Some(Quality::High),
            ..CaptureOverrides::default()
        };
        let config = CaptureConfig::from_defaults(&defaults, overrides).unwrap();
        assert_eq!(config.quality, Quality::High);
    }

    #[test]
    fn overridden_auto_stop_is_still_validated() {
        let overrides = CaptureOverrides {
            auto_stop_secs: Some(15),
            ..CaptureOverrides::default()
        };
        assert!(matches!(
            CaptureConfig::from_defaults(&CaptureDefaults::default(), overrides),
            Err(CaptureError::Config { .. })
        ));
    }

    #[test]
    fn unknown_quality_in_defaults_is_rejected() {
        let defaults = CaptureDefaults {
            quality: "4k".to_string(),
            ..CaptureDefaults::default()
        };
        assert!(matches!(
            CaptureConfig::from_defaults(&defaults, CaptureOverrides::default()),
            Err(CaptureError::Config { .. })
        ));
    }

    proptest! {
        #[test]
        fn stepped_values_in_range_are_accepted(step in 0u32..=30) {
            let config = CaptureConfig::new(Quality::Medium, true, step * AUTO_STOP_STEP_SECS);
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn values_over_the_maximum_are_rejected(secs in (MAX_AUTO_STOP_SECS + 1)..10_000u32) {
            let config = CaptureConfig::new(Quality::High, false, secs);
            prop_assert!(config.validate().is_err());
        }

        #[test]
        fn off_step_values_are_rejected(secs in 1u32..MAX_AUTO_STOP_SECS) {
            prop_assume!(secs % AUTO_STOP_STEP_SECS != 0);
            let config = CaptureConfig::new(Quality::High, false, secs);
            prop_assert!(config.validate().is_err());
        }
    }
}
