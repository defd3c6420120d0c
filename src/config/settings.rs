use crate::cli::{Args, CompressionMode};
use crate::error::ConfigError;
use crate::lossless::SearchPolicy;
use crate::lossy::RasterLimits;
use crate::target::TargetPolicy;

/// Runtime settings for one compressor
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Accepted target range relative to the original size
    pub target: TargetPolicy,
    /// Lossless ladder selection
    pub search: SearchPolicy,
    /// Bitmap ceilings for the rasterizing fallback
    pub raster: RasterLimits,
    /// Mode used when a request does not name one
    pub default_mode: CompressionMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target: TargetPolicy::default(),
            search: SearchPolicy::default(),
            raster: RasterLimits::default(),
            default_mode: CompressionMode::default(),
        }
    }
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_args(args: &Args) -> Self {
        Self {
            target: TargetPolicy {
                min_percent: args.min_percent,
                max_percent: args.max_percent,
            },
            default_mode: args.mode,
            ..Default::default()
        }
    }

    /// Reject settings the resolver cannot work with
    pub fn validate(self) -> Result<Self, ConfigError> {
        self.target.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default().validate().unwrap();
        assert_eq!(settings.target.min_percent, 20);
        assert_eq!(settings.target.max_percent, 90);
        assert_eq!(settings.default_mode, CompressionMode::Aggressive);
    }

    #[test]
    fn test_inverted_percents_rejected() {
        let mut settings = Settings::default();
        settings.target.min_percent = 95;
        settings.target.max_percent = 50;

        assert_eq!(
            settings.validate(),
            Err(ConfigError::InvalidPercentBounds { min: 95, max: 50 })
        );
    }
}
