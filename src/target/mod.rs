//! Target size resolution
//!
//! Turns a caller's requested size into a usable byte target: bounds derived
//! from the original size, a saturating clamp, and form-value parsing.

pub mod parse;

pub use parse::{parse_target_size, SizeUnit};

use crate::config::defaults::{DEFAULT_MAX_TARGET_PERCENT, DEFAULT_MIN_TARGET_PERCENT};
use crate::error::ConfigError;

/// Accepted target range, as percentages of the original size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPolicy {
    pub min_percent: u32,
    pub max_percent: u32,
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self {
            min_percent: DEFAULT_MIN_TARGET_PERCENT,
            max_percent: DEFAULT_MAX_TARGET_PERCENT,
        }
    }
}

/// Smallest and largest target accepted for one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSizeBounds {
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl TargetPolicy {
    /// Check 0 < min <= max <= 100
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_percent == 0 || self.min_percent > self.max_percent || self.max_percent > 100 {
            return Err(ConfigError::InvalidPercentBounds {
                min: self.min_percent,
                max: self.max_percent,
            });
        }
        Ok(())
    }

    /// Bounds for an input of `original_size` bytes.
    ///
    /// Integer arithmetic keeps the ceil/floor exact for any size.
    pub fn compute_bounds(&self, original_size: u64) -> TargetSizeBounds {
        let scaled = |percent: u32| u128::from(original_size) * u128::from(percent);

        let min_ceil = scaled(self.min_percent).div_ceil(100);
        let max_floor = scaled(self.max_percent) / 100;

        let min_bytes = saturate(min_ceil).max(1);
        let max_bytes = saturate(max_floor).max(min_bytes);

        TargetSizeBounds {
            min_bytes,
            max_bytes,
        }
    }

    /// Clamp a requested target into the bounds for `original_size`
    pub fn clamp(&self, original_size: u64, requested: u64) -> u64 {
        let bounds = self.compute_bounds(original_size);
        requested.clamp(bounds.min_bytes, bounds.max_bytes)
    }

    /// Resolve the target the engine works with; zero stays zero ("no target")
    pub fn resolve(&self, original_size: u64, requested: u64) -> u64 {
        if requested == 0 {
            0
        } else {
            self.clamp(original_size, requested)
        }
    }
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Bounds with the default 20%/90% policy
pub fn compute_bounds(original_size: u64) -> TargetSizeBounds {
    TargetPolicy::default().compute_bounds(original_size)
}

/// Clamp with the default 20%/90% policy
pub fn clamp_target(original_size: u64, requested: u64) -> u64 {
    TargetPolicy::default().clamp(original_size, requested)
}
