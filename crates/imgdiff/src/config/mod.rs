pub mod resolve;
pub mod thresholds;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use self::resolve::{CliOverrides, ResolvedRunConfig};
pub use self::thresholds::{OutputConfig, ThresholdConfig};

pub(crate) const CONFIG_ENV: &str = "IMGDIFF_CONFIG";

pub const DEFAULT_THRESHOLD: f64 = 1.0e-6;
/// "Infinity" for the hard thresholds: the largest finite `f32`.
pub const NO_HARD_LIMIT: f64 = f32::MAX as f64;

pub fn validate_threshold(v: f64) -> Result<f64, String> {
    if v.is_nan() || v < 0.0 {
        return Err(format!("threshold must be a non-negative number, got {v}"));
    }
    Ok(v)
}

pub fn validate_percent(v: f64) -> Result<f64, String> {
    if !(0.0..=100.0).contains(&v) {
        return Err(format!("percentage must be between 0 and 100, got {v}"));
    }
    Ok(v)
}

pub fn validate_scale(v: f64) -> Result<f64, String> {
    if !v.is_finite() {
        return Err(format!("scale must be a finite number, got {v}"));
    }
    Ok(v)
}

fn parse_with(s: &str, validate: fn(f64) -> Result<f64, String>) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    validate(v)
}

pub(crate) fn parse_threshold(s: &str) -> Result<f64, String> {
    parse_with(s, validate_threshold)
}

pub(crate) fn parse_percent(s: &str) -> Result<f64, String> {
    parse_with(s, validate_percent)
}

pub(crate) fn parse_scale(s: &str) -> Result<f64, String> {
    parse_with(s, validate_scale)
}

/// Contents of a TOML config file. Every key is optional.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub compare_all: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Validate ranges that serde cannot express.
    fn validate(&self) -> Result<(), String> {
        let t = &self.thresholds;
        for (key, value) in [
            ("fail", t.fail),
            ("hard_fail", t.hard_fail),
            ("warn", t.warn),
            ("hard_warn", t.hard_warn),
        ] {
            if let Some(v) = value {
                validate_threshold(v).map_err(|e| format!("thresholds.{key}: {e}"))?;
            }
        }
        for (key, value) in [("fail_percent", t.fail_percent), ("warn_percent", t.warn_percent)] {
            if let Some(v) = value {
                validate_percent(v).map_err(|e| format!("thresholds.{key}: {e}"))?;
            }
        }
        if let Some(v) = self.output.scale {
            validate_scale(v).map_err(|e| format!("output.scale: {e}"))?;
        }
        Ok(())
    }
}

pub fn parse(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}

pub fn load(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Fully resolved comparison tolerances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub fail: f64,
    pub fail_percent: f64,
    pub hard_fail: f64,
    pub warn: f64,
    pub warn_percent: f64,
    pub hard_warn: f64,
    pub perceptual: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            fail: DEFAULT_THRESHOLD,
            fail_percent: 0.0,
            hard_fail: NO_HARD_LIMIT,
            warn: DEFAULT_THRESHOLD,
            warn_percent: 0.0,
            hard_warn: NO_HARD_LIMIT,
            perceptual: false,
        }
    }
}

impl From<&ThresholdConfig> for Thresholds {
    fn from(c: &ThresholdConfig) -> Self {
        let d = Self::default();
        Self {
            fail: c.fail.unwrap_or(d.fail),
            fail_percent: c.fail_percent.unwrap_or(d.fail_percent),
            hard_fail: c.hard_fail.unwrap_or(d.hard_fail),
            warn: c.warn.unwrap_or(d.warn),
            warn_percent: c.warn_percent.unwrap_or(d.warn_percent),
            hard_warn: c.hard_warn.unwrap_or(d.hard_warn),
            perceptual: c.perceptual,
        }
    }
}
