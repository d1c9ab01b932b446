use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{parse_percent, parse_scale, parse_threshold};

/// Comparison tolerances.
///
/// Fields are `Option`: `None` means "not set at this layer".
/// Serves both TOML deserialization (`[thresholds]`) and CLI argument parsing.
#[derive(Clone, Debug, Default, PartialEq, clap::Args, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Failure threshold difference [default: 0.000001]
    #[arg(long = "fail", value_name = "F", value_parser = parse_threshold)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<f64>,

    /// Allow this percentage of failures [default: 0]
    #[arg(long = "failpercent", value_name = "F", value_parser = parse_percent)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_percent: Option<f64>,

    /// Fail if any one pixel exceeds this error [default: infinity]
    #[arg(long = "hardfail", value_name = "F", value_parser = parse_threshold)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_fail: Option<f64>,

    /// Warning threshold difference [default: 0.000001]
    #[arg(long = "warn", value_name = "F", value_parser = parse_threshold)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn: Option<f64>,

    /// Allow this percentage of warnings [default: 0]
    #[arg(long = "warnpercent", value_name = "F", value_parser = parse_percent)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_percent: Option<f64>,

    /// Warn if any one pixel exceeds this error [default: infinity]
    #[arg(long = "hardwarn", value_name = "F", value_parser = parse_threshold)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_warn: Option<f64>,

    /// Perform perceptual (rather than numeric) comparison
    #[arg(short = 'p', long = "perceptual")]
    #[serde(default)]
    pub perceptual: bool,
}

impl ThresholdConfig {
    /// Overlay set fields from `other` onto self.
    pub fn merge(&mut self, other: &ThresholdConfig) {
        if other.fail.is_some() {
            self.fail = other.fail;
        }
        if other.fail_percent.is_some() {
            self.fail_percent = other.fail_percent;
        }
        if other.hard_fail.is_some() {
            self.hard_fail = other.hard_fail;
        }
        if other.warn.is_some() {
            self.warn = other.warn;
        }
        if other.warn_percent.is_some() {
            self.warn_percent = other.warn_percent;
        }
        if other.hard_warn.is_some() {
            self.hard_warn = other.hard_warn;
        }
        self.perceptual |= other.perceptual;
    }
}

/// Difference image settings (`[output]` in the config file).
#[derive(Clone, Debug, Default, PartialEq, clap::Args, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output difference image
    #[arg(short = 'o', value_name = "PATH")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Output image only if nonzero difference
    #[arg(long = "od")]
    #[serde(default)]
    pub only_if_different: bool,

    /// Output image of absolute value, not signed difference
    #[arg(long = "abs")]
    #[serde(default)]
    pub absolute: bool,

    /// Scale the output image by this factor [default: 1]
    #[arg(long = "scale", value_name = "F", allow_negative_numbers = true, value_parser = parse_scale)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl OutputConfig {
    /// Overlay set fields from `other` onto self.
    pub fn merge(&mut self, other: &OutputConfig) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        self.only_if_different |= other.only_if_different;
        self.absolute |= other.absolute;
        if other.scale.is_some() {
            self.scale = other.scale;
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale.unwrap_or(1.0)
    }
}
