pub mod classify;
pub mod difference;
pub mod perceptual;
pub mod stats;

use crate::source::ImageLevel;

/// Outcome of comparing one level, or a whole run.
///
/// Ordered by severity, so folding with `max` keeps the worst outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verdict {
    Ok,
    Warn,
    Fail,
    /// Shapes, deep flags or level counts disagree.
    SizeMismatch,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Ok => 0,
            Verdict::Warn => 1,
            Verdict::Fail => 2,
            Verdict::SizeMismatch => 3,
        }
    }
}

/// Exit code for unreadable inputs or an unwritable difference image.
pub const FILE_ERROR_EXIT: i32 = 4;

/// Where the largest error was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelLocation {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub channel: usize,
}

/// Error statistics of one level.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareStats {
    pub mean_error: f64,
    pub rms_error: f64,
    pub psnr: f64,
    pub max_error: f64,
    pub max_location: PixelLocation,
    /// Pixels with at least one channel over the warning threshold.
    pub warn_count: u64,
    /// Pixels with at least one channel over the failure threshold.
    pub fail_count: u64,
}

/// Computes statistics for two equally shaped levels.
pub trait PixelComparator {
    fn compare(&self, a: &ImageLevel, b: &ImageLevel, fail: f64, warn: f64) -> CompareStats;

    /// Number of pixels that fail a perceptual test. Not meaningful for deep
    /// levels.
    fn perceptual_failures(&self, a: &ImageLevel, b: &ImageLevel) -> u64;
}

/// Numeric statistics plus the dify-based perceptual metric.
pub struct StandardComparator;

impl PixelComparator for StandardComparator {
    fn compare(&self, a: &ImageLevel, b: &ImageLevel, fail: f64, warn: f64) -> CompareStats {
        stats::compare(a, b, fail, warn)
    }

    fn perceptual_failures(&self, a: &ImageLevel, b: &ImageLevel) -> u64 {
        perceptual::failures(a, b)
    }
}
