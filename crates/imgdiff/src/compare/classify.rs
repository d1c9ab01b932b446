use super::{CompareStats, Verdict};
use crate::config::Thresholds;

/// Classify one level's statistics.
///
/// Percentages are taken of `npels`; `perceptual_failures` only counts when
/// perceptual comparison is enabled. Failure conditions are checked first.
pub fn classify(
    stats: &CompareStats,
    npels: usize,
    thresholds: &Thresholds,
    perceptual_failures: u64,
) -> Verdict {
    let npels = npels as f64;
    let allowed_failures = thresholds.fail_percent / 100.0 * npels;
    let allowed_warnings = thresholds.warn_percent / 100.0 * npels;

    if stats.fail_count as f64 > allowed_failures
        || stats.max_error > thresholds.hard_fail
        || (thresholds.perceptual && perceptual_failures as f64 > allowed_failures)
    {
        Verdict::Fail
    } else if stats.warn_count as f64 > allowed_warnings || stats.max_error > thresholds.hard_warn
    {
        Verdict::Warn
    } else {
        Verdict::Ok
    }
}
