use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::compare::difference::DiffOutput;
use crate::compare::{FILE_ERROR_EXIT, StandardComparator};
use crate::config::ResolvedRunConfig;
use crate::report::terminal;
use crate::source::{self, LevelSlot};
use crate::store::FileWriter;
use crate::traverse::{RunError, RunReport, Traversal};

fn open(path: &Path) -> Result<LevelSlot, RunError> {
    source::open(path)
        .map(LevelSlot::new)
        .map_err(|source| RunError::Read {
            path: path.display().to_string(),
            source,
        })
}

fn run(config: &ResolvedRunConfig, image_a: &Path, image_b: &Path) -> Result<RunReport, RunError> {
    let mut a = open(image_a)?;
    let mut b = open(image_b)?;
    let mut diff = DiffOutput::new(&config.output);
    let traversal = Traversal::new(
        config.compare_all,
        config.thresholds,
        &StandardComparator,
        &FileWriter,
    );
    traversal.run(&mut a, &mut b, &mut diff)
}

/// `imgdiff A B`: compare, print the report, return the exit code.
/// File errors print a diagnostic instead of a report.
pub fn compare(config: &ResolvedRunConfig, image_a: &Path, image_b: &Path) -> Result<i32> {
    debug!(?config, "resolved configuration");
    let report = match run(config, image_a, image_b) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("imgdiff ERROR: {e}");
            return Ok(FILE_ERROR_EXIT);
        }
    };

    debug!(
        levels = report.levels().count(),
        notes = report.notes().count(),
        verdict = ?report.verdict,
        "traversal done"
    );

    let mut out = std::io::stdout().lock();
    terminal::print_report(&mut out, &report, config).context("Failed to write report")?;
    out.flush().context("Failed to write report")?;
    Ok(report.verdict.exit_code())
}
