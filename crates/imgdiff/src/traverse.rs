use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compare::classify::classify;
use crate::compare::difference::DiffOutput;
use crate::compare::{CompareStats, PixelComparator, Verdict};
use crate::config::Thresholds;
use crate::source::{ImageLevel, ImageShape, LevelSlot, SourceError};
use crate::store::ImageWriter;

/// Fatal errors. Either one ends the run without a report.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Could not read {path}:\n\t{source}")]
    Read { path: String, source: SourceError },

    #[error("Could not write difference image {}: {source}", path.display())]
    Write { path: PathBuf, source: SourceError },
}

/// Informational lines that are not tied to a single level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    MipCountDiffers,
    SubimageCountDiffers { a: usize, b: usize },
    OnlyFirstSubimage { a: usize, b: usize },
}

/// How a level is introduced in the report.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelLabel {
    /// Shape of the first image.
    pub shape: ImageShape,
    /// Set when the first image has more than one subimage.
    pub subimage: Option<usize>,
    /// Set when the first image has more than one MIP level here.
    pub miplevel: Option<usize>,
    /// Either image has several subimages or MIP levels.
    pub multi: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LevelResult {
    Compared {
        label: LevelLabel,
        stats: CompareStats,
        npels: usize,
        /// `None` when perceptual comparison is off or the level is deep.
        perceptual_failures: Option<u64>,
        verdict: Verdict,
        diff_written: Option<PathBuf>,
    },
    SizeMismatch {
        label: LevelLabel,
        other: ImageShape,
    },
    DeepMismatch,
    MipCountMismatch,
}

impl LevelResult {
    pub fn verdict(&self) -> Verdict {
        match self {
            LevelResult::Compared { verdict, .. } => *verdict,
            _ => Verdict::SizeMismatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelOutcome {
    pub subimage: usize,
    pub miplevel: usize,
    pub result: LevelResult,
    /// Run verdict after folding in this level.
    pub running: Verdict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Note(Note),
    Level(LevelOutcome),
}

/// Everything a run found, in the order it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub name_a: String,
    pub name_b: String,
    pub entries: Vec<Entry>,
    pub verdict: Verdict,
}

impl RunReport {
    pub fn levels(&self) -> impl Iterator<Item = &LevelOutcome> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Level(level) => Some(level),
            Entry::Note(_) => None,
        })
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Note(note) => Some(note),
            Entry::Level(_) => None,
        })
    }
}

/// Walks the subimages and MIP levels of two images, comparing matching
/// levels and folding their verdicts.
pub struct Traversal<'a> {
    compare_all: bool,
    thresholds: Thresholds,
    comparator: &'a dyn PixelComparator,
    writer: &'a dyn ImageWriter,
}

fn request(slot: &mut LevelSlot, subimage: usize, miplevel: usize) -> Result<&ImageLevel, RunError> {
    let path = slot.name().to_owned();
    slot.request(subimage, miplevel)
        .map_err(|source| RunError::Read { path, source })
}

impl<'a> Traversal<'a> {
    pub fn new(
        compare_all: bool,
        thresholds: Thresholds,
        comparator: &'a dyn PixelComparator,
        writer: &'a dyn ImageWriter,
    ) -> Self {
        Self {
            compare_all,
            thresholds,
            comparator,
            writer,
        }
    }

    pub fn run(
        &self,
        a: &mut LevelSlot,
        b: &mut LevelSlot,
        diff: &mut DiffOutput,
    ) -> Result<RunReport, RunError> {
        // Subimage and level counts are only known once something is loaded.
        request(a, 0, 0)?;
        request(b, 0, 0)?;

        let names = [a.name().to_owned(), b.name().to_owned()];
        let subimages_a = a.subimage_count();
        let subimages_b = b.subimage_count();
        let mut entries = Vec::new();
        let mut running = Verdict::Ok;

        for subimage in 0..subimages_a {
            if subimage > 0 && !self.compare_all {
                break;
            }
            if subimage >= subimages_b {
                break;
            }

            request(a, subimage, 0)?;
            request(b, subimage, 0)?;
            let mips_a = a.miplevel_count(subimage);
            let mips_b = b.miplevel_count(subimage);
            if mips_a != mips_b {
                warn!(subimage, mips_a, mips_b, "MIP level counts differ");
                entries.push(Entry::Note(Note::MipCountDiffers));
            }
            let multi = subimages_a > 1 || subimages_b > 1 || mips_a > 1 || mips_b > 1;

            for miplevel in 0..mips_a {
                if miplevel > 0 && !self.compare_all {
                    break;
                }
                if miplevel > 0 && mips_a != mips_b {
                    running = running.max(Verdict::SizeMismatch);
                    entries.push(Entry::Level(LevelOutcome {
                        subimage,
                        miplevel,
                        result: LevelResult::MipCountMismatch,
                        running,
                    }));
                    break;
                }

                let level_a = request(a, subimage, miplevel)?;
                let level_b = request(b, subimage, miplevel)?;
                let label = LevelLabel {
                    shape: level_a.shape.clone(),
                    subimage: (subimages_a > 1).then_some(subimage),
                    miplevel: (mips_a > 1).then_some(miplevel),
                    multi,
                };

                let result = self.compare_level(level_a, level_b, &names, label, diff)?;
                let stop = !matches!(result, LevelResult::Compared { .. });
                running = running.max(result.verdict());
                entries.push(Entry::Level(LevelOutcome {
                    subimage,
                    miplevel,
                    result,
                    running,
                }));
                if stop {
                    break;
                }
            }
        }

        if self.compare_all && subimages_a != subimages_b {
            entries.push(Entry::Note(Note::SubimageCountDiffers {
                a: subimages_a,
                b: subimages_b,
            }));
            running = Verdict::Fail;
        }
        if !self.compare_all && (subimages_a > 1 || subimages_b > 1) {
            entries.push(Entry::Note(Note::OnlyFirstSubimage {
                a: subimages_a,
                b: subimages_b,
            }));
        }

        if diff.is_pending() {
            debug!("no level produced a difference image");
        }
        info!(verdict = ?running, "comparison finished");
        let [name_a, name_b] = names;
        Ok(RunReport {
            name_a,
            name_b,
            entries,
            verdict: running,
        })
    }

    fn compare_level(
        &self,
        a: &ImageLevel,
        b: &ImageLevel,
        names: &[String; 2],
        label: LevelLabel,
        diff: &mut DiffOutput,
    ) -> Result<LevelResult, RunError> {
        if !a.shape.same_size(&b.shape) {
            warn!(subimage = a.subimage, miplevel = a.miplevel, "sizes differ");
            return Ok(LevelResult::SizeMismatch {
                label,
                other: b.shape.clone(),
            });
        }
        if a.is_deep() != b.is_deep() {
            warn!(subimage = a.subimage, miplevel = a.miplevel, "deep flags differ");
            return Ok(LevelResult::DeepMismatch);
        }
        for (level, path) in [(a, &names[0]), (b, &names[1])] {
            level.require_samples().map_err(|source| RunError::Read {
                path: path.clone(),
                source,
            })?;
        }

        let t = &self.thresholds;
        let npels = a.shape.npels();
        let stats = self.comparator.compare(a, b, t.fail, t.warn);
        let perceptual_failures =
            (t.perceptual && !a.is_deep()).then(|| self.comparator.perceptual_failures(a, b));
        let verdict = classify(&stats, npels, t, perceptual_failures.unwrap_or(0));
        debug!(
            subimage = a.subimage,
            miplevel = a.miplevel,
            max_error = stats.max_error,
            warn_count = stats.warn_count,
            fail_count = stats.fail_count,
            ?verdict,
            "compared level"
        );

        let diff_written = diff
            .write_if_wanted(a, b, stats.max_error, self.writer)
            .map_err(|(path, source)| RunError::Write { path, source })?;

        Ok(LevelResult::Compared {
            label,
            stats,
            npels,
            perceptual_failures,
            verdict,
            diff_written,
        })
    }
}
