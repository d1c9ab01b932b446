use std::path::PathBuf;

use tracing::info;

use crate::config::OutputConfig;
use crate::source::{ImageLevel, SourceError};
use crate::store::ImageWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Signed,
    Absolute,
}

/// `scale * (a - b)` (or its absolute value) for every channel of every
/// pixel of `a`. `b` must have the same size; the result has `a`'s shape.
pub fn synthesize(a: &ImageLevel, b: &ImageLevel, mode: DiffMode, scale: f32) -> ImageLevel {
    let shape = &a.shape;
    let nchannels = shape.nchannels();
    let mut out = vec![0.0f32; shape.pixel_count() * nchannels];

    for z in 0..shape.depth {
        for y in 0..shape.height {
            for x in 0..shape.width {
                // Each image locates the coordinate through its own layout.
                let pa = shape.pixel_index(x, y, z);
                let pb = b.shape.pixel_index(x, y, z);
                let po = shape.pixel_index(x, y, z) * nchannels;
                for c in 0..nchannels {
                    let d = a.sample(pa, c) - b.sample(pb, c);
                    out[po + c] = match mode {
                        DiffMode::Signed => scale * d,
                        DiffMode::Absolute => scale * d.abs(),
                    };
                }
            }
        }
    }

    ImageLevel::flat(shape.clone(), out)
}

/// Pending difference image request. Cleared after the first write, so a
/// run writes at most one difference image.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutput {
    path: Option<PathBuf>,
    only_if_different: bool,
    mode: DiffMode,
    scale: f32,
}

impl DiffOutput {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            path: config.path.clone(),
            only_if_different: config.only_if_different,
            mode: if config.absolute {
                DiffMode::Absolute
            } else {
                DiffMode::Signed
            },
            scale: config.scale() as f32,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.path.is_some()
    }

    fn wants(&self, max_error: f64) -> bool {
        self.path.is_some() && (max_error != 0.0 || !self.only_if_different)
    }

    /// Write the difference of `a` and `b` if still pending and wanted for
    /// a level with `max_error`. Returns the path written.
    pub fn write_if_wanted(
        &mut self,
        a: &ImageLevel,
        b: &ImageLevel,
        max_error: f64,
        writer: &dyn ImageWriter,
    ) -> Result<Option<PathBuf>, (PathBuf, SourceError)> {
        if !self.wants(max_error) {
            return Ok(None);
        }
        let Some(path) = self.path.clone() else {
            return Ok(None);
        };
        let diff = synthesize(a, b, self.mode, self.scale);
        writer.write(&path, &diff).map_err(|e| (path.clone(), e))?;
        info!(path = %path.display(), subimage = a.subimage, miplevel = a.miplevel, "wrote difference image");
        self.path = None;
        Ok(Some(path))
    }
}
