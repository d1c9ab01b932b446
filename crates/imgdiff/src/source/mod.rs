#[cfg(test)]
mod memory;
mod openexr;
mod raster;

use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub use self::memory::MemorySource;
pub use self::openexr::ExrSource;
pub use self::raster::RasterSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Exr(#[from] exr::error::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("subimage {subimage}, MIP level {miplevel} does not exist")]
    NoSuchLevel { subimage: usize, miplevel: usize },

    #[error(
        "requested subimage {requested:?} but got {loaded:?} (subimage, MIP level)"
    )]
    WrongLevel {
        requested: (usize, usize),
        loaded: (usize, usize),
    },

    #[error("deep pixel data cannot be decoded from {0} files")]
    DeepUnsupported(&'static str),

    #[error("cannot store {channels} channels as {format}")]
    UnsupportedChannels { channels: usize, format: String },

    #[error("{0}")]
    Backend(String),
}

/// Dimensions and channel layout of one image level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageShape {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub channel_names: Vec<String>,
}

impl ImageShape {
    pub fn new(width: usize, height: usize, channel_names: &[&str]) -> Self {
        Self {
            width,
            height,
            depth: 1,
            channel_names: channel_names.iter().map(|n| (*n).to_owned()).collect(),
        }
    }

    #[cfg(test)]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn nchannels(&self) -> usize {
        self.channel_names.len()
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Pixel count used as the denominator of percentage thresholds.
    /// Empty images count as one pixel.
    pub fn npels(&self) -> usize {
        self.pixel_count().max(1)
    }

    /// Width, height, depth and channel count agree. Channel names and
    /// sample types may differ.
    pub fn same_size(&self, other: &ImageShape) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.depth == other.depth
            && self.nchannels() == other.nchannels()
    }

    pub fn pixel_index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.height + y) * self.width + x
    }

    /// Inverse of [`pixel_index`](Self::pixel_index).
    pub fn coordinates(&self, index: usize) -> (usize, usize, usize) {
        let plane = self.width * self.height;
        let z = index / plane;
        let rest = index % plane;
        (rest % self.width, rest / self.width, z)
    }

    pub fn channel_name(&self, channel: usize) -> String {
        self.channel_names
            .get(channel)
            .cloned()
            .unwrap_or_else(|| channel.to_string())
    }
}

/// Variable-length sample lists, one per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DeepPixels {
    counts: Vec<usize>,
    offsets: Vec<usize>,
    values: Vec<f32>,
}

impl DeepPixels {
    /// `values` holds, pixel by pixel, `counts[p] * nchannels` interleaved
    /// samples. Returns `None` when the lengths disagree.
    #[allow(dead_code)]
    pub fn new(counts: Vec<usize>, nchannels: usize, values: Vec<f32>) -> Option<Self> {
        let mut offsets = Vec::with_capacity(counts.len());
        let mut total = 0usize;
        for &count in &counts {
            offsets.push(total);
            total += count * nchannels;
        }
        (total == values.len()).then_some(Self {
            counts,
            offsets,
            values,
        })
    }

    pub fn sample_count(&self, pixel: usize) -> usize {
        self.counts[pixel]
    }

    /// All samples of one pixel, interleaved by channel.
    pub fn pixel(&self, pixel: usize, nchannels: usize) -> &[f32] {
        let start = self.offsets[pixel];
        &self.values[start..start + self.counts[pixel] * nchannels]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    /// Pixel-major interleaved samples: x fastest, then y, then z.
    Flat(Vec<f32>),
    Deep(DeepPixels),
    /// Deep level known only from its header; the named format has no
    /// deep sample decoder.
    DeepHeader(&'static str),
}

/// One decoded level of an image, always as `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLevel {
    pub subimage: usize,
    pub miplevel: usize,
    pub shape: ImageShape,
    pub pixels: Pixels,
}

impl ImageLevel {
    pub fn flat(shape: ImageShape, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), shape.pixel_count() * shape.nchannels());
        Self {
            subimage: 0,
            miplevel: 0,
            shape,
            pixels: Pixels::Flat(values),
        }
    }

    /// No file backend decodes deep payloads yet; in-memory sources do.
    #[allow(dead_code)]
    pub fn deep(shape: ImageShape, pixels: DeepPixels) -> Self {
        Self {
            subimage: 0,
            miplevel: 0,
            shape,
            pixels: Pixels::Deep(pixels),
        }
    }

    pub fn deep_header(shape: ImageShape, format: &'static str) -> Self {
        Self {
            subimage: 0,
            miplevel: 0,
            shape,
            pixels: Pixels::DeepHeader(format),
        }
    }

    pub fn at(mut self, subimage: usize, miplevel: usize) -> Self {
        self.subimage = subimage;
        self.miplevel = miplevel;
        self
    }

    pub fn is_deep(&self) -> bool {
        matches!(self.pixels, Pixels::Deep(_) | Pixels::DeepHeader(_))
    }

    /// Fails for levels whose samples were never decoded.
    pub fn require_samples(&self) -> Result<(), SourceError> {
        match self.pixels {
            Pixels::DeepHeader(format) => Err(SourceError::DeepUnsupported(format)),
            _ => Ok(()),
        }
    }

    /// Value of one channel of one pixel. Deep pixels yield their first
    /// sample, or 0 when they have none.
    pub fn sample(&self, pixel: usize, channel: usize) -> f32 {
        let nchannels = self.shape.nchannels();
        match &self.pixels {
            Pixels::Flat(values) => values[pixel * nchannels + channel],
            Pixels::Deep(deep) => deep
                .pixel(pixel, nchannels)
                .get(channel)
                .copied()
                .unwrap_or(0.0),
            Pixels::DeepHeader(_) => 0.0,
        }
    }
}

/// Provides decoded levels of one image file (or any other backing store).
pub trait ImageSource {
    /// Name used in messages, usually the file path.
    fn name(&self) -> &str;

    fn subimage_count(&self) -> usize;

    /// Valid once a level of `subimage` has been loaded.
    fn miplevel_count(&self, subimage: usize) -> usize;

    /// Decode one level as float samples.
    fn load(&mut self, subimage: usize, miplevel: usize) -> Result<ImageLevel, SourceError>;
}

/// Open an image file, choosing the backend by extension.
pub fn open(path: &Path) -> Result<Box<dyn ImageSource>, SourceError> {
    let is_exr = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("exr"));
    debug!(path = %path.display(), is_exr, "opening image");
    if is_exr {
        Ok(Box::new(ExrSource::open(path)?))
    } else {
        Ok(Box::new(RasterSource::open(path)?))
    }
}

/// Holds the level most recently loaded from a source. Requests for the
/// level already held do not touch the source.
pub struct LevelSlot {
    source: Box<dyn ImageSource>,
    current: Option<ImageLevel>,
}

impl LevelSlot {
    pub fn new(source: Box<dyn ImageSource>) -> Self {
        Self {
            source,
            current: None,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn subimage_count(&self) -> usize {
        self.source.subimage_count()
    }

    pub fn miplevel_count(&self, subimage: usize) -> usize {
        self.source.miplevel_count(subimage)
    }

    pub fn request(&mut self, subimage: usize, miplevel: usize) -> Result<&ImageLevel, SourceError> {
        let held = self
            .current
            .as_ref()
            .is_some_and(|l| l.subimage == subimage && l.miplevel == miplevel);
        if !held {
            // Drop the old level before decoding the next one.
            self.current = None;
            debug!(name = %self.source.name(), subimage, miplevel, "loading level");
            let level = self.source.load(subimage, miplevel)?;
            if (level.subimage, level.miplevel) != (subimage, miplevel) {
                return Err(SourceError::WrongLevel {
                    requested: (subimage, miplevel),
                    loaded: (level.subimage, level.miplevel),
                });
            }
            self.current = Some(level);
        }
        match &self.current {
            Some(level) => Ok(level),
            None => Err(SourceError::NoSuchLevel { subimage, miplevel }),
        }
    }
}
