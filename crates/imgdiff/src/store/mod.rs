use std::path::Path;

use exr::prelude::{
    AnyChannel, AnyChannels, Encoding, FlatSamples, Image, Layer, LayerAttributes, Vec2,
    WritableImage,
};
use image::{DynamicImage, ImageFormat, Rgba32FImage};
use smallvec::SmallVec;
use tracing::debug;

use crate::source::{ImageLevel, SourceError};

/// Destination for the difference image.
pub trait ImageWriter {
    fn write(&self, path: &Path, level: &ImageLevel) -> Result<(), SourceError>;
}

/// Writes `.exr` paths with full float precision and every other
/// extension through the `image` crate.
pub struct FileWriter;

impl ImageWriter for FileWriter {
    fn write(&self, path: &Path, level: &ImageLevel) -> Result<(), SourceError> {
        ensure_parent(path)?;
        let is_exr = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("exr"));
        debug!(path = %path.display(), is_exr, "writing image");
        if is_exr {
            write_exr(path, level)
        } else {
            write_raster(path, level)
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), SourceError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Every pixel's value for one channel, in pixel order.
fn channel_plane(level: &ImageLevel, channel: usize) -> Vec<f32> {
    (0..level.shape.pixel_count())
        .map(|pixel| level.sample(pixel, channel))
        .collect()
}

fn write_exr(path: &Path, level: &ImageLevel) -> Result<(), SourceError> {
    let shape = &level.shape;
    if shape.depth != 1 {
        return Err(SourceError::Backend(format!(
            "OpenEXR cannot store volumes (depth {})",
            shape.depth
        )));
    }

    let channels: SmallVec<[AnyChannel<FlatSamples>; 4]> = shape
        .channel_names
        .iter()
        .enumerate()
        .map(|(c, name)| AnyChannel::new(name.as_str(), FlatSamples::F32(channel_plane(level, c))))
        .collect();

    let layer = Layer::new(
        Vec2(shape.width, shape.height),
        LayerAttributes::default(),
        Encoding::FAST_LOSSLESS,
        AnyChannels::sort(channels),
    );
    Image::from_layer(layer).write().to_file(path)?;
    Ok(())
}

/// Integer formats cannot hold negative or >1 values; they are clamped.
fn write_raster(path: &Path, level: &ImageLevel) -> Result<(), SourceError> {
    let shape = &level.shape;
    let format = ImageFormat::from_path(path)?;
    let nchannels = shape.nchannels();
    if !(1..=4).contains(&nchannels) || shape.depth != 1 {
        return Err(SourceError::UnsupportedChannels {
            channels: nchannels,
            format: format!("{format:?}"),
        });
    }

    let mut rgba = Vec::with_capacity(shape.pixel_count() * 4);
    for pixel in 0..shape.pixel_count() {
        let sample = |c: usize| level.sample(pixel, c).clamp(0.0, 1.0);
        let expanded = match nchannels {
            1 => [sample(0), sample(0), sample(0), 1.0],
            2 => [sample(0), sample(0), sample(0), sample(1)],
            3 => [sample(0), sample(1), sample(2), 1.0],
            _ => [sample(0), sample(1), sample(2), sample(3)],
        };
        rgba.extend_from_slice(&expanded);
    }
    let buffer = Rgba32FImage::from_raw(shape.width as u32, shape.height as u32, rgba)
        .ok_or_else(|| SourceError::Backend("pixel buffer does not match image size".into()))?;
    let full = DynamicImage::ImageRgba32F(buffer);

    let wide = matches!(format, ImageFormat::Png | ImageFormat::Tiff);
    let out = match (nchannels, wide) {
        (1, true) => DynamicImage::ImageLuma16(full.to_luma16()),
        (2, true) => DynamicImage::ImageLumaA16(full.to_luma_alpha16()),
        (3, true) => DynamicImage::ImageRgb16(full.to_rgb16()),
        (_, true) => DynamicImage::ImageRgba16(full.to_rgba16()),
        (1, false) => DynamicImage::ImageLuma8(full.to_luma8()),
        (2, false) => DynamicImage::ImageLumaA8(full.to_luma_alpha8()),
        (3, false) => DynamicImage::ImageRgb8(full.to_rgb8()),
        (_, false) => DynamicImage::ImageRgba8(full.to_rgba8()),
    };
    out.save_with_format(path, format)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ImageShape, open};

    fn level(channels: &[&str], values: Vec<f32>) -> ImageLevel {
        let pixels = values.len() / channels.len();
        ImageLevel::flat(ImageShape::new(pixels, 1, channels), values)
    }

    #[test]
    fn exr_keeps_signed_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("diff.exr");
        let written = level(&["B", "G", "R"], vec![-0.5, 0.25, 3.0, 0.0, 1.0, -2.0]);
        FileWriter.write(&path, &written).unwrap();

        let mut source = open(&path).unwrap();
        let read = source.load(0, 0).unwrap();
        assert_eq!(read.shape, written.shape);
        assert_eq!(read.pixels, written.pixels);
    }

    #[test]
    fn png_gray_round_trips_within_16_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff.png");
        FileWriter
            .write(&path, &level(&["Y"], vec![0.0, 1.0, 0.5, -1.0]))
            .unwrap();

        let read = image::open(&path).unwrap();
        assert_eq!(read.color(), image::ColorType::L16);
        let gray = read.to_luma16();
        assert_eq!(gray.get_pixel(0, 0).0, [0]);
        assert_eq!(gray.get_pixel(1, 0).0, [65535]);
        assert_eq!(gray.get_pixel(3, 0).0, [0]);
    }

    #[test]
    fn raster_rejects_many_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff.png");
        let err = FileWriter
            .write(&path, &level(&["A", "B", "C", "D", "E"], vec![0.0; 5]))
            .unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedChannels { channels: 5, .. }));
    }
}
