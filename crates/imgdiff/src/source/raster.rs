use std::path::Path;

use image::ImageReader;

use super::{ImageLevel, ImageShape, ImageSource, SourceError};

/// Channel names for the layouts the `image` crate decodes.
fn channel_names(count: u8) -> &'static [&'static str] {
    match count {
        1 => &["Y"],
        2 => &["Y", "A"],
        3 => &["R", "G", "B"],
        _ => &["R", "G", "B", "A"],
    }
}

/// Any format the `image` crate decodes: one subimage, one MIP level.
pub struct RasterSource {
    name: String,
    level: ImageLevel,
}

impl RasterSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let names = channel_names(decoded.color().channel_count());
        let rgba = decoded.to_rgba32f();
        let (width, height) = rgba.dimensions();

        // `to_rgba32f` expands gray to RGB; keep only the decoded channels.
        let picks: &[usize] = match names.len() {
            1 => &[0],
            2 => &[0, 3],
            3 => &[0, 1, 2],
            _ => &[0, 1, 2, 3],
        };
        let values = rgba
            .pixels()
            .flat_map(|p| picks.iter().map(move |&c| p.0[c]))
            .collect();

        let shape = ImageShape::new(width as usize, height as usize, names);
        Ok(Self {
            name: path.display().to_string(),
            level: ImageLevel::flat(shape, values),
        })
    }
}

impl ImageSource for RasterSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn subimage_count(&self) -> usize {
        1
    }

    fn miplevel_count(&self, _subimage: usize) -> usize {
        1
    }

    fn load(&mut self, subimage: usize, miplevel: usize) -> Result<ImageLevel, SourceError> {
        if (subimage, miplevel) != (0, 0) {
            return Err(SourceError::NoSuchLevel { subimage, miplevel });
        }
        Ok(self.level.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, LumaA, Rgb, Rgba};

    #[test]
    fn gray_png_loads_one_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        let mut img = image::GrayImage::from_pixel(2, 2, Luma([0]));
        img.put_pixel(1, 0, Luma([255]));
        img.save(&path).unwrap();

        let mut source = RasterSource::open(&path).unwrap();
        let level = source.load(0, 0).unwrap();
        assert_eq!(level.shape, ImageShape::new(2, 2, &["Y"]));
        assert_eq!(level.sample(0, 0), 0.0);
        assert_eq!(level.sample(1, 0), 1.0);
    }

    #[test]
    fn channel_layouts_follow_color_type() {
        let dir = tempfile::tempdir().unwrap();

        let la = dir.path().join("la.png");
        image::ImageBuffer::from_pixel(1, 1, LumaA([255u8, 0])).save(&la).unwrap();
        let level = RasterSource::open(&la).unwrap().load(0, 0).unwrap();
        assert_eq!(level.shape.channel_names, ["Y", "A"]);
        assert_eq!((level.sample(0, 0), level.sample(0, 1)), (1.0, 0.0));

        let rgb = dir.path().join("rgb.png");
        image::RgbImage::from_pixel(1, 1, Rgb([255, 0, 255])).save(&rgb).unwrap();
        let level = RasterSource::open(&rgb).unwrap().load(0, 0).unwrap();
        assert_eq!(level.shape.nchannels(), 3);

        let rgba = dir.path().join("rgba.png");
        image::RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])).save(&rgba).unwrap();
        let level = RasterSource::open(&rgba).unwrap().load(0, 0).unwrap();
        assert_eq!(level.shape.channel_name(3), "A");
        assert_eq!(level.sample(0, 3), 1.0);
    }

    #[test]
    fn only_level_zero_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        image::GrayImage::new(1, 1).save(&path).unwrap();
        let mut source = RasterSource::open(&path).unwrap();
        assert!(matches!(
            source.load(0, 1),
            Err(SourceError::NoSuchLevel { .. })
        ));
    }

    #[test]
    fn undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(RasterSource::open(&path).is_err());
    }
}
