use std::path::{Path, PathBuf};

use exr::image::AnyImage;
use exr::meta::MetaData;
use exr::prelude::read_all_data_from_file;
use tracing::debug;

use super::{ImageLevel, ImageShape, ImageSource, SourceError};

/// OpenEXR file: each layer is a subimage, each mip or rip level of a
/// layer is a MIP level.
pub struct ExrSource {
    name: String,
    path: PathBuf,
    layers: Vec<LayerHeader>,
    /// Decoded on the first flat level request.
    image: Option<AnyImage>,
}

/// What the header says about one layer.
struct LayerHeader {
    deep: bool,
    shape: ImageShape,
}

impl ExrSource {
    /// Reads the headers only; pixel data is decoded on demand.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let meta = MetaData::read_from_file(path, false)?;
        let layers = meta
            .headers
            .iter()
            .map(|h| LayerHeader {
                deep: h.deep,
                shape: ImageShape {
                    width: h.layer_size.width(),
                    height: h.layer_size.height(),
                    depth: 1,
                    channel_names: h.channels.list.iter().map(|c| c.name.to_string()).collect(),
                },
            })
            .collect();
        debug!(path = %path.display(), layers = meta.headers.len(), "read OpenEXR headers");
        Ok(Self {
            name: path.display().to_string(),
            path: path.to_path_buf(),
            layers,
            image: None,
        })
    }

    fn decoded(&mut self) -> Result<&AnyImage, SourceError> {
        if self.image.is_none() {
            debug!(path = %self.path.display(), "decoding OpenEXR pixel data");
            self.image = Some(read_all_data_from_file(&self.path)?);
        }
        match &self.image {
            Some(image) => Ok(image),
            None => Err(SourceError::Backend(format!(
                "no pixel data decoded from {}",
                self.name
            ))),
        }
    }
}

impl ImageSource for ExrSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn subimage_count(&self) -> usize {
        self.layers.len().max(1)
    }

    fn miplevel_count(&self, subimage: usize) -> usize {
        let Some(image) = &self.image else {
            return 1;
        };
        image
            .layer_data
            .get(subimage)
            .and_then(|layer| layer.channel_data.list.first())
            .map_or(1, |channel| channel.sample_data.levels_as_slice().len())
    }

    fn load(&mut self, subimage: usize, miplevel: usize) -> Result<ImageLevel, SourceError> {
        // Deep layers carry no mip levels and their samples are not decoded.
        if let Some(header) = self.layers.get(subimage).filter(|h| h.deep) {
            if miplevel > 0 {
                return Err(SourceError::NoSuchLevel { subimage, miplevel });
            }
            debug!(path = %self.path.display(), subimage, "deep layer, using header only");
            return Ok(ImageLevel::deep_header(header.shape.clone(), "OpenEXR").at(subimage, 0));
        }
        let image = self.decoded()?;
        let layer = image
            .layer_data
            .get(subimage)
            .ok_or(SourceError::NoSuchLevel { subimage, miplevel })?;

        let channels = &layer.channel_data.list;
        let mut size = None;
        let mut planes: Vec<Vec<f32>> = Vec::with_capacity(channels.len());
        for channel in channels {
            let (samples, level_size) = layer
                .levels_with_resolution(&channel.sample_data)
                .nth(miplevel)
                .ok_or(SourceError::NoSuchLevel { subimage, miplevel })?;
            size = Some(level_size);
            planes.push(samples.values_as_f32().collect());
        }

        let (width, height) = size.map_or((0, 0), |s| (s.width(), s.height()));
        let names: Vec<String> = channels.iter().map(|c| c.name.to_string()).collect();
        let shape = ImageShape {
            width,
            height,
            depth: 1,
            channel_names: names,
        };

        // Planar per channel in the file, interleaved per pixel here.
        let pixel_count = width * height;
        let mut values = Vec::with_capacity(pixel_count * planes.len());
        for pixel in 0..pixel_count {
            values.extend(planes.iter().map(|plane| plane[pixel]));
        }

        Ok(ImageLevel::flat(shape, values).at(subimage, miplevel))
    }
}
