use image::{Rgba, RgbaImage};

use crate::source::ImageLevel;

/// Maximum possible delta in YIQ color space (used by dify internally).
const MAX_YIQ_POSSIBLE_DELTA: f32 = 35215.0;

/// Pre-computed threshold: MAX_YIQ_POSSIBLE_DELTA * 0.1 * 0.1
const THRESHOLD: f32 = MAX_YIQ_POSSIBLE_DELTA * 0.1 * 0.1;

fn to_u8(v: f32) -> u8 {
    // NaN clamps to 0.
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Display-referred RGBA8 view of a level. Depth slices are stacked
/// vertically; deep pixels use their first sample.
fn to_rgba8(level: &ImageLevel) -> RgbaImage {
    let shape = &level.shape;
    let width = shape.width as u32;
    let height = (shape.height * shape.depth) as u32;
    let nchannels = shape.nchannels();

    RgbaImage::from_fn(width, height, |x, y| {
        let pixel = y as usize * shape.width + x as usize;
        let c = |channel: usize| to_u8(level.sample(pixel, channel));
        match nchannels {
            0 => Rgba([0, 0, 0, 255]),
            1 => Rgba([c(0), c(0), c(0), 255]),
            2 => Rgba([c(0), c(0), c(0), c(1)]),
            3 => Rgba([c(0), c(1), c(2), 255]),
            _ => Rgba([c(0), c(1), c(2), c(3)]),
        }
    })
}

/// Count of pixels the dify perceptual metric considers visibly different.
///
/// Runs on an 8-bit view, so differences below 1/255 never register.
pub fn failures(a: &ImageLevel, b: &ImageLevel) -> u64 {
    let left = to_rgba8(a);
    let right = to_rgba8(b);
    if left.as_raw() == right.as_raw() {
        return 0;
    }

    let output_base = Some(dify::cli::OutputImageBase::LeftImage);
    let block_out: Option<std::collections::HashSet<(u32, u32)>> = None;

    match dify::diff::get_results(
        left,
        right,
        THRESHOLD,
        true, // detect anti-aliased
        Some(0.1),
        &output_base,
        &block_out,
    ) {
        Some((diff_count, _diff_image)) => diff_count.max(0) as u64,
        None => 0,
    }
}
