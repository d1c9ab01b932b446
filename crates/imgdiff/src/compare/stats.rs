use super::{CompareStats, PixelLocation};
use crate::source::{ImageLevel, Pixels};

/// Error between two samples. Equal values (matching infinities, NaN vs
/// NaN) give 0; any other non-finite difference is infinite.
fn sample_error(a: f32, b: f32) -> f64 {
    if a == b || (a.is_nan() && b.is_nan()) {
        return 0.0;
    }
    let e = (f64::from(a) - f64::from(b)).abs();
    if e.is_finite() { e } else { f64::INFINITY }
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    sum_sq: f64,
    values: u64,
    max_error: f64,
    max_pixel: usize,
    max_channel: usize,
    warn_count: u64,
    fail_count: u64,
}

impl Accumulator {
    /// Fold in the `(channel, a, b)` samples of one pixel. Returns whether
    /// any sample exceeded the warning and failure thresholds.
    fn samples(
        &mut self,
        pixel: usize,
        samples: impl Iterator<Item = (usize, f32, f32)>,
        fail: f64,
        warn: f64,
    ) -> (bool, bool) {
        let mut warned = false;
        let mut failed = false;
        for (channel, a, b) in samples {
            let e = sample_error(a, b);
            self.sum += e;
            self.sum_sq += e * e;
            self.values += 1;
            if e > self.max_error {
                self.max_error = e;
                self.max_pixel = pixel;
                self.max_channel = channel;
            }
            warned |= e > warn;
            failed |= e > fail;
        }
        (warned, failed)
    }

    fn count(&mut self, warned: bool, failed: bool) {
        self.warn_count += u64::from(warned);
        self.fail_count += u64::from(failed);
    }
}

/// Numeric comparison of two equally shaped levels.
///
/// Deep pixels compare samples pairwise up to the shorter list; a pixel
/// whose sample counts differ counts as both warned and failed.
pub fn compare(a: &ImageLevel, b: &ImageLevel, fail: f64, warn: f64) -> CompareStats {
    let shape = &a.shape;
    let nchannels = shape.nchannels();
    let mut acc = Accumulator::default();

    for pixel in 0..shape.pixel_count() {
        let (warned, failed) = match (&a.pixels, &b.pixels) {
            (Pixels::Flat(av), Pixels::Flat(bv)) => {
                let base = pixel * nchannels;
                let samples = (0..nchannels).map(|c| (c, av[base + c], bv[base + c]));
                acc.samples(pixel, samples, fail, warn)
            }
            (Pixels::Deep(ad), Pixels::Deep(bd)) => {
                let pairs = ad.pixel(pixel, nchannels).iter().zip(bd.pixel(pixel, nchannels));
                let samples = pairs
                    .enumerate()
                    .map(|(i, (&x, &y))| (i % nchannels, x, y));
                let (warned, failed) = acc.samples(pixel, samples, fail, warn);
                let mismatch = ad.sample_count(pixel) != bd.sample_count(pixel);
                (warned || mismatch, failed || mismatch)
            }
            // Deep against flat never reaches here; compare first samples.
            _ => {
                let samples = (0..nchannels).map(|c| (c, a.sample(pixel, c), b.sample(pixel, c)));
                acc.samples(pixel, samples, fail, warn)
            }
        };
        acc.count(warned, failed);
    }

    let n = acc.values as f64;
    let mean_error = acc.sum / n;
    let rms_error = (acc.sum_sq / n).sqrt();
    let psnr = if rms_error == 0.0 {
        f64::INFINITY
    } else {
        20.0 * (1.0 / rms_error).log10()
    };
    let (x, y, z) = if shape.pixel_count() == 0 {
        (0, 0, 0)
    } else {
        shape.coordinates(acc.max_pixel)
    };

    CompareStats {
        mean_error,
        rms_error,
        psnr,
        max_error: acc.max_error,
        max_location: PixelLocation {
            x,
            y,
            z,
            channel: acc.max_channel,
        },
        warn_count: acc.warn_count,
        fail_count: acc.fail_count,
    }
}
