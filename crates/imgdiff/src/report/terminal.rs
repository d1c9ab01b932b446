use std::io::{self, Write};

use crate::compare::{CompareStats, Verdict};
use crate::config::ResolvedRunConfig;
use crate::source::ImageShape;
use crate::traverse::{Entry, LevelLabel, LevelOutcome, LevelResult, Note, RunReport};

const MIP_COUNT_DIFFERS: &str = "Files do not match in their number of MIPmap levels";

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// `printf("%.{precision}g")`, with NaN and infinities spelled `nan`/`inf`.
pub fn format_general(v: f64, precision: usize) -> String {
    if v.is_nan() {
        return "nan".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if v == 0.0 {
        return "0".into();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, v);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{v:.decimals$}")).to_owned()
    }
}

/// Default stream formatting of a double.
pub fn format_float(v: f64) -> String {
    format_general(v, 6)
}

fn format_percent(count: u64, npels: usize) -> String {
    format_general(100.0 * count as f64 / npels as f64, 3)
}

/// `WxH[xD]xC`
fn format_dims(shape: &ImageShape) -> String {
    let mut s = format!("{}x{}", shape.width, shape.height);
    if shape.depth > 1 {
        s.push_str(&format!("x{}", shape.depth));
    }
    s.push_str(&format!("x{}", shape.nchannels()));
    s
}

pub fn verdict_line(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Ok => "PASS",
        Verdict::Warn => "WARNING",
        Verdict::Fail | Verdict::SizeMismatch => "FAILURE",
    }
}

fn print_label(out: &mut impl Write, label: &LevelLabel) -> io::Result<()> {
    let mut place = Vec::new();
    if let Some(subimage) = label.subimage {
        place.push(format!("Subimage {subimage}"));
    }
    if let Some(miplevel) = label.miplevel {
        place.push(format!("MIP level {miplevel}"));
    }
    if !place.is_empty() {
        write!(out, "{}: ", place.join(", "))?;
    }

    let shape = &label.shape;
    write!(out, "{} x {}", shape.width, shape.height)?;
    if shape.depth > 1 {
        write!(out, " x {}", shape.depth)?;
    }
    let n = shape.nchannels();
    writeln!(out, ", {n} channel{}", if n == 1 { "" } else { "s" })
}

fn print_stats(
    out: &mut impl Write,
    shape: &ImageShape,
    stats: &CompareStats,
    npels: usize,
    perceptual_failures: Option<u64>,
    config: &ResolvedRunConfig,
) -> io::Result<()> {
    writeln!(out, "  Mean error = {}", format_float(stats.mean_error))?;
    writeln!(out, "  RMS error = {}", format_float(stats.rms_error))?;
    writeln!(out, "  Peak SNR = {}", format_float(stats.psnr))?;

    write!(out, "  Max error  = {}", format_float(stats.max_error))?;
    if stats.max_error != 0.0 {
        let at = &stats.max_location;
        write!(out, " @ ({}, {}", at.x, at.y)?;
        if shape.depth > 1 {
            write!(out, ", {}", at.z)?;
        }
        write!(out, ", {})", shape.channel_name(at.channel))?;
    }
    writeln!(out)?;

    let t = &config.thresholds;
    writeln!(
        out,
        "  {} pixels ({}%) over {}",
        stats.warn_count,
        format_percent(stats.warn_count, npels),
        format_float(t.warn)
    )?;
    writeln!(
        out,
        "  {} pixels ({}%) over {}",
        stats.fail_count,
        format_percent(stats.fail_count, npels),
        format_float(t.fail)
    )?;
    if t.perceptual {
        let failures = perceptual_failures.unwrap_or(0);
        writeln!(
            out,
            "  {failures} pixels ({}%) failed the perceptual test",
            format_percent(failures, npels)
        )?;
    }
    Ok(())
}

fn print_level(out: &mut impl Write, level: &LevelOutcome, config: &ResolvedRunConfig) -> io::Result<()> {
    match &level.result {
        LevelResult::Compared {
            label,
            stats,
            npels,
            perceptual_failures,
            ..
        } => {
            if config.verbose || level.running != Verdict::Ok {
                if config.compare_all || label.multi {
                    print_label(out, label)?;
                }
                print_stats(out, &label.shape, stats, *npels, *perceptual_failures, config)?;
            }
        }
        LevelResult::SizeMismatch { label, other } => {
            print_label(out, label)?;
            writeln!(
                out,
                "Images do not match in size: ({}) versus ({})",
                format_dims(&label.shape),
                format_dims(other)
            )?;
            let t = &config.thresholds;
            for threshold in [t.warn, t.fail] {
                writeln!(out, "  0 pixels (0%) over {}", format_float(threshold))?;
            }
        }
        LevelResult::DeepMismatch => {
            writeln!(out, "One image contains deep data, the other does not")?;
        }
        LevelResult::MipCountMismatch => writeln!(out, "{MIP_COUNT_DIFFERS}")?,
    }
    Ok(())
}

fn print_note(out: &mut impl Write, note: &Note) -> io::Result<()> {
    match note {
        Note::MipCountDiffers => writeln!(out, "{MIP_COUNT_DIFFERS}"),
        Note::SubimageCountDiffers { a, b } => {
            writeln!(out, "Images had differing numbers of subimages ({a} vs {b})")
        }
        Note::OnlyFirstSubimage { a, b } => writeln!(
            out,
            "Only compared the first subimage (of {a} and {b}, respectively)"
        ),
    }
}

/// Print the full report of a run, ending with the verdict line.
pub fn print_report(out: &mut impl Write, report: &RunReport, config: &ResolvedRunConfig) -> io::Result<()> {
    writeln!(out, "Comparing \"{}\" and \"{}\"", report.name_a, report.name_b)?;
    for entry in &report.entries {
        match entry {
            Entry::Note(note) => print_note(out, note)?,
            Entry::Level(level) => print_level(out, level, config)?,
        }
    }
    writeln!(out, "{}", verdict_line(report.verdict))
}
