use std::path::PathBuf;

use clap::Parser;

use crate::config::{CliOverrides, OutputConfig, ThresholdConfig};

/// Long options that are also accepted with a single dash (`-fail 0.1`).
const LEGACY_OPTIONS: &[&str] = &[
    "fail",
    "failpercent",
    "hardfail",
    "warn",
    "warnpercent",
    "hardwarn",
    "od",
    "abs",
    "scale",
    "help",
];

#[derive(Parser, Debug)]
#[command(
    name = "imgdiff",
    version,
    about = "Compare two images and report whether they match within tolerances",
    after_help = "Exit status: 0 pass, 1 warning, 2 failure, 3 size mismatch, 4 file error"
)]
pub struct Cli {
    /// First image (usually the new render)
    #[arg(value_name = "IMAGE_A")]
    pub image_a: PathBuf,

    /// Second image (usually the reference)
    #[arg(value_name = "IMAGE_B")]
    pub image_b: PathBuf,

    /// Print statistics for every level, not only failing ones
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Compare all subimages and MIP levels
    #[arg(short = 'a', long = "all")]
    pub compare_all: bool,

    /// TOML config file (overrides IMGDIFF_CONFIG)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub thresholds: ThresholdConfig,

    #[command(flatten)]
    pub output: OutputConfig,
}

impl Cli {
    pub fn into_parts(self) -> (PathBuf, PathBuf, CliOverrides) {
        let overrides = CliOverrides {
            config: self.config,
            verbose: self.verbose,
            compare_all: self.compare_all,
            thresholds: self.thresholds,
            output: self.output,
        };
        (self.image_a, self.image_b, overrides)
    }
}

/// Rewrite single-dash long options into the `--` form clap expects.
/// Everything after a bare `--` is left alone.
pub fn normalize_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut positional_only = false;
    args.into_iter()
        .map(|arg| {
            if positional_only {
                return arg;
            }
            if arg == "--" {
                positional_only = true;
                return arg;
            }
            match arg.strip_prefix('-') {
                Some(name) if !name.starts_with('-') && LEGACY_OPTIONS.contains(&name) => {
                    format!("--{name}")
                }
                _ => arg,
            }
        })
        .collect()
}
