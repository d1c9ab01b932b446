use std::path::PathBuf;

use anyhow::{Context, Result};

use super::thresholds::{OutputConfig, ThresholdConfig};
use super::{CONFIG_ENV, Config, Thresholds, load, validate_threshold};

/// Values extracted from the CLI that participate in the merge.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub verbose: bool,
    pub compare_all: bool,
    pub thresholds: ThresholdConfig,
    pub output: OutputConfig,
}

/// Fully resolved config after CLI > env > file > defaults merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRunConfig {
    pub verbose: bool,
    pub compare_all: bool,
    pub thresholds: Thresholds,
    pub output: OutputConfig,
}

impl ResolvedRunConfig {
    pub fn new(cli: CliOverrides) -> Result<Self> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Merge with an explicit environment lookup.
    pub fn resolve(cli: CliOverrides, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // 1. File layer
        let config_path = cli.config.clone().or_else(|| env(CONFIG_ENV).map(PathBuf::from));
        let file_config = match &config_path {
            Some(path) => load(path)?,
            None => Config::default(),
        };

        // 2. Env layer
        let env_threshold = |key: &str| -> Result<Option<f64>> {
            env(key)
                .map(|v| {
                    v.parse::<f64>()
                        .map_err(|e| anyhow::anyhow!("{e}"))
                        .and_then(|v| validate_threshold(v).map_err(|e| anyhow::anyhow!(e)))
                })
                .transpose()
                .with_context(|| format!("{key} must be a non-negative float"))
        };
        let env_layer = ThresholdConfig {
            fail: env_threshold("IMGDIFF_FAIL")?,
            warn: env_threshold("IMGDIFF_WARN")?,
            ..Default::default()
        };

        // 3. File base, then env, then CLI overlay
        let mut thresholds = file_config.thresholds;
        thresholds.merge(&env_layer);
        thresholds.merge(&cli.thresholds);

        let mut output = file_config.output;
        output.merge(&cli.output);

        Ok(Self {
            verbose: cli.verbose || file_config.verbose,
            compare_all: cli.compare_all || file_config.compare_all,
            thresholds: Thresholds::from(&thresholds),
            output,
        })
    }
}
