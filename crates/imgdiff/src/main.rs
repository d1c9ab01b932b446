mod cli;
mod commands;
mod compare;
mod config;
mod report;
mod source;
mod store;
mod traverse;

use clap::Parser;
use clap::error::ErrorKind;
use config::ResolvedRunConfig;
use tracing_subscriber::EnvFilter;

/// Usage errors share the warning code, as the classic tool did.
const USAGE_EXIT: i32 = 1;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("imgdiff=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::normalize_args(std::env::args());
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(USAGE_EXIT);
        }
    };

    let (image_a, image_b, overrides) = cli.into_parts();
    let config = match ResolvedRunConfig::new(overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("imgdiff ERROR: {e:#}");
            std::process::exit(compare::FILE_ERROR_EXIT);
        }
    };
    let code = commands::compare(&config, &image_a, &image_b)?;
    std::process::exit(code);
}
