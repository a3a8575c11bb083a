// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use emacsbuild::{
    build::{Build, DryRunner, ReleaseTarget, SubprocessRunner},
    config::{BuildConfig, DEFAULT_CONFIG},
    path::{default_config_path, default_work_dir},
    version::{version_to_list, Version},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::{cmp::Ordering, fs, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "emacsbuild [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::Parse(opts) => run_parse(opts),
            Command::Compare(opts) => run_compare(opts),
            Command::Between(opts) => run_between(opts),
            Command::Plan(opts) => run_plan(opts),
            Command::Build(opts) => run_build(opts).await,
            Command::Config(opts) => run_config(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show the component list of a version string.
    #[command(override_usage = "emacsbuild parse <version>")]
    Parse(ParseOptions),

    /// Compare two version strings.
    #[command(override_usage = "emacsbuild compare <version> <version>")]
    Compare(CompareOptions),

    /// Check if version falls in half-open range [low, high).
    #[command(override_usage = "emacsbuild between <low> <version> <high>")]
    Between(BetweenOptions),

    /// Show build plan of release.
    #[command(override_usage = "emacsbuild plan [options] <release>")]
    Plan(PlanOptions),

    /// Download, patch, configure, and compile release.
    #[command(override_usage = "emacsbuild build [options] <release>")]
    Build(BuildOptions),

    /// Show or initialize configuration file.
    #[command(override_usage = "emacsbuild config [options]")]
    Config(ConfigOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ParseOptions {
    /// Version string to parse.
    #[arg(value_name = "version")]
    pub version: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CompareOptions {
    /// Left-hand version.
    #[arg(value_name = "v1")]
    pub left: Version,

    /// Right-hand version.
    #[arg(value_name = "v2")]
    pub right: Version,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BetweenOptions {
    /// Inclusive lower bound.
    #[arg(value_name = "low")]
    pub low: Version,

    /// Version to check.
    #[arg(value_name = "version")]
    pub version: Version,

    /// Exclusive upper bound.
    #[arg(value_name = "high")]
    pub high: Version,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PlanOptions {
    /// Release to plan for, or "snapshot".
    #[arg(value_name = "release")]
    pub release: String,

    /// Path to configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BuildOptions {
    /// Release to build, or "snapshot".
    #[arg(value_name = "release")]
    pub release: String,

    /// Path to configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Directory to download and build release in.
    #[arg(short, long, value_name = "path")]
    pub work_dir: Option<PathBuf>,

    /// Show build steps without running them.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Run "make install" after compiling.
    #[arg(short, long)]
    pub install: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ConfigOptions {
    /// Write built-in configuration to default configuration path.
    #[arg(short, long)]
    pub init: bool,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn run_parse(opts: ParseOptions) -> Result<()> {
    println!("{}", format_components(&version_to_list(&opts.version)?));

    Ok(())
}

fn run_compare(opts: CompareOptions) -> Result<()> {
    println!("{}", format_comparison(&opts.left, &opts.right));

    Ok(())
}

fn run_between(opts: BetweenOptions) -> Result<()> {
    println!("{}", opts.version.is_between(&opts.low, &opts.high));

    Ok(())
}

fn run_plan(opts: PlanOptions) -> Result<()> {
    let config = load_config(opts.config)?;
    let target = ReleaseTarget::resolve(&opts.release, &config.settings)?;
    print!("{}", config.plan(target.version().clone()));

    Ok(())
}

async fn run_build(opts: BuildOptions) -> Result<()> {
    let config = load_config(opts.config)?;
    let target = ReleaseTarget::resolve(&opts.release, &config.settings)?;
    let plan = config.plan(target.version().clone());
    let work_dir = match (opts.work_dir, &config.settings.work_dir) {
        (Some(work_dir), _) => work_dir,
        (None, Some(work_dir)) => work_dir.as_path().to_path_buf(),
        (None, None) => default_work_dir()?,
    };
    let patch_dir = config.settings.patch_dir.as_path().to_path_buf();

    if opts.dry_run {
        Build::new(target, plan, work_dir, DryRunner::new())
            .with_patch_dir(patch_dir)
            .run(opts.install)
            .await?;
    } else {
        Build::new(target, plan, work_dir, SubprocessRunner::new())
            .with_patch_dir(patch_dir)
            .run(opts.install)
            .await?;
    }

    Ok(())
}

fn run_config(opts: ConfigOptions) -> Result<()> {
    if !opts.init {
        print!("{DEFAULT_CONFIG}");
        return Ok(());
    }

    let path = default_config_path()?;
    if path.exists() {
        bail!("configuration file {:?} already exists", path.display());
    }

    if let Some(parent) = path.parent() {
        mkdirp::mkdirp(parent)
            .with_context(|| format!("failed to create directory {:?}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {:?}", path.display()))?;
    info!("wrote configuration to {:?}", path.display());

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<BuildConfig> {
    let path = match path {
        Some(path) => path,
        None => {
            let path = default_config_path()?;
            if !path.exists() {
                return Ok(BuildConfig::builtin()?);
            }
            path
        }
    };

    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration {:?}", path.display()))?;
    let config = data
        .parse::<BuildConfig>()
        .with_context(|| format!("malformed configuration {:?}", path.display()))?;

    Ok(config)
}

fn format_components(list: &[i64]) -> String {
    let list = list
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!("({list})")
}

fn format_comparison(left: &Version, right: &Version) -> String {
    let relation = match left.cmp(right) {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    };
    format!("{left} {relation} {right}")
}
