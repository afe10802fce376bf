use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use treeline_sdk::{NodeId, ProcessId, ReleaseNr, ReleaseProcessPinning, TrackingMode};

#[derive(Parser)]
#[command(
    name = "treeline",
    about = "Treeline: tree-node version and release reconciliation",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decide whether a single reference is stale
    Resolve(ResolveArgs),
    /// Load a scenario, advance one node and show what propagated
    Simulate(SimulateArgs),
    /// Check whether a node in a scenario can be released
    PrepareRelease(PrepareReleaseArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ModeArg {
    CurrentVersion,
    LatestRelease,
    Fixed,
}

impl From<ModeArg> for TrackingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::CurrentVersion => TrackingMode::CurrentVersion,
            ModeArg::LatestRelease => TrackingMode::LatestRelease,
            ModeArg::Fixed => TrackingMode::Fixed,
        }
    }
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Tracking mode of the reference
    #[arg(long, value_enum)]
    pub mode: ModeArg,
    /// Current version number of the target
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub current_version: u64,
    /// Latest release number of the target, if released
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub latest_release: Option<u64>,
    /// Version pinned by the latest release (defaults to the current version)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub released_version: Option<u64>,
    /// Release number recorded on the reference
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub reference_release: Option<u64>,
    /// Version the referrer last saw
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub known_version: Option<u64>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum Action {
    /// Save a new version
    Version,
    /// Release the current version
    Release,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Scenario file (JSON)
    pub scenario: PathBuf,
    /// Node to advance
    #[arg(long)]
    pub node: NodeId,
    #[arg(long, value_enum, default_value = "version")]
    pub action: Action,
    #[arg(short, long, default_value = "")]
    pub message: String,
    /// Release tags (with `--action release`)
    #[arg(long)]
    pub tag: Vec<String>,
    /// Pinning decisions, `PROCESS=MODEL@RELEASE`
    #[arg(long, value_parser = parse_pin)]
    pub pin: Vec<ReleaseProcessPinning>,
}

#[derive(Args)]
pub struct PrepareReleaseArgs {
    /// Scenario file (JSON)
    pub scenario: PathBuf,
    /// Node to prepare
    pub node: NodeId,
    /// Pinning decisions, `PROCESS=MODEL@RELEASE`
    #[arg(long, value_parser = parse_pin)]
    pub pin: Vec<ReleaseProcessPinning>,
}

/// Parse `PROCESS=MODEL@RELEASE`, e.g. `p1=lib@2`.
pub fn parse_pin(s: &str) -> Result<ReleaseProcessPinning, String> {
    let (process, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PROCESS=MODEL@RELEASE, got `{s}`"))?;
    let (model, release) = rest
        .split_once('@')
        .ok_or_else(|| format!("expected MODEL@RELEASE after `=`, got `{rest}`"))?;
    let release = release
        .trim_start_matches(['r', 'R'])
        .parse::<u64>()
        .ok()
        .filter(|nr| *nr >= 1)
        .ok_or_else(|| format!("invalid release number `{release}`"))?;
    Ok(ReleaseProcessPinning::new(
        ProcessId::new(process).map_err(|e| e.to_string())?,
        NodeId::new(model).map_err(|e| e.to_string())?,
        ReleaseNr::new(release),
    ))
}
