//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Berth - builds third-party numerical libraries with their native makefiles
#[derive(Parser)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and install packages
    Install(InstallArgs),

    /// Print the build-control file a package would be built with
    Config(ConfigArgs),

    /// Show the install state of packages
    Status(StatusArgs),

    /// Detect the toolchain and show what packages will be built with
    Probe(ProbeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by commands that resolve a package.
#[derive(Args)]
pub struct FeatureArgs {
    /// Index of installed dependencies
    #[arg(long, env = "BERTH_DEPS", value_name = "INDEX")]
    pub deps: Option<PathBuf>,

    /// Enable an option of the package
    #[arg(long = "with", value_name = "OPTION")]
    pub with: Vec<String>,

    /// Disable an option of the package (wins over --with)
    #[arg(long = "without", value_name = "OPTION")]
    pub without: Vec<String>,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Package files to install
    #[arg(required = true, value_name = "PACKAGE")]
    pub packages: Vec<PathBuf>,

    #[command(flatten)]
    pub features: FeatureArgs,

    /// Rebuild even if the install is up to date
    #[arg(long)]
    pub force: bool,

    /// Install prefix (overrides `[install] prefix`)
    #[arg(long)]
    pub prefix: Option<PathBuf>,

    /// Parallel make jobs (overrides `[build] jobs`)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Per-step timeout in seconds (overrides `[build] timeout_secs`)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Package file
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,

    #[command(flatten)]
    pub features: FeatureArgs,

    /// Print only the fingerprint
    #[arg(long)]
    pub fingerprint: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Package files to inspect
    #[arg(required = true, value_name = "PACKAGE")]
    pub packages: Vec<PathBuf>,

    /// Install prefix (overrides `[install] prefix`)
    #[arg(long)]
    pub prefix: Option<PathBuf>,
}

#[derive(Args)]
pub struct ProbeArgs {
    /// Print the profile as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
