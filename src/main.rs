//! Derive a Python package version from git state and its configuration.
//!
//! The configuration is read from `setup.py` (`version_config=` or
//! `setuptools_git_versioning=`) or from `pyproject.toml`
//! (`[tool.setuptools-git-versioning]`), and the version is rendered from the
//! latest tag, the commits since that tag and the dirty status of the tree.
//!
//! The same computation backs the library function
//! `git_versioning::get_version` and the `backend` command, so all access
//! paths agree.

use anyhow::Result;
use clap::{
    ArgAction,
    Parser,
    Subcommand,
};
use git_versioning::commands;
use git_versioning::commands::{
    BackendArgs,
    ShowConfigArgs,
    VersionArgs,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "git-versioning",
    version,
    about,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Increase log verbosity (`-v` info, `-vv` debug). `RUST_LOG` takes
    /// precedence when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,

    // Used when no subcommand is given.
    #[command(flatten)]
    version: VersionArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the version of a project
    #[command(name = "version")]
    Version(VersionArgs),
    /// Print the resolved versioning configuration as JSON
    #[command(name = "config")]
    Config(ShowConfigArgs),
    /// Write PKG-INFO metadata the way a build backend would
    #[command(name = "backend")]
    Backend(BackendArgs),
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Command::Version(args)) => commands::version(args),
        Some(Command::Config(args)) => commands::show_config(args),
        Some(Command::Backend(args)) => commands::backend(args),
        None => commands::version(cli.version),
    }
}
