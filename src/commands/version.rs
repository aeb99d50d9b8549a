//! Print the version of a project command.
//!
//! Resolves the versioning configuration from `setup.py` / `pyproject.toml`
//! and renders the version from the git state of the project.
//!
//! # Examples
//!
//! ```bash
//! # Version of the project in the current directory
//! git-versioning
//!
//! # Version of another project
//! git-versioning version path/to/project
//!
//! # JSON output with the config source
//! git-versioning version --format json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde_json::json;

use crate::config::{
    ConfigResolver,
    ResolvedConfig,
};
use crate::version::compute_version;

/// Arguments for the `version` command.
#[derive(Parser, Debug)]
pub struct VersionArgs {
    /// Project root containing `setup.py` and/or `pyproject.toml`.
    ///
    /// Defaults to the current directory.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Output format for the version.
    ///
    /// - `version`: Print just the version (e.g., "1.2.3.post4+git.0123abcd")
    /// - `json`: Print JSON with version, enabled and source fields
    #[arg(long, default_value = "version")]
    format: String,
}

/// Print the version of the project at `args.root`.
///
/// # Errors
///
/// Returns an error if:
/// - The versioning configuration is ambiguous or malformed
/// - The git repository cannot be read
/// - The format is not `version` or `json`
///
/// # Example Output
///
/// With `--format version`:
/// ```text
/// 0.0.1
/// ```
///
/// With `--format json`:
/// ```json
/// {"enabled":true,"source":{"carrier":"manifest","key":"setuptools-git-versioning"},"version":"0.0.1"}
/// ```
pub fn version(args: VersionArgs) -> Result<()> {
    let mut logger = cargo_plugin_utils::logger::Logger::new();

    logger.status("Resolving", "versioning config");
    let config = ConfigResolver::new(&args.root).resolve()?;

    logger.status("Reading", "git state");
    let version = compute_version(&args.root, &config)?;
    logger.finish();

    println!("{}", render_output(&args.format, &version, &config)?);
    Ok(())
}

fn render_output(format: &str, version: &str, config: &ResolvedConfig) -> Result<String> {
    match format {
        "version" => Ok(version.to_string()),
        "json" => Ok(json!({
            "version": version,
            "enabled": config.enabled,
            "source": config.source,
        })
        .to_string()),
        _ => anyhow::bail!("Invalid format: {}", format),
    }
}
