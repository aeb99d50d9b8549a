//! Print the resolved versioning configuration command.
//!
//! Useful to check which carrier and key a project's configuration is read
//! from, and which defaults apply.
//!
//! # Examples
//!
//! ```bash
//! git-versioning config
//! git-versioning config path/to/project
//! ```

use std::path::PathBuf;

use anyhow::{
    Context,
    Result,
};
use clap::Parser;

use crate::config::ConfigResolver;

/// Arguments for the `config` command.
#[derive(Parser, Debug)]
pub struct ShowConfigArgs {
    /// Project root containing `setup.py` and/or `pyproject.toml`.
    #[arg(default_value = ".")]
    root: PathBuf,
}

/// Print the resolved configuration as pretty JSON.
///
/// # Example Output
///
/// ```json
/// {
///   "enabled": true,
///   "template": "{tag}",
///   "dev_template": "{tag}.post{ccount}+git.{sha}",
///   "dirty_template": "{tag}.post{ccount}+git.{sha}.dirty",
///   "starting_version": "0.0.1",
///   "version_file": null,
///   "tag_filter": null,
///   "tag_formatter": null,
///   "branch_formatter": null,
///   "source": {
///     "carrier": "manifest",
///     "key": "setuptools-git-versioning"
///   }
/// }
/// ```
pub fn show_config(args: ShowConfigArgs) -> Result<()> {
    let config = ConfigResolver::new(&args.root).resolve()?;
    let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", json);
    Ok(())
}
