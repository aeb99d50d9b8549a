//! Build-backend metadata command.
//!
//! Writes `PKG-INFO` for a project the way a build backend prepares
//! metadata before building a distribution.
//!
//! # Examples
//!
//! ```bash
//! git-versioning backend --metadata-dir build/meta
//! git-versioning backend path/to/project --metadata-dir build/meta
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::backend::prepare_metadata;

/// Arguments for the `backend` command.
#[derive(Parser, Debug)]
pub struct BackendArgs {
    /// Project root containing `setup.py` and/or `pyproject.toml`.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Directory receiving `PKG-INFO`. Created if missing.
    #[arg(long)]
    metadata_dir: PathBuf,
}

/// Write `PKG-INFO` and print its path.
pub fn backend(args: BackendArgs) -> Result<()> {
    let mut logger = cargo_plugin_utils::logger::Logger::new();
    logger.status("Preparing", "package metadata");
    let path = prepare_metadata(&args.root, &args.metadata_dir)?;
    logger.finish();

    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_writes_pkg_info() {
        let project = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let args = BackendArgs {
            root: project.path().to_path_buf(),
            metadata_dir: out.path().to_path_buf(),
        };
        assert!(backend(args).is_ok());

        let content = std::fs::read_to_string(out.path().join("PKG-INFO")).unwrap();
        assert!(content.contains("Name: UNKNOWN\n"));
        assert!(content.contains("Version: 0.0.0\n"));
    }
}
