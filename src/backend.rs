//! Build-backend adapter.
//!
//! A packaging build backend asks for the project metadata before building a
//! distribution. [`prepare_metadata`] answers with a `PKG-INFO` file whose
//! `Version` comes from [`crate::get_version`], so a build, the CLI and the
//! library always report the same version, or all fail on the same
//! configuration error.

use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    Context,
    Result,
};
use tracing::info;

use crate::config::ConfigResolver;
use crate::version::get_version;

/// Core metadata version written to `PKG-INFO`.
pub const METADATA_VERSION: &str = "2.1";

/// Name used when neither carrier declares one.
pub const UNKNOWN_NAME: &str = "UNKNOWN";

/// File name of the generated metadata.
pub const PKG_INFO: &str = "PKG-INFO";

/// Name and version of the package, as a build backend would report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
}

impl PackageMetadata {
    /// Compute metadata for `project_root`.
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let version = get_version(project_root)?;
        let name = ConfigResolver::new(project_root)
            .package_name()?
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        Ok(Self { name, version })
    }

    /// `PKG-INFO` contents.
    pub fn to_pkg_info(&self) -> String {
        format!(
            "Metadata-Version: {}\nName: {}\nVersion: {}\n",
            METADATA_VERSION, self.name, self.version
        )
    }
}

/// Write `PKG-INFO` for `project_root` into `metadata_dir`, creating it if
/// needed, and return the written path.
pub fn prepare_metadata(project_root: &Path, metadata_dir: &Path) -> Result<PathBuf> {
    let metadata = PackageMetadata::for_project(project_root)?;

    fs::create_dir_all(metadata_dir)
        .with_context(|| format!("Failed to create {}", metadata_dir.display()))?;
    let path = metadata_dir.join(PKG_INFO);
    fs::write(&path, metadata.to_pkg_info())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), version = %metadata.version, "wrote package metadata");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkg_info() {
        let metadata = PackageMetadata {
            name: "mypkg".to_string(),
            version: "1.2.3".to_string(),
        };
        assert_eq!(
            metadata.to_pkg_info(),
            "Metadata-Version: 2.1\nName: mypkg\nVersion: 1.2.3\n"
        );
    }

    #[test]
    fn test_prepare_metadata_without_config() {
        let project = tempfile::tempdir().unwrap();
        fs::write(
            project.path().join("pyproject.toml"),
            "[project]\nname = \"mypkg\"\n",
        )
        .unwrap();
        let out = tempfile::tempdir().unwrap();

        let path = prepare_metadata(project.path(), &out.path().join("meta")).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("Name: mypkg\n"));
        assert!(content.contains("Version: 0.0.0\n"));
    }

    #[test]
    fn test_prepare_metadata_fails_on_directory_carrier() {
        let project = tempfile::tempdir().unwrap();
        fs::create_dir(project.path().join("setup.py")).unwrap();
        let out = tempfile::tempdir().unwrap();

        assert!(prepare_metadata(project.path(), out.path()).is_err());
        assert!(!out.path().join(PKG_INFO).exists());
    }
}
