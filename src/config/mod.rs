//! Versioning configuration resolution.
//!
//! A project may configure versioning in one of two carriers:
//!
//! - `setup.py` (legacy), as a keyword argument of the `setup()` call;
//! - `pyproject.toml` (modern), as a table under `[tool]`.
//!
//! Each carrier accepts two key names, `version_config` (legacy) and
//! `setuptools_git_versioning` (modern). [`ConfigResolver`] picks the single
//! configuration that applies and refuses to guess when the setup is
//! ambiguous:
//!
//! 1. a carrier path that is a directory is a [`ConfigError::Structural`]
//!    error;
//! 2. both key names in one carrier is [`ConfigError::AmbiguousKeys`],
//!    whatever their values;
//! 3. non-empty configuration in both carriers is
//!    [`ConfigError::AmbiguousCarriers`];
//! 4. the chosen value must be a table, or a bool in `setup.py`; anything
//!    else is [`ConfigError::MalformedConfig`].
//!
//! No configuration at all is not an error: versioning is simply disabled
//! and the version is `0.0.0`.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use git_versioning::config::ConfigResolver;
//!
//! let config = ConfigResolver::new(Path::new(".")).resolve()?;
//! if config.enabled {
//!     println!("starting at {}", config.options.starting_version);
//! }
//! # Ok::<(), git_versioning::config::ConfigError>(())
//! ```

mod error;
mod pyproject;
mod setup_py;

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{
    Path,
    PathBuf,
};

pub use error::ConfigError;
use pyproject::Manifest;
use serde::{
    Deserialize,
    Serialize,
};
use setup_py::SetupScript;
use tracing::{
    debug,
    warn,
};

/// File name of the legacy carrier.
pub const SCRIPT_FILE: &str = "setup.py";
/// File name of the modern carrier.
pub const MANIFEST_FILE: &str = "pyproject.toml";

/// Options understood inside a configuration table, besides `enabled`.
const KNOWN_OPTIONS: &[&str] = &[
    "enabled",
    "template",
    "dev_template",
    "dirty_template",
    "starting_version",
    "version_file",
    "tag_filter",
    "tag_formatter",
    "branch_formatter",
];

/// A file that may embed versioning configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierKind {
    /// `setup.py`
    Script,
    /// `pyproject.toml`
    Manifest,
}

impl CarrierKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Script => SCRIPT_FILE,
            Self::Manifest => MANIFEST_FILE,
        }
    }
}

impl fmt::Display for CarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// The two recognized key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    Legacy,
    Modern,
}

impl KeyStyle {
    pub fn key(self) -> &'static str {
        match self {
            Self::Legacy => "version_config",
            Self::Modern => "setuptools_git_versioning",
        }
    }
}

/// What a carrier held under a key, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Explicit `None`.
    Null,
    Literal(toml::Value),
    /// An expression that is not a literal, with the reason.
    Unparsable(String),
}

/// Both key slots of one carrier. Each slot keeps the key as spelled in the
/// file.
#[derive(Debug, Default)]
pub struct KeyProbe {
    pub legacy: Option<(String, RawValue)>,
    pub modern: Option<(String, RawValue)>,
}

impl KeyProbe {
    fn set(&mut self, style: KeyStyle, key: String, value: RawValue) {
        let slot = match style {
            KeyStyle::Legacy => &mut self.legacy,
            KeyStyle::Modern => &mut self.modern,
        };
        *slot = Some((key, value));
    }

    /// Both key names are set, whatever their values.
    pub fn is_ambiguous(&self) -> bool {
        self.legacy.is_some() && self.modern.is_some()
    }

    /// The two conflicting keys as spelled, when both are set.
    fn conflict(&self, carrier: CarrierKind) -> Option<ConfigError> {
        match (&self.legacy, &self.modern) {
            (Some((first, _)), Some((second, _))) => Some(ConfigError::AmbiguousKeys {
                carrier,
                first: first.clone(),
                second: second.clone(),
            }),
            _ => None,
        }
    }

    /// The configured value, if any. Call after checking
    /// [`KeyProbe::is_ambiguous`].
    fn into_value(self, carrier: CarrierKind) -> Option<(String, ConfigValue)> {
        self.modern
            .or(self.legacy)
            .map(|(key, raw)| (key, ConfigValue::classify(&raw, carrier)))
    }
}

/// Shape of a configuration value, validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Absent,
    Bool(bool),
    Mapping(toml::Table),
    Malformed(String),
}

impl ConfigValue {
    /// Validate the shape of `raw`. A bare bool switches versioning on or off
    /// only in `setup.py`; `pyproject.toml` needs a table.
    pub fn classify(raw: &RawValue, carrier: CarrierKind) -> Self {
        match (raw, carrier) {
            (RawValue::Null, _) => Self::Absent,
            (RawValue::Literal(toml::Value::Boolean(enabled)), CarrierKind::Script) => {
                Self::Bool(*enabled)
            }
            (RawValue::Literal(toml::Value::Table(table)), _) => Self::Mapping(table.clone()),
            (RawValue::Literal(other), CarrierKind::Script) => Self::Malformed(format!(
                "expected a bool or a table, got {}",
                other.type_str()
            )),
            (RawValue::Literal(other), CarrierKind::Manifest) => {
                Self::Malformed(format!("expected a table, got {}", other.type_str()))
            }
            (RawValue::Unparsable(reason), _) => Self::Malformed(reason.clone()),
        }
    }

    /// Absent values and empty tables do not configure anything.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Mapping(table) => table.is_empty(),
            Self::Bool(_) | Self::Malformed(_) => false,
        }
    }
}

/// Options controlling how the version string is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningOptions {
    /// Used on a tagged commit with a clean tree.
    pub template: String,
    /// Used when there are commits after the latest tag.
    pub dev_template: String,
    /// Used when the tree has uncommitted changes.
    pub dirty_template: String,
    /// Version used when no tag is reachable from HEAD.
    pub starting_version: String,
    /// File holding the version, read when no tag is reachable.
    pub version_file: Option<PathBuf>,
    /// Regex a tag must match to be considered.
    pub tag_filter: Option<String>,
    /// Regex extracting the version from a tag name.
    pub tag_formatter: Option<String>,
    /// Regex extracting the `{branch}` value from the branch name.
    pub branch_formatter: Option<String>,
}

impl Default for VersioningOptions {
    fn default() -> Self {
        Self {
            template: "{tag}".to_string(),
            dev_template: "{tag}.post{ccount}+git.{sha}".to_string(),
            dirty_template: "{tag}.post{ccount}+git.{sha}.dirty".to_string(),
            starting_version: "0.0.1".to_string(),
            version_file: None,
            tag_filter: None,
            tag_formatter: None,
            branch_formatter: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OptionsTable {
    enabled: Option<bool>,
    #[serde(flatten)]
    options: VersioningOptions,
}

/// Where the resolved configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSource {
    pub carrier: CarrierKind,
    /// The key as spelled in the carrier.
    pub key: String,
}

/// The single configuration that applies to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub options: VersioningOptions,
    /// `None` when neither carrier configures versioning.
    pub source: Option<ConfigSource>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            options: VersioningOptions::default(),
            source: None,
        }
    }
}

/// Resolves the versioning configuration of a project directory.
///
/// Carriers are read fresh on every call; nothing is cached.
pub struct ConfigResolver<'a> {
    project_root: &'a Path,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(project_root: &'a Path) -> Self {
        Self { project_root }
    }

    /// Pick the configuration that applies, or fail when the setup is
    /// ambiguous or malformed.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let script = self.read_script()?;
        let manifest = self.read_manifest()?;

        let script_probe = match &script {
            Some(script) => probe_script(script),
            None => KeyProbe::default(),
        };
        let manifest_probe = match &manifest {
            Some(manifest) => manifest.probe()?,
            None => KeyProbe::default(),
        };

        for (carrier, probe) in [
            (CarrierKind::Script, &script_probe),
            (CarrierKind::Manifest, &manifest_probe),
        ] {
            if let Some(err) = probe.conflict(carrier) {
                return Err(err);
            }
        }

        let from_script = script_probe
            .into_value(CarrierKind::Script)
            .filter(|(_, value)| !value.is_empty());
        let from_manifest = manifest_probe
            .into_value(CarrierKind::Manifest)
            .filter(|(_, value)| !value.is_empty());

        let (carrier, key, value) = match (from_script, from_manifest) {
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousCarriers),
            (Some((key, value)), None) => (CarrierKind::Script, key, value),
            (None, Some((key, value))) => (CarrierKind::Manifest, key, value),
            (None, None) => {
                debug!(root = %self.project_root.display(), "no versioning config found");
                return Ok(ResolvedConfig::default());
            }
        };

        debug!(%carrier, %key, "using versioning config");
        let source = Some(ConfigSource {
            carrier,
            key: key.clone(),
        });

        match value {
            ConfigValue::Bool(enabled) => Ok(ResolvedConfig {
                enabled,
                options: VersioningOptions::default(),
                source,
            }),
            ConfigValue::Mapping(table) => {
                let table = options_table(carrier, &key, table)?;
                Ok(ResolvedConfig {
                    enabled: table.enabled.unwrap_or(true),
                    options: table.options,
                    source,
                })
            }
            ConfigValue::Malformed(reason) => Err(ConfigError::MalformedConfig {
                carrier,
                key,
                reason,
            }),
            ConfigValue::Absent => Ok(ResolvedConfig::default()),
        }
    }

    /// Top-level `starting_version` of `pyproject.toml`, independent of the
    /// versioning table and of `enabled`.
    pub fn starting_version_probe(&self) -> Result<Option<String>, ConfigError> {
        Ok(self
            .read_manifest()?
            .and_then(|manifest| manifest.starting_version()))
    }

    /// Package name from `[project].name`, falling back to `setup(name=...)`.
    pub fn package_name(&self) -> Result<Option<String>, ConfigError> {
        if let Some(name) = self
            .read_manifest()?
            .and_then(|manifest| manifest.project_name())
        {
            return Ok(Some(name));
        }
        Ok(self
            .read_script()?
            .and_then(|script| script.package_name()))
    }

    fn read_script(&self) -> Result<Option<SetupScript>, ConfigError> {
        let path = self.project_root.join(SCRIPT_FILE);
        let Some(content) = read_carrier(&path)? else {
            return Ok(None);
        };
        SetupScript::parse(&content)
            .map(Some)
            .map_err(|message| ConfigError::ScriptSyntax { path, message })
    }

    fn read_manifest(&self) -> Result<Option<Manifest>, ConfigError> {
        let path = self.project_root.join(MANIFEST_FILE);
        let Some(content) = read_carrier(&path)? else {
            return Ok(None);
        };
        Manifest::parse(&content, &path).map(Some)
    }
}

/// Resolve the versioning configuration of `project_root`.
pub fn resolve(project_root: &Path) -> Result<ResolvedConfig, ConfigError> {
    ConfigResolver::new(project_root).resolve()
}

fn probe_script(script: &SetupScript) -> KeyProbe {
    let mut probe = KeyProbe::default();
    for style in [KeyStyle::Legacy, KeyStyle::Modern] {
        if let Some(value) = script.keyword(style.key()) {
            probe.set(style, style.key().to_string(), value);
        }
    }
    probe
}

/// Contents of a carrier, `None` when it does not exist.
fn read_carrier(path: &Path) -> Result<Option<String>, ConfigError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_file() {
        return Err(ConfigError::Structural {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn options_table(
    carrier: CarrierKind,
    key: &str,
    table: toml::Table,
) -> Result<OptionsTable, ConfigError> {
    for unknown in table.keys().filter(|k| !KNOWN_OPTIONS.contains(&k.as_str())) {
        warn!(%carrier, option = %unknown, "ignoring unknown versioning option");
    }
    toml::Value::Table(table)
        .try_into::<OptionsTable>()
        .map_err(|e| ConfigError::MalformedConfig {
            carrier,
            key: key.to_string(),
            reason: e.message().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    fn resolve_in(dir: &TempDir) -> Result<ResolvedConfig, ConfigError> {
        resolve(dir.path())
    }

    #[test]
    fn test_no_carriers_is_disabled() {
        let dir = project(&[]);
        assert_eq!(resolve_in(&dir).unwrap(), ResolvedConfig::default());
    }

    #[test]
    fn test_manifest_without_versioning_table() {
        let dir = project(&[(
            MANIFEST_FILE,
            "[build-system]\nrequires = [\"setuptools>=41\"]\n",
        )]);
        let config = resolve_in(&dir).unwrap();
        assert!(!config.enabled);
        assert!(config.source.is_none());
    }

    #[test]
    fn test_script_bool_true() {
        let dir = project(&[(SCRIPT_FILE, "setup(name='pkg', version_config=True)\n")]);
        let config = resolve_in(&dir).unwrap();
        assert!(config.enabled);
        assert_eq!(config.options, VersioningOptions::default());
        assert_eq!(
            config.source,
            Some(ConfigSource {
                carrier: CarrierKind::Script,
                key: "version_config".to_string(),
            })
        );
    }

    #[test]
    fn test_script_bool_false() {
        let dir = project(&[(SCRIPT_FILE, "setup(setuptools_git_versioning=False)\n")]);
        let config = resolve_in(&dir).unwrap();
        assert!(!config.enabled);
        assert!(config.source.is_some());
    }

    #[test]
    fn test_mapping_merges_over_defaults() {
        let dir = project(&[(
            MANIFEST_FILE,
            r#"
[tool.setuptools-git-versioning]
starting_version = "2.3.4"
dev_template = "{tag}.dev{ccount}"
"#,
        )]);
        let config = resolve_in(&dir).unwrap();
        assert!(config.enabled);
        assert_eq!(config.options.starting_version, "2.3.4");
        assert_eq!(config.options.dev_template, "{tag}.dev{ccount}");
        assert_eq!(config.options.template, "{tag}");
    }

    #[test]
    fn test_mapping_enabled_false() {
        let dir = project(&[(MANIFEST_FILE, "[tool.version_config]\nenabled = false\n")]);
        assert!(!resolve_in(&dir).unwrap().enabled);
    }

    #[test]
    fn test_both_keys_in_script_are_ambiguous() {
        let values = ["False", "True", "{'enabled': True}", "{'enabled': False}", "{}"];
        for legacy in values {
            for modern in values {
                let source = format!(
                    "setup(name='pkg', setuptools_git_versioning={modern}, version_config={legacy})\n"
                );
                let dir = project(&[(SCRIPT_FILE, &source)]);
                assert!(
                    matches!(
                        resolve_in(&dir),
                        Err(ConfigError::AmbiguousKeys {
                            carrier: CarrierKind::Script,
                            ..
                        })
                    ),
                    "{source}"
                );
            }
        }
    }

    #[test]
    fn test_both_keys_in_manifest_are_ambiguous() {
        let dir = project(&[(
            MANIFEST_FILE,
            "[tool.version_config]\n\n[tool.setuptools-git-versioning]\n",
        )]);
        match resolve_in(&dir) {
            Err(ConfigError::AmbiguousKeys {
                carrier: CarrierKind::Manifest,
                first,
                second,
            }) => {
                assert_eq!(first, "version_config");
                assert_eq!(second, "setuptools-git-versioning");
            }
            other => panic!("expected AmbiguousKeys, got {other:?}"),
        }
    }

    #[test]
    fn test_manifest_bool_is_malformed() {
        for value in ["true", "false"] {
            let dir = project(&[(
                MANIFEST_FILE,
                &format!("[tool]\nsetuptools-git-versioning = {value}\n"),
            )]);
            match resolve_in(&dir) {
                Err(ConfigError::MalformedConfig {
                    carrier: CarrierKind::Manifest,
                    reason,
                    ..
                }) => assert_eq!(reason, "expected a table, got boolean"),
                other => panic!("expected MalformedConfig for {value}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_manifest_bool_conflicts_with_script() {
        let dir = project(&[
            (SCRIPT_FILE, "setup(version_config=True)\n"),
            (MANIFEST_FILE, "[tool]\nversion_config = false\n"),
        ]);
        assert!(matches!(
            resolve_in(&dir),
            Err(ConfigError::AmbiguousCarriers)
        ));
    }

    #[test]
    fn test_both_carriers_are_ambiguous() {
        let dir = project(&[
            (SCRIPT_FILE, "setup(setuptools_git_versioning={'enabled': True})\n"),
            (
                MANIFEST_FILE,
                "[tool.setuptools-git-versioning]\nenabled = true\n",
            ),
        ]);
        assert!(matches!(
            resolve_in(&dir),
            Err(ConfigError::AmbiguousCarriers)
        ));
    }

    #[test]
    fn test_empty_carrier_does_not_conflict() {
        let dir = project(&[
            (SCRIPT_FILE, "setup(name='pkg', setuptools_git_versioning=None)\n"),
            (
                MANIFEST_FILE,
                "[tool.setuptools-git-versioning]\nstarting_version = \"2.3.4\"\n",
            ),
        ]);
        let config = resolve_in(&dir).unwrap();
        assert_eq!(config.source.unwrap().carrier, CarrierKind::Manifest);
    }

    #[test]
    fn test_carrier_directory_is_structural_error() {
        for name in [SCRIPT_FILE, MANIFEST_FILE] {
            let dir = project(&[]);
            fs::create_dir(dir.path().join(name)).unwrap();
            assert!(matches!(
                resolve_in(&dir),
                Err(ConfigError::Structural { .. })
            ));
        }
    }

    #[test]
    fn test_list_of_pairs_is_malformed() {
        let dir = project(&[(SCRIPT_FILE, "setup(version_config=[('A', 'B')])\n")]);
        assert!(matches!(
            resolve_in(&dir),
            Err(ConfigError::MalformedConfig { .. })
        ));

        let dir = project(&[(
            MANIFEST_FILE,
            "[tool]\nsetuptools-git-versioning = [[\"A\", \"B\"]]\n",
        )]);
        assert!(matches!(
            resolve_in(&dir),
            Err(ConfigError::MalformedConfig { .. })
        ));
    }

    #[test]
    fn test_option_of_wrong_type_is_malformed() {
        let dir = project(&[(
            MANIFEST_FILE,
            "[tool.setuptools-git-versioning]\nstarting_version = 5\n",
        )]);
        assert!(matches!(
            resolve_in(&dir),
            Err(ConfigError::MalformedConfig { .. })
        ));
    }

    #[test]
    fn test_unknown_options_are_ignored() {
        let dir = project(&[(
            SCRIPT_FILE,
            "setup(setuptools_git_versioning={'enabled': True, 'sort_by': 'creatordate'})\n",
        )]);
        assert!(resolve_in(&dir).unwrap().enabled);
    }

    #[test]
    fn test_starting_version_probe() {
        let dir = project(&[(MANIFEST_FILE, "starting_version = \"2.3.4\"\n")]);
        let resolver = ConfigResolver::new(dir.path());
        assert_eq!(
            resolver.starting_version_probe().unwrap().as_deref(),
            Some("2.3.4")
        );
        assert!(!resolver.resolve().unwrap().enabled);
    }

    #[test]
    fn test_package_name_fallback() {
        let dir = project(&[(SCRIPT_FILE, "setup(name='mypkg')\n")]);
        assert_eq!(
            ConfigResolver::new(dir.path())
                .package_name()
                .unwrap()
                .as_deref(),
            Some("mypkg")
        );
    }
}
