//! Reader for `pyproject.toml`.

use std::path::Path;

use super::{
    CarrierKind,
    ConfigError,
    KeyProbe,
    KeyStyle,
    RawValue,
};

/// A parsed `pyproject.toml`.
#[derive(Debug)]
pub(crate) struct Manifest {
    document: toml::Table,
}

impl Manifest {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let document =
            toml::from_str::<toml::Table>(content).map_err(|source| ConfigError::ManifestSyntax {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { document })
    }

    /// Probe `[tool]` for both key names.
    ///
    /// Each key may be spelled with underscores or hyphens; both spellings of
    /// the same key count as setting it twice.
    pub fn probe(&self) -> Result<KeyProbe, ConfigError> {
        let Some(tool) = self.document.get("tool").and_then(toml::Value::as_table) else {
            return Ok(KeyProbe::default());
        };

        let mut probe = KeyProbe::default();
        for style in [KeyStyle::Legacy, KeyStyle::Modern] {
            let underscored = style.key();
            let hyphenated = underscored.replace('_', "-");
            let slot = match (tool.get(underscored), tool.get(&hyphenated)) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::AmbiguousKeys {
                        carrier: CarrierKind::Manifest,
                        first: underscored.to_string(),
                        second: hyphenated,
                    });
                }
                (Some(value), None) => Some((underscored.to_string(), value)),
                (None, Some(value)) => Some((hyphenated, value)),
                (None, None) => None,
            };
            if let Some((key, value)) = slot {
                probe.set(style, key, RawValue::Literal(value.clone()));
            }
        }
        Ok(probe)
    }

    /// Top-level `starting_version`, read independently of `[tool]`.
    pub fn starting_version(&self) -> Option<String> {
        self.document
            .get("starting_version")
            .and_then(toml::Value::as_str)
            .map(str::to_string)
    }

    /// `[project].name`.
    pub fn project_name(&self) -> Option<String> {
        self.document
            .get("project")
            .and_then(|project| project.get("name"))
            .and_then(toml::Value::as_str)
            .map(str::to_string)
    }
}
