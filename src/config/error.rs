//! Errors raised while resolving the versioning configuration.

use std::path::PathBuf;

use super::CarrierKind;

/// A configuration that cannot be resolved.
///
/// None of these are recovered from: the module function, the CLI and the
/// build backend all surface them as a hard failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A carrier path exists but is not a regular file.
    #[error("{} exists but is not a regular file", .path.display())]
    Structural { path: PathBuf },

    /// Two keys configuring versioning are set in one carrier: the legacy
    /// and the modern name, or two spellings of the same name.
    #[error("both `{first}` and `{second}` are set in {carrier}; keep only one of them")]
    AmbiguousKeys {
        carrier: CarrierKind,
        first: String,
        second: String,
    },

    /// Both `setup.py` and `pyproject.toml` configure versioning.
    #[error(
        "versioning is configured in both setup.py and pyproject.toml; \
         keep only one of them"
    )]
    AmbiguousCarriers,

    /// The configuration value has a shape or option type that is not
    /// supported.
    #[error("wrong config format in {carrier} `{key}`: {reason}")]
    MalformedConfig {
        carrier: CarrierKind,
        key: String,
        reason: String,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    ManifestSyntax {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    ScriptSyntax { path: PathBuf, message: String },
}
