//! Version parsing and rendering.

use std::path::Path;

use anyhow::{
    Context,
    Result,
};
use regex::Regex;
use tracing::{
    debug,
    info,
};

use crate::config::{
    ConfigResolver,
    ResolvedConfig,
    VersioningOptions,
};
use crate::git::GitState;

/// Version reported when versioning is not enabled.
pub const DISABLED_VERSION: &str = "0.0.0";

/// Value of `{env:NAME}` when the variable is unset and no default is given.
const ENV_FALLBACK: &str = "UNKNOWN";

/// Parse a semantic version string (e.g., "0.1.2" or "v0.1.2").
pub fn parse_version(version_str: &str) -> Result<(u32, u32, u32)> {
    // Strip optional v/V prefix
    let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
    let version_str = version_str.strip_prefix('V').unwrap_or(version_str);

    let parts: Vec<&str> = version_str.split('.').collect();
    if parts.len() < 3 {
        anyhow::bail!(
            "Version must have at least 3 parts (major.minor.patch), got: {}",
            version_str
        );
    }

    let major = parts[0]
        .parse::<u32>()
        .with_context(|| format!("Invalid major version: {}", parts[0]))?;
    let minor = parts[1]
        .parse::<u32>()
        .with_context(|| format!("Invalid minor version: {}", parts[1]))?;
    let patch = parts[2]
        .split('-')
        .next()
        .unwrap_or(parts[2])
        .parse::<u32>()
        .with_context(|| format!("Invalid patch version: {}", parts[2]))?;

    Ok((major, minor, patch))
}

/// Compute the version of the project at `project_root`.
///
/// This is the single entry point shared by the module API, the CLI and
/// the build backend, so all three agree on the result or fail together.
///
/// # Errors
///
/// Returns an error if:
/// - the configuration is ambiguous or malformed (see
///   [`crate::config::ConfigError`])
/// - a regex option or a template is invalid
/// - the git repository exists but cannot be read
///
/// # Examples
///
/// ```no_run
/// let version = git_versioning::get_version(".")?;
/// println!("{version}");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_version(project_root: impl AsRef<Path>) -> Result<String> {
    let project_root = project_root.as_ref();
    let config = ConfigResolver::new(project_root).resolve()?;
    let version = compute_version(project_root, &config)?;
    info!(root = %project_root.display(), %version, "computed version");
    Ok(version)
}

/// Render the version for an already resolved configuration.
pub fn compute_version(project_root: &Path, config: &ResolvedConfig) -> Result<String> {
    if !config.enabled {
        if config.source.is_none()
            && let Some(version) = ConfigResolver::new(project_root).starting_version_probe()?
        {
            debug!(%version, "using top-level starting_version of pyproject.toml");
            return Ok(version);
        }
        return Ok(DISABLED_VERSION.to_string());
    }

    let options = &config.options;
    let tag_filter = options
        .tag_filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid tag_filter regex")?;
    let state = GitState::read(project_root, tag_filter.as_ref())?;
    render_version(project_root, options, &state)
}

/// Pick and render the template matching the repository state.
pub fn render_version(
    project_root: &Path,
    options: &VersioningOptions,
    state: &GitState,
) -> Result<String> {
    let Some(tag) = &state.tag else {
        if let Some(version) = read_version_file(project_root, options)? {
            return Ok(version);
        }
        return Ok(options.starting_version.clone());
    };

    let tag = format_tag(tag, options.tag_formatter.as_deref())?;
    let branch = match (&state.branch, options.branch_formatter.as_deref()) {
        (Some(branch), Some(pattern)) => Some(extract(pattern, "branch", branch)?),
        (branch, _) => branch.clone(),
    };

    let template = if state.dirty {
        &options.dirty_template
    } else if state.ccount > 0 {
        &options.dev_template
    } else {
        &options.template
    };

    render_template(
        template,
        &TemplateContext {
            tag: &tag,
            ccount: state.ccount,
            sha: state.short_sha().unwrap_or_default(),
            full_sha: state.full_sha.as_deref().unwrap_or_default(),
            branch: branch.as_deref().unwrap_or_default(),
        },
    )
}

/// Values available to `{...}` placeholders.
#[derive(Debug)]
pub struct TemplateContext<'a> {
    pub tag: &'a str,
    pub ccount: usize,
    pub sha: &'a str,
    pub full_sha: &'a str,
    pub branch: &'a str,
}

/// Substitute `{tag}`, `{ccount}`, `{sha}`, `{full_sha}`, `{branch}`,
/// `{env:NAME}` and `{env:NAME:default}` in `template`.
#[allow(clippy::disallowed_methods)] // templates read the process environment
pub fn render_template(template: &str, context: &TemplateContext<'_>) -> Result<String> {
    let placeholder = Regex::new(r"\{([^{}]*)\}").context("Failed to build placeholder regex")?;

    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for caps in placeholder.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        rendered.push_str(&template[last..whole.start()]);
        last = whole.end();

        let value = match name.as_str() {
            "tag" => context.tag.to_string(),
            "ccount" => context.ccount.to_string(),
            "sha" => context.sha.to_string(),
            "full_sha" => context.full_sha.to_string(),
            "branch" => context.branch.to_string(),
            other => match other.strip_prefix("env:") {
                Some(env) => {
                    let (var, default) = match env.split_once(':') {
                        Some((var, default)) => (var, default),
                        None => (env, ENV_FALLBACK),
                    };
                    std::env::var(var).unwrap_or_else(|_| default.to_string())
                }
                None => anyhow::bail!(
                    "Unknown placeholder {{{}}} in template {:?}",
                    other,
                    template
                ),
            },
        };
        rendered.push_str(&value);
    }
    rendered.push_str(&template[last..]);

    Ok(rendered)
}

/// Apply `tag_formatter` and strip an optional v/V prefix.
fn format_tag(tag: &str, formatter: Option<&str>) -> Result<String> {
    let tag = match formatter {
        Some(pattern) => extract(pattern, "tag", tag)?,
        None => tag.to_string(),
    };
    Ok(tag
        .strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(&tag)
        .to_string())
}

/// Match `pattern` against `input`, returning the `group` named capture or
/// the whole match.
fn extract(pattern: &str, group: &str, input: &str) -> Result<String> {
    let re = Regex::new(pattern).with_context(|| format!("Invalid {group}_formatter regex"))?;
    let caps = re
        .captures(input)
        .with_context(|| format!("{group}_formatter {pattern:?} does not match {input:?}"))?;
    let found = caps
        .name(group)
        .or_else(|| caps.get(0))
        .with_context(|| format!("{group}_formatter {pattern:?} captured nothing"))?;
    Ok(found.as_str().to_string())
}

fn read_version_file(project_root: &Path, options: &VersioningOptions) -> Result<Option<String>> {
    let Some(file) = &options.version_file else {
        return Ok(None);
    };
    let path = project_root.join(file);
    if !path.is_file() {
        debug!(path = %path.display(), "version_file does not exist");
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let version = content.trim();
    Ok((!version.is_empty()).then(|| version.to_string()))
}
