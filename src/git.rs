//! Git repository state used to render versions.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use anyhow::{
    Context,
    Result,
};
use bstr::{
    BString,
    ByteSlice,
};
use regex::Regex;
use tracing::{
    debug,
    warn,
};

use crate::version::parse_version;

/// Number of sha characters used for `{sha}`.
pub const SHORT_SHA_LEN: usize = 8;

/// What the version templates need to know about a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitState {
    /// Latest tag reachable from HEAD, as named in the repository.
    pub tag: Option<String>,
    /// Commits between the tag and HEAD (all commits when there is no tag).
    pub ccount: usize,
    /// HEAD commit sha, `None` in a repository without commits.
    pub full_sha: Option<String>,
    /// Short name of the checked out branch, `None` on a detached HEAD.
    pub branch: Option<String>,
    /// Tracked files have uncommitted changes.
    pub dirty: bool,
}

impl GitState {
    /// Inspect the repository containing `path`.
    ///
    /// A directory outside any repository, or a repository without commits,
    /// yields a state without tag and sha rather than an error.
    pub fn read(path: &Path, tag_filter: Option<&Regex>) -> Result<Self> {
        let repo = match gix::discover(path) {
            Ok(repo) => repo,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "not a git repository");
                return Ok(Self::default());
            }
        };

        let head = repo.head().context("Failed to read HEAD")?;
        let branch = head
            .referent_name()
            .map(|name| name.shorten().to_str_lossy().into_owned());
        let Some(head_id) = head.id() else {
            debug!("HEAD does not point to a commit yet");
            return Ok(Self {
                branch,
                ..Self::default()
            });
        };

        let tags = commit_tags(&repo, tag_filter)?;
        let mut tag = None;
        let mut ccount = 0;
        for info in repo
            .rev_walk([head_id])
            .all()
            .context("Failed to walk history")?
        {
            let info = info.context("Failed to read commit while walking history")?;
            if let Some(names) = tags.get(&info.id().detach()) {
                tag = latest_tag(names);
                break;
            }
            ccount += 1;
        }

        let state = Self {
            tag,
            ccount,
            full_sha: Some(head_id.to_string()),
            branch,
            dirty: is_dirty(path),
        };
        debug!(?state, "read git state");
        Ok(state)
    }

    /// First [`SHORT_SHA_LEN`] characters of the HEAD sha.
    pub fn short_sha(&self) -> Option<&str> {
        self.full_sha
            .as_deref()
            .map(|sha| sha.get(..SHORT_SHA_LEN).unwrap_or(sha))
    }
}

/// Tag names by the commit they point to, peeling annotated tags.
fn commit_tags(
    repo: &gix::Repository,
    tag_filter: Option<&Regex>,
) -> Result<HashMap<gix::ObjectId, Vec<String>>> {
    let mut tags: HashMap<gix::ObjectId, Vec<String>> = HashMap::new();
    let refs = repo
        .references()
        .context("Failed to read git references")?;
    for reference in refs.all()? {
        let Ok(reference) = reference else {
            continue;
        };
        let full_name = reference.name().as_bstr().to_string();
        let Some(name) = full_name.strip_prefix("refs/tags/") else {
            continue;
        };
        if let Some(filter) = tag_filter
            && !filter.is_match(name)
        {
            debug!(tag = name, "tag rejected by tag_filter");
            continue;
        }

        let spec: BString = format!("{full_name}^{{commit}}").into();
        let Some(commit_id) = repo
            .rev_parse(spec.as_bstr())
            .ok()
            .and_then(|spec| spec.single())
        else {
            debug!(tag = name, "tag does not point to a commit");
            continue;
        };
        tags.entry(commit_id.detach())
            .or_default()
            .push(name.to_string());
    }
    Ok(tags)
}

/// Among tags on the same commit, the highest version wins, then the
/// greatest name.
fn latest_tag(names: &[String]) -> Option<String> {
    names
        .iter()
        .map(|name| {
            let version = name
                .strip_prefix('v')
                .or_else(|| name.strip_prefix('V'))
                .unwrap_or(name);
            (parse_version(version).ok(), name)
        })
        .max()
        .map(|(_, name)| name.clone())
}

/// Uses the git CLI; a failure to run it counts as a clean tree.
fn is_dirty(path: &Path) -> bool {
    let output = Command::new("git")
        .args(["status", "--porcelain", "--untracked-files=no"])
        .current_dir(path)
        .output();
    match output {
        Ok(output) if output.status.success() => !output.stdout.trim().is_empty(),
        Ok(output) => {
            warn!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git status failed, assuming a clean tree"
            );
            false
        }
        Err(e) => {
            warn!(error = %e, "could not run git, assuming a clean tree");
            false
        }
    }
}
