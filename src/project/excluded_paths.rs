//! Resolution of user-written exclusion rules into absolute paths
//!
//! Three shapes of rule are understood:
//! - absolute paths, kept as written
//! - `{N}/suffix`, expanded against the N-th (zero based) project root path
//! - anything else, lexically normalized

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

use crate::project::error::ProjectError;

/// Turns exclusion rules into the flat path list handed to the indexing engine
///
/// Stateless apart from the compiled placeholder pattern; cheap to clone and
/// safe to share between tasks.
#[derive(Debug, Clone)]
pub struct ExcludedPathResolver {
    // {0}/vendor
    placeholder_regex: Regex,
}

impl ExcludedPathResolver {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            placeholder_regex: Regex::new(r"^\{(\d+)\}(/.*)$")?,
        })
    }

    /// Resolve `rules` against `root_paths`, preserving order and duplicates
    pub fn resolve(
        &self,
        root_paths: &[PathBuf],
        rules: &[String],
    ) -> Result<Vec<PathBuf>, ProjectError> {
        rules
            .iter()
            .map(|rule| self.resolve_rule(root_paths, rule))
            .collect()
    }

    fn resolve_rule(&self, root_paths: &[PathBuf], rule: &str) -> Result<PathBuf, ProjectError> {
        if Path::new(rule).is_absolute() {
            return Ok(PathBuf::from(rule));
        }

        if let Some(captures) = self.placeholder_regex.captures(rule) {
            let index = &captures[1];
            let suffix = &captures[2];

            let root = index
                .parse::<usize>()
                .ok()
                .and_then(|index| root_paths.get(index))
                .ok_or_else(|| ProjectError::InvalidPathIndex {
                    rule: rule.to_string(),
                    index: index.to_string(),
                    root_count: root_paths.len(),
                })?;

            let mut resolved = root.as_os_str().to_owned();
            resolved.push(suffix);
            let resolved = PathBuf::from(resolved);
            trace!("Expanded exclusion rule {} to {}", rule, resolved.display());
            return Ok(resolved);
        }

        Ok(normalize(Path::new(rule)))
    }
}

impl Default for ExcludedPathResolver {
    fn default() -> Self {
        Self::new().expect("Failed to compile excluded path placeholder pattern")
    }
}

/// Lexically normalize `path`: drop `.` segments and fold `..` into the
/// preceding segment where one exists. The filesystem is never consulted.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(Component::ParentDir),
            },
            other => normalized.push(other),
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}
