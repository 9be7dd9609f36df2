//! Turns catalogue entries into concrete paths that exist right now.
//!
//! Resolution never fails: a directory that cannot be listed simply
//! contributes no targets. Symbolic links are never followed; a link that
//! matches is itself the target.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::catalog::{PathSpec, CACHE_PREFIX};

/// What to do with a resolved path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Unlink one file or link.
    Single,
    /// Remove a directory and everything under it.
    Tree,
    /// Remove a directory's children, keep the directory.
    Wipe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub action: Action,
}

impl Target {
    fn new(path: PathBuf, action: Action) -> Self {
        Self { path, action }
    }
}

pub struct Resolver {
    /// Home of the invoking user, used for `~` expansion. Deliberately not
    /// the target's home.
    invoking_home: Option<PathBuf>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::with_home(crate::utils::home_dir())
    }

    pub fn with_home(invoking_home: Option<PathBuf>) -> Self {
        Self { invoking_home }
    }

    /// Expand `spec` against `base` (a home directory for user specs; ignored
    /// by absolute paths and glob pairs).
    pub fn resolve(&self, spec: PathSpec<'_>, base: &Path) -> Vec<Target> {
        match spec {
            PathSpec::Plain(rel) => {
                let tree = rel.starts_with(CACHE_PREFIX);
                self.single_path(base, rel, tree).into_iter().collect()
            }
            PathSpec::Deep(rel) => self.single_path(base, rel, true).into_iter().collect(),
            PathSpec::Pattern(pattern) => self.pattern(base, pattern),
            PathSpec::GlobPair { base, pattern } => glob_pair(Path::new(base), pattern),
        }
    }

    /// A system directory: wiped when it is a real directory, otherwise left alone.
    pub fn system_dir(&self, dir: &str) -> Option<Target> {
        let path = PathBuf::from(dir);
        is_real_dir(&path).then(|| Target::new(path, Action::Wipe))
    }

    fn expand(&self, base: &Path, rel: &str) -> Option<PathBuf> {
        match rel.strip_prefix('~') {
            Some(rest) => {
                let home = self.invoking_home.as_ref()?;
                Some(home.join(rest.trim_start_matches('/')))
            }
            None => Some(base.join(rel)),
        }
    }

    fn single_path(&self, base: &Path, rel: &str, tree: bool) -> Option<Target> {
        let path = self.expand(base, rel)?;
        let meta = path.symlink_metadata().ok()?;
        let action = if !meta.is_dir() {
            Action::Single
        } else if tree {
            Action::Tree
        } else {
            Action::Wipe
        };
        Some(Target::new(path, action))
    }

    fn pattern(&self, base: &Path, pattern: &str) -> Vec<Target> {
        let (base, pattern) = match pattern.strip_prefix('~') {
            Some(rest) => match &self.invoking_home {
                Some(home) => (home.as_path(), rest.trim_start_matches('/')),
                None => return Vec::new(),
            },
            None => (base, pattern),
        };
        // an empty remainder would name the home directory itself
        if pattern.is_empty() {
            return Vec::new();
        }

        if let Some((pre, post)) = pattern.split_once("/*/") {
            nested_wildcard(&base.join(pre), post)
        } else if let Some((prefix, suffix)) = pattern.split_once('*') {
            let (dir_part, name_prefix) = prefix.rsplit_once('/').unwrap_or(("", prefix));
            name_wildcard(&base.join(dir_part), name_prefix, suffix)
        } else {
            let path = base.join(pattern);
            match path.symlink_metadata() {
                Ok(meta) if meta.is_dir() => vec![Target::new(path, Action::Wipe)],
                Ok(_) => vec![Target::new(path, Action::Single)],
                Err(_) => Vec::new(),
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().map(|m| m.is_dir()).unwrap_or(false)
}

/// Entries of `dir` sorted by name; an unreadable directory is empty.
fn sorted_entries(dir: &Path) -> Vec<fs::DirEntry> {
    match fs::read_dir(dir) {
        Ok(read_dir) => {
            let mut entries: Vec<fs::DirEntry> = read_dir.flatten().collect();
            entries.sort_by_key(|e| e.file_name());
            entries
        }
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot list directory");
            Vec::new()
        }
    }
}

/// `pre/*/post`: `post` inside each immediate subdirectory of `pre`.
fn nested_wildcard(parent: &Path, post: &str) -> Vec<Target> {
    let mut targets = Vec::new();
    for entry in sorted_entries(parent) {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let candidate = entry.path().join(post);
        match candidate.symlink_metadata() {
            Ok(meta) if meta.is_dir() => targets.push(Target::new(candidate, Action::Wipe)),
            Ok(_) => targets.push(Target::new(candidate, Action::Single)),
            Err(_) => {}
        }
    }
    targets
}

/// `prefix*suffix` within a single directory.
fn name_wildcard(dir: &Path, prefix: &str, suffix: &str) -> Vec<Target> {
    sorted_entries(dir)
        .into_iter()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        })
        .map(|entry| Target::new(entry.path(), Action::Single))
        .collect()
}

/// Regular files anywhere under `base` whose name matches `pattern`.
fn glob_pair(base: &Path, pattern: &str) -> Vec<Target> {
    let matcher = match glob::Pattern::new(pattern) {
        Ok(m) => m,
        Err(e) => {
            debug!(pattern, error = %e, "invalid glob");
            return Vec::new();
        }
    };
    if !is_real_dir(base) {
        return Vec::new();
    }

    WalkDir::new(base)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| matcher.matches(&e.file_name().to_string_lossy()))
        .map(|e| Target::new(e.into_path(), Action::Single))
        .collect()
}
