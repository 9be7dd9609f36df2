//! Deleting resolved targets and accounting for the bytes they held.
//!
//! Every operation emits a row per affected entry *before* touching it and
//! behaves identically under dry-run except for the mutation itself, so a
//! preview reports exactly what a live run would. Missing paths and
//! permission problems contribute 0 instead of failing.
//!
//! A [`Visited`] set shared across one run keeps overlapping targets from
//! being counted twice. A live run never sees a path it already removed, so
//! the dry-run has to skip it explicitly.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;
use walkdir::WalkDir;

use crate::cleaner::{CancelToken, ProgressRow, RowSink};
use crate::resolver::{Action, Target};
use crate::shell::{self, Shell};

/// Paths already handled during one run. A path counts as handled when it or
/// any of its ancestors was recorded.
#[derive(Debug, Default)]
pub struct Visited(Mutex<HashSet<PathBuf>>);

impl Visited {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn covers(&self, path: &Path) -> bool {
        match self.0.lock() {
            Ok(seen) => path.ancestors().any(|p| seen.contains(p)),
            Err(_) => false,
        }
    }

    pub fn insert(&self, path: &Path) {
        if let Ok(mut seen) = self.0.lock() {
            seen.insert(path.to_path_buf());
        }
    }
}

pub struct Remover<'a> {
    dry_run: bool,
    sink: &'a dyn RowSink,
    shell: &'a dyn Shell,
    cancel: Option<&'a CancelToken>,
    visited: Option<&'a Visited>,
}

impl<'a> Remover<'a> {
    pub fn new(dry_run: bool, sink: &'a dyn RowSink, shell: &'a dyn Shell) -> Self {
        Self {
            dry_run,
            sink,
            shell,
            cancel: None,
            visited: None,
        }
    }

    /// Stop wiping further children once `token` is set.
    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Skip anything an earlier target of the same run already covered.
    pub fn with_visited(mut self, visited: &'a Visited) -> Self {
        self.visited = Some(visited);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|t| t.is_cancelled())
    }

    fn seen(&self, path: &Path) -> bool {
        let covered = self.visited.is_some_and(|v| v.covers(path));
        if covered {
            debug!(path = %path.display(), "already handled in this run");
        }
        covered
    }

    fn mark(&self, path: &Path) {
        if let Some(visited) = self.visited {
            visited.insert(path);
        }
    }

    pub fn apply(&self, target: &Target) -> u64 {
        match target.action {
            Action::Single => self.delete_single(&target.path),
            Action::Tree => self.delete_tree(&target.path),
            Action::Wipe => self.wipe_dir(&target.path),
        }
    }

    /// Unlink a file or link and return its size (0 for links). A directory
    /// found here is removed recursively but counted as 0.
    pub fn delete_single(&self, path: &Path) -> u64 {
        if self.seen(path) {
            return 0;
        }
        let Ok(meta) = path.symlink_metadata() else {
            return 0;
        };
        self.mark(path);
        self.sink.emit(ProgressRow::describe(path));
        let size = if meta.is_file() { meta.len() } else { 0 };
        if self.dry_run {
            return size;
        }

        if meta.is_dir() {
            if let Err(e) = fs::remove_dir_all(path) {
                debug!(path = %path.display(), error = %e, "recursive removal failed");
            }
            return 0;
        }

        match fs::remove_file(path) {
            Ok(()) => size,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => self.force_remove(path, size),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unlink failed");
                0
            }
        }
    }

    fn force_remove(&self, path: &Path, size: u64) -> u64 {
        let cmd = format!("rm -f -- {}", shell::quote(&path.to_string_lossy()));
        let status = self.shell.run(&cmd, false);
        if status == 0 && path.symlink_metadata().is_err() {
            size
        } else {
            debug!(path = %path.display(), status, "forced removal failed");
            0
        }
    }

    /// Remove a directory and everything below it. Returns the sum of all
    /// regular files it held; the directories themselves count for nothing.
    pub fn delete_tree(&self, path: &Path) -> u64 {
        if self.seen(path) {
            return 0;
        }
        let Ok(meta) = path.symlink_metadata() else {
            return 0;
        };
        if !meta.is_dir() {
            return self.delete_single(path);
        }

        let entries: Vec<walkdir::DirEntry> = WalkDir::new(path)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.visited.is_some_and(|v| v.covers(e.path())))
            .filter_map(|e| e.ok())
            .collect();
        self.mark(path);
        let total: u64 = entries
            .iter()
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();

        self.sink.emit(ProgressRow::describe(path));
        for entry in &entries {
            self.sink.emit(ProgressRow::describe(entry.path()));
        }
        if self.dry_run {
            return total;
        }

        if let Err(e) = fs::remove_dir_all(path) {
            debug!(path = %path.display(), error = %e, "tree removal incomplete");
        }
        total
    }

    /// Remove everything inside `path` but keep `path` itself.
    pub fn wipe_dir(&self, path: &Path) -> u64 {
        if self.seen(path) {
            return 0;
        }
        let is_dir = path.symlink_metadata().map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            return 0;
        }
        let mut children: Vec<fs::DirEntry> = match fs::read_dir(path) {
            Ok(read_dir) => read_dir.flatten().collect(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot list directory");
                return 0;
            }
        };
        children.sort_by_key(|e| e.file_name());

        let mut total = 0u64;
        for child in children {
            if self.cancelled() {
                break;
            }
            let child_is_dir = child.file_type().map(|t| t.is_dir()).unwrap_or(false);
            total += if child_is_dir {
                self.delete_tree(&child.path())
            } else {
                self.delete_single(&child.path())
            };
        }
        total
    }
}
