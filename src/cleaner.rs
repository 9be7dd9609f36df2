use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::utils;

/// One deleted (or would-be-deleted) filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRow {
    pub path: String,
    pub size_bytes: u64,
    /// Formatted modification time, or [`utils::UNKNOWN_TIME`].
    pub modified: String,
}

impl ProgressRow {
    /// Build a row from the current state of `path`. Must be called before
    /// the path is removed.
    pub fn describe(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            size_bytes: utils::shallow_size(path),
            modified: utils::format_mtime(path),
        }
    }
}

/// Receives progress rows as the sweep produces them.
pub trait RowSink: Send + Sync {
    fn emit(&self, row: ProgressRow);
}

impl<F> RowSink for F
where
    F: Fn(ProgressRow) + Send + Sync,
{
    fn emit(&self, row: ProgressRow) {
        self(row)
    }
}

/// Marker returned through every loop once cancellation has been requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Shared stop flag. Set from the caller, polled by the worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert_eq!(token.check(), Ok(()));
        other.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |row: ProgressRow| seen.lock().unwrap().push(row.path);
        sink.emit(ProgressRow {
            path: "/x".into(),
            size_bytes: 1,
            modified: "-".into(),
        });
        assert_eq!(*seen.lock().unwrap(), vec!["/x".to_string()]);
    }
}
