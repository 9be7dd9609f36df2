//! Running a sweep in a privileged worker process and relaying its output.

use std::ffi::OsString;
use std::fs;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::catalog;
use crate::cleaner::{CancelToken, RowSink};
use crate::error::{Error, Result};
use crate::options::RunOptions;
use crate::protocol;
use crate::utils;

pub const DEFAULT_HELPER: &str = "pkexec";

/// Subcommand the worker is re-invoked with.
pub const WORKER_ARG: &str = "worker";

/// True when the run targets root but we are not root ourselves.
pub fn needs_elevation(opts: &RunOptions) -> bool {
    opts.username == "root" && !utils::is_root()
}

/// First candidate directory that no machine-wide target covers.
pub fn scratch_dir(candidates: &[Option<PathBuf>], swept: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .flatten()
        .find(|dir| !swept.iter().any(|s| dir.starts_with(s)))
        .cloned()
}

/// The worker wipes `/tmp`, so the options file goes to the runtime or cache
/// directory instead.
fn default_scratch_dir() -> PathBuf {
    let swept: Vec<&str> = catalog::SYSTEM_DIRS
        .iter()
        .chain(catalog::ROOT_ITEMS)
        .copied()
        .collect();
    let candidates = [
        dirs::runtime_dir(),
        dirs::cache_dir().map(|dir| dir.join("homesweep")),
    ];
    scratch_dir(&candidates, &swept).unwrap_or_else(std::env::temp_dir)
}

pub struct ElevationBridge {
    helper: OsString,
    program: PathBuf,
    scratch: PathBuf,
}

impl ElevationBridge {
    /// `pkexec` re-running the current executable.
    pub fn new() -> Result<Self> {
        Ok(Self::with_command(DEFAULT_HELPER, std::env::current_exe()?))
    }

    pub fn with_command(helper: impl Into<OsString>, program: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
            program: program.into(),
            scratch: default_scratch_dir(),
        }
    }

    /// Write the options file under `dir`.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch = dir.into();
        self
    }

    /// Hand `opts` to a worker and relay its rows into `sink`. Returns the
    /// worker's reported total, or 0 if it never sent one. The options file
    /// is removed however the worker ends.
    pub fn run(&self, opts: &RunOptions, sink: &dyn RowSink, cancel: &CancelToken) -> Result<u64> {
        fs::create_dir_all(&self.scratch)?;
        let mut file = tempfile::Builder::new()
            .prefix("homesweep-")
            .suffix(".json")
            .tempfile_in(&self.scratch)?;
        file.write_all(opts.to_json()?.as_bytes())?;
        file.flush()?;

        let helper = self.helper.to_string_lossy().into_owned();
        info!(%helper, "starting privileged worker");
        let mut child = Command::new(&self.helper)
            .arg(&self.program)
            .arg(WORKER_ARG)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| Error::Spawn { helper, source })?;

        let reported = match child.stdout.take() {
            Some(stdout) => protocol::relay(BufReader::new(stdout), sink, || {
                !cancel.is_cancelled()
            })
            .unwrap_or_else(|e| {
                debug!(error = %e, "worker output unreadable");
                None
            }),
            None => None,
        };

        match child.wait() {
            Ok(status) if !status.success() => warn!(%status, "worker exited unsuccessfully"),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "waiting for worker failed"),
        }
        if let Err(e) = file.close() {
            debug!(error = %e, "could not remove worker options file");
        }

        // rows include directories whose files have their own rows, so
        // summing them would overcount
        Ok(reported.unwrap_or_else(|| {
            warn!("worker sent no total");
            0
        }))
    }
}
