//! Running external commands, optionally as another user.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::users;
use crate::utils;

/// Status reported when a command could not be started or was killed.
pub const FAILURE: i32 = 1;

pub trait Shell: Send + Sync {
    /// Run `cmd` with `sh -c` and return its exit status. A dry run does
    /// nothing and reports success.
    fn run(&self, cmd: &str, dry_run: bool) -> i32;

    /// Run `cmd` and return its status with stdout and stderr combined.
    fn capture(&self, cmd: &str) -> (i32, String);

    /// Run `cmd` as `username` with `HOME` and `XDG_DATA_HOME` pointing into
    /// `home`.
    fn run_as(&self, username: &str, home: &Path, cmd: &str, dry_run: bool) -> i32;
}

/// Single-quote `s` for a POSIX shell.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn env_prefix(home: &Path) -> String {
    let data_home = home.join(".local/share");
    format!(
        "HOME={} XDG_DATA_HOME={} ",
        quote(&home.to_string_lossy()),
        quote(&data_home.to_string_lossy())
    )
}

/// Runs commands on the host.
pub struct SystemShell;

impl SystemShell {
    /// Drain stdout line by line so chatty tools never block on a full pipe.
    fn stream(mut command: Command) -> i32 {
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                debug!(?command, error = %e, "spawn failed");
                return FAILURE;
            }
        };

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                debug!(target: "homesweep::shell::output", "{line}");
            }
        }

        match child.wait() {
            Ok(status) => status.code().unwrap_or(FAILURE),
            Err(e) => {
                debug!(error = %e, "wait failed");
                FAILURE
            }
        }
    }

    fn sh(cmd: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(format!("exec 2>&1; {cmd}"));
        command
    }
}

impl Shell for SystemShell {
    fn run(&self, cmd: &str, dry_run: bool) -> i32 {
        if dry_run {
            return 0;
        }
        debug!(cmd, "running");
        let status = Self::stream(Self::sh(cmd));
        debug!(cmd, status, "finished");
        status
    }

    fn capture(&self, cmd: &str) -> (i32, String) {
        match Self::sh(cmd).stdin(Stdio::null()).output() {
            Ok(output) => (
                output.status.code().unwrap_or(FAILURE),
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ),
            Err(e) => (FAILURE, e.to_string()),
        }
    }

    fn run_as(&self, username: &str, home: &Path, cmd: &str, dry_run: bool) -> i32 {
        if dry_run {
            return 0;
        }
        let full = format!("{}{cmd}", env_prefix(home));
        if !utils::is_root() || users::invoking_user() == username {
            return self.run(&full, false);
        }

        let script = format!("exec 2>&1; {full}");
        let wrapped = script.as_str();
        let attempts: [(&str, Vec<&str>); 3] = [
            ("runuser", vec!["-u", username, "--", "sh", "-lc", wrapped]),
            ("sudo", vec!["-u", username, "sh", "-lc", wrapped]),
            ("su", vec!["-s", "/bin/sh", "-c", wrapped, username]),
        ];
        for (program, args) in attempts {
            let mut command = Command::new(program);
            command.args(&args);
            if Self::stream(command) == 0 {
                return 0;
            }
            debug!(program, username, "impersonation attempt failed");
        }
        FAILURE
    }
}

#[cfg(test)]
pub use recording::RecordingShell;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_survives_embedded_quotes() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        let (status, out) = SystemShell.capture(&format!("printf %s {}", quote("a b'c")));
        assert_eq!(status, 0);
        assert_eq!(out, "a b'c");
    }

    #[test]
    fn run_reports_exit_status() {
        assert_eq!(SystemShell.run("true", false), 0);
        assert_eq!(SystemShell.run("exit 3", false), 3);
        assert_eq!(SystemShell.run("exit 3", true), 0);
    }

    #[test]
    fn capture_merges_stderr() {
        let (status, out) = SystemShell.capture("echo out; echo err >&2; exit 2");
        assert_eq!(status, 2);
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[test]
    fn dry_run_as_user_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let cmd = format!("touch {}", quote(&marker.to_string_lossy()));
        assert_eq!(SystemShell.run_as("nobody", dir.path(), &cmd, true), 0);
        assert!(!marker.exists());
    }

    #[test]
    fn run_as_seeds_home_environment() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("env");
        let cmd = format!(
            "printf '%s\\n%s' \"$HOME\" \"$XDG_DATA_HOME\" > {}",
            quote(&out.to_string_lossy())
        );
        let me = users::invoking_user();
        // as the invoking user this always takes the direct path
        if utils::is_root() && me != "root" {
            return;
        }
        assert_eq!(SystemShell.run_as(&me, dir.path(), &cmd, false), 0);
        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(dir.path().to_str().unwrap()));
        assert_eq!(
            lines.next(),
            Some(dir.path().join(".local/share").to_str().unwrap())
        );
    }

    #[test]
    fn recording_shell_scripts_captures() {
        let shell = RecordingShell::new().with_output("uname -r", 0, "6.8.0-45-generic\n");
        assert_eq!(shell.capture("uname -r"), (0, "6.8.0-45-generic\n".into()));
        assert_eq!(shell.capture("other").0, FAILURE);
        shell.run("apt-get -y clean", true);
        shell.run("apt-get -y autoclean", false);
        assert_eq!(
            shell.commands(),
            vec!["capture: uname -r", "capture: other", "apt-get -y autoclean"]
        );
    }
}
