use std::path::Path;
use std::sync::Mutex;

use homesweep::shell::Shell;

/// Records commands instead of running them. `run_as` entries look like
/// `"user: cmd"`; captures always fail.
#[derive(Default)]
pub struct RecordingShell {
    commands: Mutex<Vec<String>>,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.commands.lock().unwrap().push(entry);
    }
}

impl Shell for RecordingShell {
    fn run(&self, cmd: &str, dry_run: bool) -> i32 {
        if !dry_run {
            self.record(cmd.to_string());
        }
        0
    }

    fn capture(&self, cmd: &str) -> (i32, String) {
        self.record(format!("capture: {cmd}"));
        (homesweep::shell::FAILURE, String::new())
    }

    fn run_as(&self, username: &str, _home: &Path, cmd: &str, dry_run: bool) -> i32 {
        if !dry_run {
            self.record(format!("{username}: {cmd}"));
        }
        0
    }
}
