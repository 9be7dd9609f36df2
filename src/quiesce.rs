//! Best-effort shutdown of a user's programs before their files are swept.

use std::collections::HashSet;
use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System, UpdateKind, Users};
use tracing::{debug, info};

/// Desktop plumbing that must keep running.
pub const SAFELIST: &[&str] = &[
    "dbus-daemon",
    "gnome-shell",
    "kwin_wayland",
    "kwin_x11",
    "loginctl",
    "pipewire",
    "pipewire-media-session",
    "plasmashell",
    "pulseaudio",
    "systemd",
    "wireplumber",
    "Xorg",
    "Xwayland",
];

pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Pids from `procs` that should be signalled.
pub fn select_targets(
    procs: &[(u32, String)],
    exclude: &HashSet<u32>,
    own_pid: u32,
    parent_pid: u32,
) -> Vec<u32> {
    procs
        .iter()
        .filter(|(pid, _)| *pid != own_pid && *pid != parent_pid && !exclude.contains(pid))
        .filter(|(_, name)| {
            let base = name.rsplit('/').next().unwrap_or(name);
            !SAFELIST.contains(&base)
        })
        .map(|(pid, _)| *pid)
        .collect()
}

/// SIGTERM every process of `username` except `exclude`, the safelist and
/// ourselves; after `grace`, SIGKILL whatever is left. Failures are ignored.
pub fn close_programs(username: &str, exclude: &HashSet<u32>, grace: Duration) {
    if username.is_empty() {
        return;
    }
    let users = Users::new_with_refreshed_list();
    let Some(uid) = users
        .iter()
        .find(|u| u.name() == username)
        .map(|u| u.id().clone())
    else {
        debug!(username, "unknown user, nothing to close");
        return;
    };

    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_user(UpdateKind::Always),
    );
    let owned: Vec<(u32, String)> = sys
        .processes()
        .iter()
        .filter(|(_, p)| p.user_id() == Some(&uid))
        .map(|(pid, p)| (pid.as_u32(), p.name().to_string_lossy().into_owned()))
        .collect();

    let targets = select_targets(
        &owned,
        exclude,
        std::process::id(),
        std::os::unix::process::parent_id(),
    );
    if targets.is_empty() {
        return;
    }
    info!(username, count = targets.len(), "closing user programs");

    let pids: Vec<Pid> = targets.iter().map(|p| Pid::from_u32(*p)).collect();
    for pid in &pids {
        if let Some(process) = sys.process(*pid) {
            if process.kill_with(Signal::Term) != Some(true) {
                debug!(pid = pid.as_u32(), "SIGTERM not delivered");
            }
        }
    }

    std::thread::sleep(grace);

    sys.refresh_processes(ProcessesToUpdate::Some(&pids), true);
    for pid in &pids {
        if let Some(process) = sys.process(*pid) {
            debug!(pid = pid.as_u32(), "still alive after grace period, killing");
            process.kill_with(Signal::Kill);
        }
    }
}
