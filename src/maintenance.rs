//! Machine maintenance delegated to the system's own tools: journal
//! retention, apt, flatpak, snap revisions and old kernels.
//!
//! Each step is independent. A failing tool is logged and the next step runs.

use tracing::{debug, info, warn};

use crate::catalog::{
    MAINTENANCE_APT, MAINTENANCE_FLATPAK, MAINTENANCE_JOURNAL, MAINTENANCE_KERNELS,
    MAINTENANCE_SNAP_DISABLED, MAINTENANCE_SNAP_RETAIN,
};
use crate::cleaner::{CancelToken, Cancelled};
use crate::options::{RunOptions, SpecEnablement};
use crate::shell::{quote, Shell};

pub const APT_COMMANDS: &[&str] = &[
    "apt-get -y autoremove --purge",
    "apt-get -y autoclean",
    "apt-get -y clean",
];
pub const FLATPAK_UNUSED: &str = "flatpak uninstall --unused -y";
pub const SNAP_LIST_ALL: &str = "snap list --all";
pub const UNAME: &str = "uname -r";
pub const DPKG_LIST: &str = "dpkg -l";
pub const UPDATE_GRUB: &str = "update-grub";

pub fn journal_commands(opts: &RunOptions) -> [String; 2] {
    [
        format!("journalctl --vacuum-time={}d", opts.vacuum_days),
        format!("journalctl --vacuum-size={}", opts.vacuum_size),
    ]
}

pub fn snap_retain_command(keep: u32) -> String {
    format!("snap set system refresh.retain={keep}")
}

fn is_package_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '_'))
}

/// `(name, revision)` of every disabled revision in `snap list --all` output.
pub fn parse_disabled_snaps(listing: &str) -> Vec<(String, String)> {
    listing
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 || cols[0] == "Name" {
                return None;
            }
            let notes = cols[cols.len() - 1];
            if !notes.split(',').any(|n| n == "disabled") {
                return None;
            }
            let (name, rev) = (cols[0], cols[2]);
            (is_package_name(name) && rev.chars().all(|c| c.is_ascii_digit()))
                .then(|| (name.to_string(), rev.to_string()))
        })
        .collect()
}

/// Kernel release without its flavour suffix: `6.8.0-45-generic` becomes
/// `6.8.0-45`.
pub fn running_kernel(uname: &str) -> String {
    let release = uname.trim();
    match release.rsplit_once('-') {
        Some((base, flavour))
            if flavour
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic()) =>
        {
            base.to_string()
        }
        _ => release.to_string(),
    }
}

/// Installed `linux-image-<version>` packages other than the running kernel.
/// An unknown running kernel yields nothing, so the active one is never purged.
pub fn old_kernel_packages(dpkg_listing: &str, running: &str) -> Vec<String> {
    if running.is_empty() {
        return Vec::new();
    }
    dpkg_listing
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            if cols.next() != Some("ii") {
                return None;
            }
            let pkg = cols.next()?;
            let version = pkg.strip_prefix("linux-image-")?;
            if !version.starts_with(|c: char| c.is_ascii_digit()) || pkg.contains(running) {
                return None;
            }
            is_package_name(pkg).then(|| pkg.to_string())
        })
        .collect()
}

pub fn purge_command(pkg: &str) -> String {
    format!("apt-get remove --purge -y {}", quote(pkg))
}

pub fn snap_remove_command(name: &str, rev: &str) -> String {
    format!(
        "snap remove --revision={} {} --purge",
        quote(rev),
        quote(name)
    )
}

/// Runs the maintenance steps in order, each behind its enablement key.
pub struct Maintenance<'a> {
    pub shell: &'a dyn Shell,
    pub opts: &'a RunOptions,
    pub enablement: &'a SpecEnablement,
    pub cancel: &'a CancelToken,
}

impl Maintenance<'_> {
    fn step(&self, key: &str) -> Result<bool, Cancelled> {
        self.cancel.check()?;
        Ok(self.enablement.is_enabled(key))
    }

    fn run_cmd(&self, cmd: &str) {
        let status = self.shell.run(cmd, self.opts.dry_run);
        if status != 0 {
            warn!(cmd, status, "maintenance command failed");
        }
    }

    pub fn run(&self) -> Result<(), Cancelled> {
        if self.step(MAINTENANCE_JOURNAL)? {
            for cmd in journal_commands(self.opts) {
                self.run_cmd(&cmd);
            }
        }
        if self.step(MAINTENANCE_SNAP_RETAIN)? {
            self.run_cmd(&snap_retain_command(self.opts.keep_snaps));
        }
        if self.step(MAINTENANCE_APT)? {
            for cmd in APT_COMMANDS {
                self.run_cmd(cmd);
            }
        }
        if self.step(MAINTENANCE_FLATPAK)? {
            self.run_cmd(FLATPAK_UNUSED);
        }
        if self.step(MAINTENANCE_SNAP_DISABLED)? && !self.opts.dry_run {
            self.remove_disabled_snaps()?;
        }
        if self.opts.clear_kernels && self.step(MAINTENANCE_KERNELS)? {
            self.purge_old_kernels()?;
        }
        Ok(())
    }

    fn remove_disabled_snaps(&self) -> Result<(), Cancelled> {
        let (status, listing) = self.shell.capture(SNAP_LIST_ALL);
        if status != 0 {
            debug!(status, "snap list unavailable");
            return Ok(());
        }
        for (name, rev) in parse_disabled_snaps(&listing) {
            self.cancel.check()?;
            info!(snap = %name, revision = %rev, "removing disabled snap revision");
            self.run_cmd(&snap_remove_command(&name, &rev));
        }
        Ok(())
    }

    fn purge_old_kernels(&self) -> Result<(), Cancelled> {
        let (status, uname) = self.shell.capture(UNAME);
        let running = if status == 0 {
            running_kernel(&uname)
        } else {
            String::new()
        };
        let (status, listing) = self.shell.capture(DPKG_LIST);
        if status != 0 {
            debug!(status, "dpkg listing unavailable");
            return Ok(());
        }
        for pkg in old_kernel_packages(&listing, &running) {
            self.cancel.check()?;
            info!(package = %pkg, running = %running, "purging old kernel");
            self.run_cmd(&purge_command(&pkg));
        }
        self.run_cmd(UPDATE_GRUB);
        Ok(())
    }
}
