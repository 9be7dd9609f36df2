//! The fixed lists of things a sweep may remove.
//!
//! Every entry has a stable string key shared with [`SpecEnablement`]: the
//! entry text itself, or `"<base>::<pattern>"` for system glob pairs.
//!
//! [`SpecEnablement`]: crate::options::SpecEnablement

use std::borrow::Cow;

/// Relative keys under this prefix are always removed as whole trees.
pub const CACHE_PREFIX: &str = ".cache/";

/// Home-relative files and directories. Directories are wiped in place unless
/// they live under [`CACHE_PREFIX`].
pub const USER_PATHS: &[&str] = &[
    ".cache/babl",
    ".cache/discord",
    ".cache/easytag",
    ".cache/fontconfig",
    ".cache/gimp",
    ".cache/JetBrains",
    ".cache/keepassxc",
    ".cache/mesa_shader_cache",
    ".cache/Microsoft",
    ".cache/npm",
    ".cache/obexd",
    ".cache/pip",
    ".cache/pnpm",
    ".cache/shotwell",
    ".cache/shutter",
    ".cache/sublime-text",
    ".cache/thumbnails",
    ".cache/thunderbird",
    ".cache/totem",
    ".cache/tracker3",
    ".cache/ubuntu-report",
    ".cache/vscode",
    ".cache/yarn",
    ".config/Code/Cache",
    ".config/Code/CachedData",
    ".config/Code/logs",
    ".config/discord/Cache",
    ".config/discord/Code Cache",
    ".profile.bak",
    ".shell.pre-oh-my-zsh",
    ".shutter",
    ".thumbnails",
    ".wget-hsts",
    ".zcompdump",
    ".zshrc.bak",
];

/// Destructive targets, swept only in aggressive mode and always as trees.
pub const USER_DEEP: &[&str] = &["snap", ".ssh"];

/// Shell and desktop history files.
pub const USER_HISTORY: &[&str] = &[
    ".bash_history",
    ".cache/recently-used.xbel",
    ".local/share/RecentDocuments",
    ".local/share/recently-used.xbel",
    ".zsh_history",
];

/// Wildcard and home-shortcut patterns.
pub const USER_PATTERNS: &[&str] = &[
    ".mozilla/firefox/*/cache2",
    ".mozilla/firefox/*/startupCache",
    ".zcompdump-*",
    "~/.var/app/*/cache",
];

/// Browser profile data, swept only when browser clearing is requested.
pub const BROWSER_PATTERNS: &[&str] = &[
    ".cache/chromium",
    ".cache/google-chrome",
    ".config/BraveSoftware/Brave-Browser/Default/Cache",
    ".config/BraveSoftware/Brave-Browser/Default/Code Cache",
    ".config/chromium/Default/Cache",
    ".config/chromium/Default/Code Cache",
    ".config/google-chrome",
];

/// Items in root's home, handled in the machine-wide phase.
pub const ROOT_ITEMS: &[&str] = &[
    "/root/.cache",
    "/root/.config",
    "/root/.history",
    "/root/.launchpadlib",
    "/root/.wget-hsts",
];

/// Directories whose contents are wiped machine-wide.
pub const SYSTEM_DIRS: &[&str] = &[
    "/tmp",
    "/var/cache/fontconfig",
    "/var/cache/man",
    "/var/lib/snapd/cache",
    "/var/lib/systemd/coredump",
    "/var/tmp",
];

/// (base directory, filename glob) pairs matched recursively.
pub const SYSTEM_GLOBS: &[(&str, &str)] = &[
    ("/var/crash", "*.crash"),
    ("/var/log", "*.gz"),
    ("/var/log", "*.[0-9]"),
];

pub const MAINTENANCE_JOURNAL: &str = "maintenance::journal";
pub const MAINTENANCE_SNAP_RETAIN: &str = "maintenance::snap-retain";
pub const MAINTENANCE_APT: &str = "maintenance::apt";
pub const MAINTENANCE_FLATPAK: &str = "maintenance::flatpak";
pub const MAINTENANCE_SNAP_DISABLED: &str = "maintenance::snap-disabled";
pub const MAINTENANCE_KERNELS: &str = "maintenance::kernels";

/// Machine maintenance steps, in the order they run.
pub const MAINTENANCE_STEPS: &[&str] = &[
    MAINTENANCE_JOURNAL,
    MAINTENANCE_SNAP_RETAIN,
    MAINTENANCE_APT,
    MAINTENANCE_FLATPAK,
    MAINTENANCE_SNAP_DISABLED,
    MAINTENANCE_KERNELS,
];

/// How one catalogue entry is turned into concrete paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSpec<'a> {
    /// Home-relative path, at most one target.
    Plain(&'a str),
    /// Like `Plain`, but directories are always removed as trees.
    Deep(&'a str),
    /// Contains `*`, a `/*/` segment, or a leading `~`.
    Pattern(&'a str),
    /// Files matching `pattern` anywhere under `base`.
    GlobPair { base: &'a str, pattern: &'a str },
}

impl PathSpec<'_> {
    /// Key used in the enablement map.
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            PathSpec::Plain(s) | PathSpec::Deep(s) | PathSpec::Pattern(s) => Cow::Borrowed(*s),
            PathSpec::GlobPair { base, pattern } => Cow::Owned(glob_key(base, pattern)),
        }
    }
}

pub fn glob_key(base: &str, pattern: &str) -> String {
    format!("{base}::{pattern}")
}

/// The lists a sweep works through. [`Catalog::builtin`] is the real one;
/// tests build their own.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub user_paths: Vec<String>,
    pub user_history: Vec<String>,
    pub user_patterns: Vec<String>,
    pub browser_patterns: Vec<String>,
    pub user_deep: Vec<String>,
    pub system_dirs: Vec<String>,
    pub system_globs: Vec<(String, String)>,
    pub root_items: Vec<String>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            user_paths: owned(USER_PATHS),
            user_history: owned(USER_HISTORY),
            user_patterns: owned(USER_PATTERNS),
            browser_patterns: owned(BROWSER_PATTERNS),
            user_deep: owned(USER_DEEP),
            system_dirs: owned(SYSTEM_DIRS),
            system_globs: SYSTEM_GLOBS
                .iter()
                .map(|(b, p)| (b.to_string(), p.to_string()))
                .collect(),
            root_items: owned(ROOT_ITEMS),
        }
    }

    pub fn is_deep(&self, rel: &str) -> bool {
        self.user_deep.iter().any(|d| d == rel)
    }

    /// Every enablement key, grouped by section, in sweep order.
    pub fn sections(&self) -> Vec<(&'static str, Vec<String>)> {
        vec![
            ("User: Paths", self.user_paths.clone()),
            ("User: History", self.user_history.clone()),
            ("User: Patterns", self.user_patterns.clone()),
            ("User: Browser data", self.browser_patterns.clone()),
            ("User: Aggressive (DANGEROUS)", self.user_deep.clone()),
            ("System: Directories", self.system_dirs.clone()),
            (
                "System: Globs",
                self.system_globs.iter().map(|(b, p)| glob_key(b, p)).collect(),
            ),
            ("System: Maintenance", owned(MAINTENANCE_STEPS)),
            ("Root: Items", self.root_items.clone()),
        ]
    }

    pub fn all_keys(&self) -> Vec<String> {
        self.sections().into_iter().flat_map(|(_, keys)| keys).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        let keys = Catalog::builtin().all_keys();
        let unique: HashSet<&String> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());
    }

    #[test]
    fn glob_pairs_use_double_colon_keys() {
        let spec = PathSpec::GlobPair {
            base: "/var/log",
            pattern: "*.gz",
        };
        assert_eq!(spec.key(), "/var/log::*.gz");
        assert!(Catalog::builtin()
            .all_keys()
            .contains(&"/var/crash::*.crash".to_string()));
    }

    #[test]
    fn deep_membership() {
        let catalog = Catalog::builtin();
        assert!(catalog.is_deep(".ssh"));
        assert!(!catalog.is_deep(".cache/pip"));
    }
}
