use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils;

pub const DEFAULT_VACUUM_DAYS: u32 = 7;
pub const DEFAULT_VACUUM_SIZE: &str = "100M";
pub const DEFAULT_KEEP_SNAPS: u32 = 2;

/// Settings for one sweep. Fixed for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub clear_browsers: bool,
    pub clear_kernels: bool,
    /// Journal retention by age, in days.
    pub vacuum_days: u32,
    /// Journal retention ceiling in journalctl syntax ("100M").
    pub vacuum_size: String,
    /// Snap revisions to retain per package.
    pub keep_snaps: u32,
    pub shutdown_after: bool,
    pub username: String,
    pub user_home: String,
    pub aggressive: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            clear_browsers: false,
            clear_kernels: false,
            vacuum_days: DEFAULT_VACUUM_DAYS,
            vacuum_size: DEFAULT_VACUUM_SIZE.to_string(),
            keep_snaps: DEFAULT_KEEP_SNAPS,
            shutdown_after: false,
            username: String::new(),
            user_home: String::new(),
            aggressive: false,
        }
    }
}

impl RunOptions {
    /// Read the worker-mode configuration file. Any parse failure is fatal.
    pub fn read_worker_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let opts: Self = serde_json::from_str(&text)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reject values that would be interpolated into maintenance commands.
    pub fn validate(&self) -> Result<()> {
        utils::parse_size(&self.vacuum_size).map_err(|reason| Error::InvalidValue {
            key: "vacuum_size".to_string(),
            value: self.vacuum_size.clone(),
            reason,
        })?;
        Ok(())
    }

    /// Flatten into the string-keyed form used by the settings file.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("dry_run".into(), flag(self.dry_run));
        map.insert("clear_browsers".into(), flag(self.clear_browsers));
        map.insert("clear_kernels".into(), flag(self.clear_kernels));
        map.insert("vacuum_days".into(), self.vacuum_days.to_string());
        map.insert("vacuum_size".into(), self.vacuum_size.clone());
        map.insert("keep_snaps".into(), self.keep_snaps.to_string());
        map.insert("shutdown_after".into(), flag(self.shutdown_after));
        map.insert("username".into(), self.username.clone());
        map.insert("user_home".into(), self.user_home.clone());
        map.insert("aggressive".into(), flag(self.aggressive));
        map
    }

    /// Rebuild from a flat map. Missing keys keep their defaults; present but
    /// unparsable values are an error.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let mut opts = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "dry_run" => opts.dry_run = parse_flag(value),
                "clear_browsers" => opts.clear_browsers = parse_flag(value),
                "clear_kernels" => opts.clear_kernels = parse_flag(value),
                "vacuum_days" => opts.vacuum_days = parse_number(key, value)?,
                "vacuum_size" => opts.vacuum_size = value.clone(),
                "keep_snaps" => opts.keep_snaps = parse_number(key, value)?,
                "shutdown_after" => opts.shutdown_after = parse_flag(value),
                "username" => opts.username = value.clone(),
                "user_home" => opts.user_home = value.clone(),
                "aggressive" => opts.aggressive = parse_flag(value),
                _ => {}
            }
        }
        opts.validate()?;
        Ok(opts)
    }
}

/// Per-spec toggles keyed by the catalogue's stable keys. A missing key
/// means enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecEnablement(HashMap<String, bool>);

impl SpecEnablement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(true)
    }

    pub fn set(&mut self, key: impl Into<String>, enabled: bool) {
        self.0.insert(key.into(), enabled);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, bool)> for SpecEnablement {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub fn flag(value: bool) -> String {
    let text = if value { "1" } else { "0" };
    text.to_string()
}

/// `1`, `true` and `yes` (any case) are true; everything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_number(key: &str, value: &str) -> Result<u32> {
    value.trim().parse().map_err(|_| Error::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}
