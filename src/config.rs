//! Persisted settings: a flat `key=value` text file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::options::{flag, parse_flag, RunOptions, SpecEnablement};

/// Prefix for per-spec enablement keys in the settings file.
pub const ENABLEMENT_PREFIX: &str = "options.";

/// Everything the settings file holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub options: RunOptions,
    /// Read by an external scheduler; the engine only stores them.
    pub run_at_boot: bool,
    pub run_at_shutdown: bool,
    pub enablement: SpecEnablement,
}

pub trait ConfigProvider {
    /// Never fails: unreadable or missing settings yield defaults.
    fn load(&self) -> Settings;

    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings file on disk, by default `~/.config/homesweep/config`.
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::at(dir.join("homesweep").join("config")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfig {
    fn load(&self) -> Settings {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => parse_settings(&text),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no settings file, using defaults");
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.path, render_settings(settings)).map_err(|source| Error::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Parse settings text. Blank lines, `#` comments and lines without `=` are
/// skipped; an unparsable option value falls back to its default.
pub fn parse_settings(text: &str) -> Settings {
    let mut values = BTreeMap::new();
    let mut settings = Settings::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        if let Some(spec_key) = key.strip_prefix(ENABLEMENT_PREFIX) {
            settings.enablement.set(spec_key, parse_flag(value));
            continue;
        }
        match key {
            "run_at_boot" => settings.run_at_boot = parse_flag(value),
            "run_at_shutdown" => settings.run_at_shutdown = parse_flag(value),
            _ => {
                let single = BTreeMap::from([(key.to_string(), value.to_string())]);
                match RunOptions::from_map(&single) {
                    Ok(_) => {
                        values.insert(key.to_string(), value.to_string());
                    }
                    Err(e) => warn!("ignoring setting: {e}"),
                }
            }
        }
    }

    // every entry was validated on its own above
    settings.options = RunOptions::from_map(&values).unwrap_or_default();
    settings
}

pub fn render_settings(settings: &Settings) -> String {
    let mut lines: Vec<String> = settings
        .options
        .to_map()
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    lines.push(format!("run_at_boot={}", flag(settings.run_at_boot)));
    lines.push(format!("run_at_shutdown={}", flag(settings.run_at_shutdown)));

    let mut keys: Vec<(&str, bool)> = settings.enablement.iter().collect();
    keys.sort();
    for (key, enabled) in keys {
        lines.push(format!("{ENABLEMENT_PREFIX}{key}={}", flag(enabled)));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
