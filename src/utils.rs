use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use walkdir::WalkDir;

/// Placeholder shown when a modification time cannot be read.
pub const UNKNOWN_TIME: &str = "-";

/// Home directory of the invoking user (not the cleanup target).
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// True when the effective uid is 0.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Sum of every regular file under `path`. Symlinks are not followed and
/// contribute nothing; unreadable entries are skipped.
pub fn tree_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Size of a file, or the shallow total of the regular files directly
/// inside a directory. Links and missing paths report 0.
pub fn shallow_size(path: &Path) -> u64 {
    let Ok(meta) = path.symlink_metadata() else {
        return 0;
    };
    if meta.is_file() {
        return meta.len();
    }
    if !meta.is_dir() {
        return 0;
    }
    match std::fs::read_dir(path) {
        Ok(read_dir) => read_dir
            .flatten()
            .filter_map(|entry| entry.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum(),
        Err(_) => 0,
    }
}

/// Modification time as `YYYY-MM-DD HH:MM:SS` local time, or [`UNKNOWN_TIME`].
pub fn format_mtime(path: &Path) -> String {
    path.symlink_metadata()
        .and_then(|m| m.modified())
        .map(format_time)
        .unwrap_or_else(|_| UNKNOWN_TIME.to_string())
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Parse a journalctl-style size ("100M", "2G", "512K", "4096") into bytes.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (num_str, multiplier) = match s.char_indices().last() {
        Some((idx, 'K' | 'k')) => (&s[..idx], 1_024u64),
        Some((idx, 'M' | 'm')) => (&s[..idx], 1_048_576),
        Some((idx, 'G' | 'g')) => (&s[..idx], 1_073_741_824),
        Some((idx, 'T' | 't')) => (&s[..idx], 1_099_511_627_776),
        Some(_) => (s, 1),
        None => return Err("Size is empty".to_string()),
    };

    // journalctl only takes plain digits, so no fractions or signs here
    if num_str.is_empty() || !num_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("Invalid number: '{num_str}'"));
    }
    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| format!("Size too large: '{s}'"))
}

/// Format byte count as human-readable string, always with two decimals.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Shorten a path for display by replacing the invoking user's home with ~.
pub fn display_path(path: &Path) -> String {
    match home_dir() {
        Some(home) => match path.strip_prefix(&home) {
            Ok(relative) => format!("~/{}", relative.display()),
            Err(_) => path.display().to_string(),
        },
        None => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn format_size_scales_through_units() {
        assert_eq!(format_size(0), "0.00 Bytes");
        assert_eq!(format_size(1023), "1023.00 Bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1_048_576), "5.00 MB");
        assert_eq!(format_size(3 * 1_073_741_824), "3.00 GB");
    }

    #[test]
    fn parse_size_accepts_journal_suffixes() {
        assert_eq!(parse_size("100M"), Ok(104_857_600));
        assert_eq!(parse_size("2g"), Ok(2_147_483_648));
        assert_eq!(parse_size("512K"), Ok(524_288));
        assert_eq!(parse_size("4096"), Ok(4096));
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("M").is_err());
        assert!(parse_size("1.5G").is_err());
        assert!(parse_size("-1M").is_err());
        assert!(parse_size("100M; rm -rf /").is_err());
    }

    #[test]
    fn tree_size_sums_nested_files_and_skips_links() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/one"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("a/b/two"), vec![0u8; 32]).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a/b/two"), dir.path().join("link")).unwrap();

        assert_eq!(tree_size(dir.path()), 42);
    }

    #[test]
    fn shallow_size_ignores_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("top"), vec![0u8; 7]).unwrap();
        fs::write(dir.path().join("sub/deep"), vec![0u8; 100]).unwrap();

        assert_eq!(shallow_size(dir.path()), 7);
        assert_eq!(shallow_size(&dir.path().join("top")), 7);
        assert_eq!(shallow_size(&dir.path().join("missing")), 0);
    }

    #[test]
    fn format_mtime_uses_sentinel_for_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(format_mtime(&dir.path().join("nope")), UNKNOWN_TIME);

        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        let stamp = format_mtime(&file);
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
    }
}
