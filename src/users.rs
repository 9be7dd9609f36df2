use std::path::{Path, PathBuf};

/// A local account and its home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHome {
    pub name: String,
    pub home: PathBuf,
}

/// Name of the person driving the tool, looking through sudo.
pub fn invoking_user() -> String {
    std::env::var("SUDO_USER")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_default()
}

/// `root` (when `/root` exists) plus every directory under `/home`, with the
/// invoking user sorted first.
pub fn list_users() -> Vec<UserHome> {
    list_users_in(Path::new("/root"), Path::new("/home"), &invoking_user())
}

pub fn list_users_in(root_home: &Path, home_base: &Path, current: &str) -> Vec<UserHome> {
    let mut users = Vec::new();
    if root_home.is_dir() {
        users.push(UserHome {
            name: "root".to_string(),
            home: root_home.to_path_buf(),
        });
    }

    if let Ok(read_dir) = std::fs::read_dir(home_base) {
        for entry in read_dir.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                users.push(UserHome {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    home: entry.path(),
                });
            }
        }
    }

    users.sort_by(|a, b| (a.name != current, &a.name).cmp(&(b.name != current, &b.name)));
    users
}

/// Account name owning a home directory, for homes picked without a name.
pub fn name_for_home(home: &Path) -> String {
    if home == Path::new("/root") {
        return "root".to_string();
    }
    home.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
