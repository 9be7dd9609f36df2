//! Sequencing of a full sweep: per-user cleanup, then machine-wide cleanup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{Catalog, PathSpec};
use crate::cleaner::{CancelToken, Cancelled, ProgressRow, RowSink};
use crate::maintenance::Maintenance;
use crate::options::{RunOptions, SpecEnablement};
use crate::remover::{Remover, Visited};
use crate::resolver::{Resolver, Target};
use crate::shell::{Shell, SystemShell};
use crate::users::{self, UserHome};
use crate::utils;

/// Trash contents relative to a home directory.
pub const TRASH_FILES: &str = ".local/share/Trash/files";

pub const SHUTDOWN: &str = "shutdown now";

/// One configured sweep. Build it, grab [`cancel_token`](Self::cancel_token)
/// and [`total_counter`](Self::total_counter) if another thread needs them,
/// then call [`run`](Self::run).
pub struct Cleaner {
    opts: RunOptions,
    enablement: SpecEnablement,
    sink: Arc<dyn RowSink>,
    shell: Arc<dyn Shell>,
    catalog: Catalog,
    resolver: Resolver,
    privileged: bool,
    homes: Option<Vec<UserHome>>,
    cancel: CancelToken,
    total: Arc<AtomicU64>,
    visited: Visited,
}

impl Cleaner {
    pub fn new(opts: RunOptions, enablement: SpecEnablement, sink: Arc<dyn RowSink>) -> Self {
        Self {
            opts,
            enablement,
            sink,
            shell: Arc::new(SystemShell),
            catalog: Catalog::builtin(),
            resolver: Resolver::new(),
            privileged: utils::is_root(),
            homes: None,
            cancel: CancelToken::new(),
            total: Arc::new(AtomicU64::new(0)),
            visited: Visited::new(),
        }
    }

    pub fn with_shell(mut self, shell: Arc<dyn Shell>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Override the euid check that gates the machine-wide phase.
    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Sweep exactly these homes instead of working them out from the options.
    pub fn with_homes(mut self, homes: Vec<UserHome>) -> Self {
        self.homes = Some(homes);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Running byte total, readable while the sweep is in progress.
    pub fn total_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.total)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Run both phases and return the bytes reclaimed (or that would be, in
    /// dry-run). Cancellation ends the run early with whatever was counted.
    pub fn run(&self) -> u64 {
        info!(
            dry_run = self.opts.dry_run,
            privileged = self.privileged,
            "sweep starting"
        );
        match self.sweep() {
            Ok(()) => {
                info!(total = self.total(), "sweep finished");
                if self.opts.shutdown_after && !self.opts.dry_run {
                    info!("shutting down as requested");
                    self.shell.run(SHUTDOWN, false);
                }
            }
            Err(Cancelled) => info!(total = self.total(), "sweep cancelled"),
        }
        self.total()
    }

    fn sweep(&self) -> Result<(), Cancelled> {
        self.cancel.check()?;
        for user in self.homes() {
            self.cancel.check()?;
            self.clean_user(&user)?;
        }
        self.cancel.check()?;
        self.clean_system()
    }

    fn homes(&self) -> Vec<UserHome> {
        if let Some(homes) = &self.homes {
            return homes.clone();
        }
        if !self.opts.user_home.is_empty() {
            let home = PathBuf::from(&self.opts.user_home);
            let name = if self.opts.username.is_empty() {
                users::name_for_home(&home)
            } else {
                self.opts.username.clone()
            };
            return vec![UserHome { name, home }];
        }
        if self.privileged {
            let mut seen = Vec::new();
            let mut homes = Vec::new();
            for user in users::list_users() {
                if !seen.contains(&user.home) {
                    seen.push(user.home.clone());
                    homes.push(user);
                }
            }
            return homes;
        }
        match utils::home_dir() {
            Some(home) => vec![UserHome {
                name: users::invoking_user(),
                home,
            }],
            None => Vec::new(),
        }
    }

    fn remover(&self) -> Remover<'_> {
        Remover::new(self.opts.dry_run, &*self.sink, &*self.shell)
            .with_cancel(&self.cancel)
            .with_visited(&self.visited)
    }

    fn add(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    fn apply_all(&self, targets: Vec<Target>) -> Result<(), Cancelled> {
        let remover = self.remover();
        for target in targets {
            self.cancel.check()?;
            self.add(remover.apply(&target));
        }
        Ok(())
    }

    fn sweep_spec(&self, spec: PathSpec<'_>, base: &Path) -> Result<(), Cancelled> {
        self.cancel.check()?;
        if !self.enablement.is_enabled(&spec.key()) {
            debug!(key = %spec.key(), "disabled");
            return Ok(());
        }
        self.apply_all(self.resolver.resolve(spec, base))
    }

    fn clean_user(&self, user: &UserHome) -> Result<(), Cancelled> {
        info!(user = %user.name, home = %user.home.display(), "cleaning home");
        let home = user.home.as_path();
        self.empty_trash(user)?;

        for rel in &self.catalog.user_paths {
            let spec = if self.catalog.is_deep(rel) {
                PathSpec::Deep(rel)
            } else {
                PathSpec::Plain(rel)
            };
            self.sweep_spec(spec, home)?;
        }
        for rel in &self.catalog.user_history {
            self.sweep_spec(PathSpec::Plain(rel), home)?;
        }
        for pattern in &self.catalog.user_patterns {
            self.sweep_spec(PathSpec::Pattern(pattern), home)?;
        }
        if self.opts.clear_browsers {
            for pattern in &self.catalog.browser_patterns {
                self.sweep_spec(PathSpec::Pattern(pattern), home)?;
            }
        }
        if self.opts.aggressive {
            for rel in &self.catalog.user_deep {
                self.sweep_spec(PathSpec::Deep(rel), home)?;
            }
        }
        Ok(())
    }

    /// List what is in the trash, count it, then let `trash-empty` do the
    /// removal as the owning user.
    fn empty_trash(&self, user: &UserHome) -> Result<(), Cancelled> {
        let trash = user.home.join(TRASH_FILES);
        if let Ok(read_dir) = std::fs::read_dir(&trash) {
            let mut items: Vec<PathBuf> = read_dir.flatten().map(|e| e.path()).collect();
            items.sort();
            for item in items {
                self.cancel.check()?;
                if self.visited.covers(&item) {
                    continue;
                }
                self.visited.insert(&item);
                let size = utils::tree_size(&item);
                self.sink.emit(ProgressRow {
                    path: item.display().to_string(),
                    size_bytes: size,
                    modified: utils::format_mtime(&item),
                });
                self.add(size);
            }
        }
        self.cancel.check()?;
        let status = self
            .shell
            .run_as(&user.name, &user.home, "trash-empty", self.opts.dry_run);
        if status != 0 {
            debug!(user = %user.name, status, "trash-empty failed");
        }
        Ok(())
    }

    fn clean_system(&self) -> Result<(), Cancelled> {
        if !self.privileged {
            debug!("not privileged, skipping machine-wide cleanup");
            return Ok(());
        }
        info!("cleaning system locations");

        for dir in &self.catalog.system_dirs {
            self.cancel.check()?;
            if !self.enablement.is_enabled(dir) {
                continue;
            }
            if let Some(target) = self.resolver.system_dir(dir) {
                self.apply_all(vec![target])?;
            }
        }
        for (base, pattern) in &self.catalog.system_globs {
            self.sweep_spec(PathSpec::GlobPair { base, pattern }, Path::new("/"))?;
        }

        Maintenance {
            shell: &*self.shell,
            opts: &self.opts,
            enablement: &self.enablement,
            cancel: &self.cancel,
        }
        .run()?;

        for item in &self.catalog.root_items {
            self.sweep_spec(PathSpec::Plain(item), Path::new("/"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::RecordingShell;
    use std::fs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Rows(Mutex<Vec<ProgressRow>>);

    impl RowSink for Rows {
        fn emit(&self, row: ProgressRow) {
            self.0.lock().unwrap().push(row);
        }
    }

    fn write(path: &Path, len: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; len]).unwrap();
    }

    fn user(home: &Path) -> UserHome {
        UserHome {
            name: "tester".into(),
            home: home.to_path_buf(),
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            user_paths: vec![".cache/app".into(), ".config/app/logs".into(), "snap".into()],
            user_history: vec![".bash_history".into()],
            user_patterns: vec![".zcompdump-*".into()],
            browser_patterns: vec![".config/browser/Cache".into()],
            user_deep: vec!["snap".into()],
            ..Catalog::default()
        }
    }

    fn build(opts: RunOptions, home: &Path, shell: Arc<RecordingShell>) -> (Cleaner, Arc<Rows>) {
        let rows = Arc::new(Rows::default());
        let cleaner = Cleaner::new(opts, SpecEnablement::new(), rows.clone())
            .with_shell(shell)
            .with_catalog(catalog())
            .with_resolver(Resolver::with_home(None))
            .with_privileged(false)
            .with_homes(vec![user(home)]);
        (cleaner, rows)
    }

    #[test]
    fn user_phase_counts_every_kind_of_target() {
        let home = tempfile::tempdir().unwrap();
        let h = home.path();
        write(&h.join(".cache/app/blob"), 100);
        write(&h.join(".config/app/logs/today.log"), 10);
        write(&h.join(".bash_history"), 5);
        write(&h.join(".zcompdump-host"), 1);
        write(&h.join("snap/pkg/data"), 1000);
        write(&h.join(".local/share/Trash/files/old.iso"), 50);

        let shell = Arc::new(RecordingShell::new());
        let (cleaner, _) = build(RunOptions::default(), h, shell.clone());
        assert_eq!(cleaner.run(), 50 + 100 + 10 + 1000 + 5 + 1);

        assert!(!h.join(".cache/app").exists());
        assert!(h.join(".config/app/logs").is_dir());
        assert!(!h.join(".config/app/logs/today.log").exists());
        assert!(!h.join("snap").exists());
        assert_eq!(shell.commands(), vec!["tester: trash-empty"]);
    }

    #[test]
    fn browser_and_deep_lists_follow_their_flags() {
        let home = tempfile::tempdir().unwrap();
        let h = home.path();
        write(&h.join(".config/browser/Cache/entry"), 7);

        let shell = Arc::new(RecordingShell::new());
        let (cleaner, _) = build(RunOptions::default(), h, shell.clone());
        assert_eq!(cleaner.run(), 0);
        assert!(h.join(".config/browser/Cache/entry").exists());

        let opts = RunOptions {
            clear_browsers: true,
            ..RunOptions::default()
        };
        let (cleaner, _) = build(opts, h, shell);
        assert_eq!(cleaner.run(), 7);
        assert!(h.join(".config/browser/Cache").is_dir());
    }

    #[test]
    fn disabled_specs_are_left_alone() {
        let home = tempfile::tempdir().unwrap();
        write(&home.path().join(".bash_history"), 5);
        let mut enablement = SpecEnablement::new();
        enablement.set(".bash_history", false);

        let cleaner = Cleaner::new(RunOptions::default(), enablement, Arc::new(Rows::default()))
            .with_shell(Arc::new(RecordingShell::new()))
            .with_catalog(catalog())
            .with_resolver(Resolver::with_home(None))
            .with_privileged(false)
            .with_homes(vec![user(home.path())]);
        assert_eq!(cleaner.run(), 0);
        assert!(home.path().join(".bash_history").exists());
    }

    #[test]
    fn unprivileged_runs_skip_the_machine_phase() {
        let home = tempfile::tempdir().unwrap();
        let shell = Arc::new(RecordingShell::new());
        let (cleaner, _) = build(RunOptions::default(), home.path(), shell.clone());
        cleaner.run();
        assert!(!shell
            .commands()
            .iter()
            .any(|c| c.starts_with("journalctl") || c.starts_with("apt-get")));
    }

    #[test]
    fn shutdown_only_after_a_live_uncancelled_run() {
        let home = tempfile::tempdir().unwrap();
        let opts = RunOptions {
            shutdown_after: true,
            ..RunOptions::default()
        };

        let shell = Arc::new(RecordingShell::new());
        let (cleaner, _) = build(opts.clone(), home.path(), shell.clone());
        cleaner.run();
        assert_eq!(shell.commands().last().map(String::as_str), Some(SHUTDOWN));

        let shell = Arc::new(RecordingShell::new());
        let dry = RunOptions {
            dry_run: true,
            ..opts.clone()
        };
        let (cleaner, _) = build(dry, home.path(), shell.clone());
        cleaner.run();
        assert!(shell.commands().is_empty());

        let shell = Arc::new(RecordingShell::new());
        let (cleaner, _) = build(opts, home.path(), shell.clone());
        cleaner.cancel_token().cancel();
        cleaner.run();
        assert!(shell.commands().is_empty());
    }

    #[test]
    fn explicit_home_in_options_is_used() {
        let home = tempfile::tempdir().unwrap();
        write(&home.path().join(".bash_history"), 9);
        let opts = RunOptions {
            username: "someone".into(),
            user_home: home.path().display().to_string(),
            ..RunOptions::default()
        };
        let shell = Arc::new(RecordingShell::new());
        let cleaner = Cleaner::new(opts, SpecEnablement::new(), Arc::new(Rows::default()))
            .with_shell(shell.clone())
            .with_catalog(catalog())
            .with_resolver(Resolver::with_home(None))
            .with_privileged(false);
        assert_eq!(cleaner.run(), 9);
        assert_eq!(shell.commands(), vec!["someone: trash-empty"]);
    }
}
