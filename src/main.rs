use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use homesweep::catalog::Catalog;
use homesweep::cli::{Cli, Command, RunArgs};
use homesweep::config::{ConfigProvider, FileConfig, Settings};
use homesweep::disk_info::disk_info;
use homesweep::options::{flag, RunOptions};
use homesweep::orchestrator::Cleaner;
use homesweep::output;
use homesweep::protocol::LineSink;
use homesweep::session::{self, Event, Request, Session};
use homesweep::users;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "HOMESWEEP_LOG";

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Scan { run } => sweep(run, true),
        Command::Clean { confirm, run } => {
            if !confirm {
                output::print_no_confirm_warning();
            }
            sweep(run, !confirm)
        }
        Command::Users => {
            list_users();
            Ok(())
        }
        Command::Specs => {
            list_specs();
            Ok(())
        }
        Command::Config {
            enable,
            disable,
            set,
            run_at_boot,
            run_at_shutdown,
        } => configure(enable, disable, set, run_at_boot, run_at_shutdown),
        Command::Worker { config } => worker(&config),
    }
}

/// Logs go to stderr so worker stdout carries nothing but protocol lines.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_settings() -> Settings {
    FileConfig::default_location()
        .map(|store| store.load())
        .unwrap_or_default()
}

/// Persisted options with command-line overrides applied.
fn run_options(base: RunOptions, args: RunArgs, dry_run: bool) -> Result<RunOptions> {
    let mut opts = base;
    opts.dry_run = dry_run;
    opts.clear_browsers |= args.browsers;
    opts.clear_kernels |= args.kernels;
    opts.aggressive |= args.aggressive;
    opts.shutdown_after |= args.shutdown;
    if let Some(days) = args.vacuum_days {
        opts.vacuum_days = days;
    }
    if let Some(size) = args.vacuum_size {
        opts.vacuum_size = size;
    }
    if let Some(keep) = args.keep_snaps {
        opts.keep_snaps = keep;
    }

    match (args.user, args.home) {
        (Some(user), Some(home)) => {
            opts.username = user;
            opts.user_home = home.display().to_string();
        }
        (Some(user), None) => {
            let found = users::list_users()
                .into_iter()
                .find(|u| u.name == user)
                .with_context(|| format!("no home directory found for user '{user}'"))?;
            opts.username = found.name;
            opts.user_home = found.home.display().to_string();
        }
        (None, Some(home)) => {
            opts.username = users::name_for_home(&home);
            opts.user_home = home.display().to_string();
        }
        (None, None) => {}
    }

    opts.validate()?;
    Ok(opts)
}

fn sweep(args: RunArgs, dry_run: bool) -> Result<()> {
    output::print_banner();
    let settings = load_settings();
    let close_programs = args.close_programs;
    let opts = run_options(settings.options, args, dry_run)?;

    output::print_free_space("Free space before", disk_info(Path::new("/")).as_ref());
    println!();
    output::print_scan_header(if dry_run { "Would remove" } else { "Removing" });

    let session = Session::start(Request {
        opts,
        enablement: settings.enablement,
        close_programs,
    });
    let cancel = session.cancel_token();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install Ctrl+C handler")?;

    let total = session.wait(session::TICK, |event| {
        if let Event::Row(row) = event {
            output::print_row(row);
        }
    });

    output::print_separator();
    let label = if dry_run {
        "Total reclaimable:"
    } else {
        "Total freed:"
    };
    output::print_grand_total(label, total);
    if cancel.is_cancelled() {
        output::print_cancelled();
    }
    output::print_free_space("Free space after", disk_info(Path::new("/")).as_ref());
    println!();

    if dry_run {
        output::print_dry_run_footer();
    } else {
        output::print_clean_complete(total);
    }
    Ok(())
}

fn list_users() {
    output::print_scan_header("Homes");
    for user in users::list_users() {
        output::print_user(&user.name, &user.home.display().to_string());
    }
}

fn list_specs() {
    let settings = load_settings();
    for (section, keys) in Catalog::builtin().sections() {
        output::print_scan_header(section);
        for key in keys {
            output::print_spec(&key, settings.enablement.is_enabled(&key));
        }
        println!();
    }
}

fn configure(
    enable: Vec<String>,
    disable: Vec<String>,
    set: Vec<String>,
    run_at_boot: Option<bool>,
    run_at_shutdown: Option<bool>,
) -> Result<()> {
    let store = FileConfig::default_location().context("cannot locate the configuration directory")?;
    let mut settings = store.load();
    let changed = !enable.is_empty()
        || !disable.is_empty()
        || !set.is_empty()
        || run_at_boot.is_some()
        || run_at_shutdown.is_some();

    let known = Catalog::builtin().all_keys();
    for (keys, enabled) in [(enable, true), (disable, false)] {
        for key in keys {
            ensure!(
                known.contains(&key),
                "unknown target '{key}' (see `homesweep specs`)"
            );
            settings.enablement.set(key, enabled);
        }
    }

    if !set.is_empty() {
        let mut values = settings.options.to_map();
        for pair in &set {
            let Some((key, value)) = pair.split_once('=') else {
                bail!("expected KEY=VALUE, got '{pair}'");
            };
            let key = key.trim();
            ensure!(values.contains_key(key), "unknown option '{key}'");
            values.insert(key.to_string(), value.trim().to_string());
        }
        settings.options = RunOptions::from_map(&values)?;
    }
    if let Some(value) = run_at_boot {
        settings.run_at_boot = value;
    }
    if let Some(value) = run_at_shutdown {
        settings.run_at_shutdown = value;
    }

    if changed {
        store.save(&settings)?;
        output::print_info(&format!("saved {}", store.path().display()));
    }

    output::print_scan_header("Settings");
    for (key, value) in settings.options.to_map() {
        output::print_setting(&key, &value);
    }
    output::print_setting("run_at_boot", &flag(settings.run_at_boot));
    output::print_setting("run_at_shutdown", &flag(settings.run_at_shutdown));
    let disabled: Vec<&str> = settings
        .enablement
        .iter()
        .filter(|(_, enabled)| !enabled)
        .map(|(key, _)| key)
        .collect();
    if !disabled.is_empty() {
        output::print_warning(&format!("{} target(s) disabled", disabled.len()));
    }
    Ok(())
}

/// Privileged half of an elevated run: options come from `path`, rows and
/// the final total go to stdout.
fn worker(path: &Path) -> Result<()> {
    let opts = RunOptions::read_worker_file(path)
        .with_context(|| format!("cannot load worker options from {}", path.display()))?;
    let settings = load_settings();

    let sink = Arc::new(LineSink::new(io::stdout()));
    let cleaner = Cleaner::new(opts, settings.enablement, sink.clone());
    let token = cleaner.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        debug!(error = %e, "no Ctrl+C handler in worker");
    }

    let total = cleaner.run();
    sink.write_total(total).context("failed to report total")?;
    Ok(())
}
