use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "homesweep",
    about = "A Linux cleanup tool for caches, logs, trash and old kernels",
    version
)]
pub struct Cli {
    /// Log engine activity to stderr (same as HOMESWEEP_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what would be removed (dry-run, no deletion)
    Scan {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Clean junk files (requires --confirm to actually delete)
    Clean {
        /// Actually delete files. Without this flag, behaves like scan.
        #[arg(long)]
        confirm: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// List the homes that can be targeted
    Users,

    /// List every cleanup target and whether it is enabled
    Specs,

    /// Show or change persisted settings
    Config {
        /// Enable a target by key (see `specs`)
        #[arg(long, value_name = "KEY")]
        enable: Vec<String>,

        /// Disable a target by key (see `specs`)
        #[arg(long, value_name = "KEY")]
        disable: Vec<String>,

        /// Persist an option, e.g. `--set vacuum_days=14`
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Flag read by an external scheduler
        #[arg(long)]
        run_at_boot: Option<bool>,

        /// Flag read by an external scheduler
        #[arg(long)]
        run_at_shutdown: Option<bool>,
    },

    /// Run a sweep from an options file and report on stdout
    #[command(hide = true)]
    Worker {
        config: PathBuf,
    },
}

/// Per-run overrides on top of the persisted options.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Target user (`root` sweeps machine-wide locations, elevating if needed)
    #[arg(long)]
    pub user: Option<String>,

    /// Target home directory (defaults to the user's home)
    #[arg(long)]
    pub home: Option<PathBuf>,

    /// Also clear browser profile caches
    #[arg(long)]
    pub browsers: bool,

    /// Purge installed kernels other than the running one
    #[arg(long)]
    pub kernels: bool,

    /// Fully remove the aggressive targets (snap data, ssh keys)
    #[arg(long)]
    pub aggressive: bool,

    /// Power off after a live run completes
    #[arg(long)]
    pub shutdown: bool,

    /// Close the target user's programs before a live run
    #[arg(long)]
    pub close_programs: bool,

    /// Journal retention in days
    #[arg(long)]
    pub vacuum_days: Option<u32>,

    /// Journal size ceiling (e.g. "100M", "1G")
    #[arg(long)]
    pub vacuum_size: Option<String>,

    /// Snap revisions to keep
    #[arg(long)]
    pub keep_snaps: Option<u32>,
}
