use std::path::Path;

use colored::Colorize;

use crate::cleaner::ProgressRow;
use crate::disk_info::DiskInfo;
use crate::utils::{display_path, format_size};

pub fn print_banner() {
    println!(
        "{}",
        concat!("homesweep - Linux Cleanup Tool v", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    println!();
}

pub fn print_scan_header(label: &str) {
    println!("{}", format!("=== {label} ===").bold().white());
}

pub fn print_row(row: &ProgressRow) {
    println!(
        "  {}  {}  {}",
        row.modified.dimmed(),
        display_path(Path::new(&row.path)),
        format_size(row.size_bytes).yellow()
    );
}

pub fn print_spec(key: &str, enabled: bool) {
    let mark = if enabled { "[x]".green() } else { "[ ]".red() };
    println!("  {mark} {key}");
}

pub fn print_user(name: &str, home: &str) {
    println!("  {:<20} {}", name, home.dimmed());
}

pub fn print_setting(key: &str, value: &str) {
    println!("  {:<30} {}", key, value.green());
}

pub fn print_free_space(label: &str, info: Option<&DiskInfo>) {
    match info {
        Some(info) => println!(
            "  {:<30} {} of {} ({} used)",
            format!("{label}:").bold(),
            format_size(info.available).green(),
            format_size(info.total),
            format_size(info.used()).dimmed()
        ),
        None => println!("  {:<30} {}", format!("{label}:").bold(), "unknown".dimmed()),
    }
}

pub fn print_separator() {
    println!("  {}", "─".repeat(45).dimmed());
}

pub fn print_grand_total(label: &str, total: u64) {
    println!(
        "  {:<30} {}",
        label.bold(),
        format_size(total).green().bold()
    );
    println!();
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "Warning:".red().bold(), msg.red());
}

pub fn print_info(msg: &str) {
    println!("{} {}", "Info:".cyan().bold(), msg);
}

pub fn print_cancelled() {
    println!("{}", "Cancelled. Work already done is kept.".yellow().bold());
}

pub fn print_dry_run_footer() {
    println!(
        "{}",
        "This was a dry run. Run `homesweep clean --confirm` to delete."
            .yellow()
            .bold()
    );
}

pub fn print_clean_complete(total: u64) {
    println!(
        "{} {}",
        "Cleaned!".green().bold(),
        format!("{} freed.", format_size(total)).green()
    );
}

pub fn print_no_confirm_warning() {
    println!(
        "{}",
        "No --confirm flag provided. Running as dry-run scan."
            .yellow()
            .bold()
    );
    println!();
}
