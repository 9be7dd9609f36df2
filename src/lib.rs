//! Reclaims disk space on a Linux workstation: caches, logs, trash, old
//! kernels and application junk, per user and machine-wide, with an exact
//! dry-run preview and cooperative cancellation.

pub mod bridge;
pub mod catalog;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod disk_info;
pub mod error;
pub mod maintenance;
pub mod options;
pub mod orchestrator;
pub mod output;
pub mod protocol;
pub mod quiesce;
pub mod remover;
pub mod resolver;
pub mod session;
pub mod shell;
pub mod users;
pub mod utils;

pub use error::{Error, Result};
