//! Shared CLI helpers and small reusable Clap fragments

use clap::Parser;
use std::path::PathBuf;

/// Common daemon options used by tallyd
#[derive(Clone, Debug, Parser)]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:7070")]
    pub bind: String,

    /// Write JSONL connection log entries to file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}
