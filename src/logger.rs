//! Optional per-connection logging for the daemon.
//!
//! The serve loop logs through the trait; `NoopLogger` keeps the hot
//! path free when no log file was requested.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn conn_open(&self, _peer: &str) {}
    fn transfer_done(&self, _peer: &str, _bytes: u64, _printable: u64) {}
    fn conn_abandoned(&self, _peer: &str, _msg: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

#[derive(Serialize)]
struct LogEntry<'a> {
    timestamp: String,
    event: &'static str,
    peer: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    printable: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> LogEntry<'a> {
    fn new(event: &'static str, peer: &'a str) -> Self {
        LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            event,
            peer,
            bytes: None,
            printable: None,
            error: None,
        }
    }
}

/// One JSON object per line, appended to a file.
pub struct JsonlLogger {
    file: Mutex<File>,
}

impl JsonlLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, entry: &LogEntry) {
        if let Ok(json) = serde_json::to_string(entry) {
            if let Ok(mut f) = self.file.lock() {
                let _ = writeln!(f, "{}", json);
            }
        }
    }
}

impl Logger for JsonlLogger {
    fn conn_open(&self, peer: &str) {
        self.line(&LogEntry::new("conn", peer));
    }
    fn transfer_done(&self, peer: &str, bytes: u64, printable: u64) {
        let mut e = LogEntry::new("transfer", peer);
        e.bytes = Some(bytes);
        e.printable = Some(printable);
        self.line(&e);
    }
    fn conn_abandoned(&self, peer: &str, msg: &str) {
        let mut e = LogEntry::new("abandoned", peer);
        e.error = Some(msg);
        self.line(&e);
    }
}
