//! Logging service - structured event logging to a JSON lines file
//!
//! Provides a privacy-safe event log stored in logs.jsonl. No personal data
//! (names, balances, cart contents, amounts) is ever logged, only what
//! happened and whether it failed.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

const LOG_FILE: &str = "logs.jsonl";

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    // Lower 16 bits hold the counter (65536 unique IDs per millisecond)
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

/// Get current unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Where an event originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    /// The interactive register shell
    Shell,
    /// One-shot subcommands (ping, setup, logs)
    Cli,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Shell => "shell",
            EntryPoint::Cli => "cli",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    /// Create a new log event with just an event name
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Set the command context (shell command or subcommand name)
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Set error information
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Set error details (RPC code, error kind)
    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A log entry as stored in the log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
}

/// Service for structured event logging
///
/// Every event is appended as one JSON object per line. Lines that fail to
/// parse (e.g. a write cut short by a crash) are skipped when reading.
pub struct LoggingService {
    write_lock: Mutex<()>,
    log_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Create a new logging service
    ///
    /// Creates the barsystem directory and logs.jsonl if they don't exist.
    pub fn new(
        barsystem_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        fs::create_dir_all(barsystem_dir)
            .with_context(|| format!("Failed to create {}", barsystem_dir.display()))?;

        let log_path = barsystem_dir.join(LOG_FILE);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open {}", log_path.display()))?;

        Ok(Self {
            write_lock: Mutex::new(()),
            log_path,
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Log an event
    ///
    /// The entry_point, app_version, and platform are added from the
    /// service configuration.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let entry = LogEntry {
            id: generate_id(),
            timestamp: now_ms(),
            entry_point: self.entry_point.as_str().to_string(),
            app_version: self.app_version.clone(),
            platform: self.platform.to_string(),
            event: event.event,
            command: event.command,
            error_message: event.error_message,
            error_details: event.error_details,
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.lock()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Log a simple event with just a name
    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    /// Log a command execution
    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    /// Log an error
    pub fn log_error(&self, event: &str, message: &str, details: Option<&str>) -> Result<()> {
        let mut log_event = LogEvent::new(event).with_error(message);
        if let Some(d) = details {
            log_event = log_event.with_error_details(d);
        }
        self.log(log_event)
    }

    fn read_entries(&self) -> Result<Vec<LogEntry>> {
        let file = match File::open(&self.log_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Newest first
    fn sorted_desc(mut entries: Vec<LogEntry>, limit: usize) -> Vec<LogEntry> {
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(limit);
        entries
    }

    /// Query recent log entries
    ///
    /// Returns the most recent entries, up to the specified limit.
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let _guard = self.lock()?;
        Ok(Self::sorted_desc(self.read_entries()?, limit))
    }

    /// Query log entries with errors
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let _guard = self.lock()?;
        let errors = self
            .read_entries()?
            .into_iter()
            .filter(|e| e.error_message.is_some())
            .collect();
        Ok(Self::sorted_desc(errors, limit))
    }

    /// Get the total number of log entries
    pub fn count(&self) -> Result<u64> {
        let _guard = self.lock()?;
        Ok(self.read_entries()?.len() as u64)
    }

    /// Delete logs older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let _guard = self.lock()?;
        let entries = self.read_entries()?;
        let before = entries.len();

        let kept: Vec<LogEntry> = entries
            .into_iter()
            .filter(|e| e.timestamp >= timestamp_ms)
            .collect();
        let deleted = (before - kept.len()) as u64;

        // Rewrite through a temporary file so a crash never truncates the log
        let tmp_path = self.log_path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for entry in &kept {
                serde_json::to_writer(&mut tmp, entry)?;
                tmp.write_all(b"\n")?;
            }
            tmp.flush()?;
        }
        fs::rename(&tmp_path, &self.log_path)?;

        Ok(deleted)
    }

    /// Number of entries per event name, and the oldest timestamp
    pub fn event_counts(&self) -> Result<(BTreeMap<String, u64>, Option<i64>)> {
        let _guard = self.lock()?;
        let entries = self.read_entries()?;
        let oldest = entries.iter().map(|e| e.timestamp).min();
        let mut counts = BTreeMap::new();
        for entry in entries {
            *counts.entry(entry.event).or_insert(0) += 1;
        }
        Ok((counts, oldest))
    }

    /// Export logs to a file for troubleshooting
    pub fn export(&self, output_path: &Path) -> Result<PathBuf> {
        let _guard = self.lock()?;
        fs::copy(&self.log_path, output_path)?;
        Ok(output_path.to_path_buf())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
