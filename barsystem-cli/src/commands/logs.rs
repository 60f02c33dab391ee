//! Logs command - inspect the register's event log

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, TimeZone};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::get_barsystem_dir;
use crate::output::{self, create_table};
use barsystem_core::services::logging::now_ms;
use barsystem_core::services::{EntryPoint, LogEntry, LoggingService};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const ERROR_COLUMN_WIDTH: usize = 48;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent events, newest first
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only failures
        #[arg(long)]
        errors: bool,
        /// Show only this event (e.g. checkout_completed, session_renewed)
        #[arg(long)]
        event: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old events
    Clear {
        /// Keep the events of the last N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Count events per kind
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy the log file, e.g. to attach it to a bug report
    Export {
        /// Destination file
        path: PathBuf,
    },
}

fn open_log() -> Result<LoggingService> {
    LoggingService::new(&get_barsystem_dir()?, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn local_time(timestamp_ms: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Error message with its details, shortened to fit a table column
fn failure_summary(entry: &LogEntry) -> String {
    let Some(message) = &entry.error_message else {
        return String::new();
    };
    let full = match &entry.error_details {
        Some(details) => format!("{} ({})", message, details),
        None => message.clone(),
    };
    if full.chars().count() <= ERROR_COLUMN_WIDTH {
        return full;
    }
    let mut short: String = full.chars().take(ERROR_COLUMN_WIDTH - 3).collect();
    short.push_str("...");
    short
}

pub fn run(command: LogsCommands) -> Result<()> {
    let log = open_log()?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            event,
            json,
        } => {
            let all = if errors {
                log.get_errors(usize::MAX)?
            } else {
                log.get_recent(usize::MAX)?
            };
            let entries: Vec<LogEntry> = all
                .into_iter()
                .filter(|e| event.as_deref().map_or(true, |name| e.event == name))
                .take(limit)
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("No events logged.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Time", "From", "Event", "Command", "Failure"]);
            for entry in &entries {
                table.add_row(vec![
                    local_time(entry.timestamp),
                    entry.entry_point.clone(),
                    entry.event.clone(),
                    entry.command.clone().unwrap_or_default(),
                    failure_summary(entry).as_str().red().to_string(),
                ]);
            }
            println!("{}", table);
        }
        LogsCommands::Clear {
            older_than_days,
            force,
        } => {
            let days = i64::try_from(older_than_days).unwrap_or(i64::MAX / DAY_MS);
            let cutoff_ms = now_ms().saturating_sub(days.saturating_mul(DAY_MS));

            if !force
                && !Confirm::new()
                    .with_prompt(format!(
                        "Delete events older than {} days?",
                        older_than_days
                    ))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let deleted = log.delete_before(cutoff_ms)?;
            output::success(&format!("Deleted {} events", deleted));
        }
        LogsCommands::Stats { json } => {
            let (counts, oldest) = log.event_counts()?;
            let failures = log.get_errors(usize::MAX)?.len();
            let size_bytes = std::fs::metadata(log.log_path())
                .map(|m| m.len())
                .unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "events": counts,
                        "failures": failures,
                        "since": oldest,
                        "log_path": log.log_path().to_string_lossy(),
                        "log_size_bytes": size_bytes
                    })
                );
                return Ok(());
            }

            let mut by_count: Vec<(String, u64)> = counts.into_iter().collect();
            by_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            let mut table = create_table();
            table.set_header(vec!["Event", "Count"]);
            for (event, count) in by_count {
                table.add_row(vec![event, count.to_string()]);
            }
            println!("{}", table);

            if let Some(oldest) = oldest {
                println!("Since:    {}", local_time(oldest));
            }
            println!("Failures: {}", failures);
            println!("File:     {} ({} bytes)", log.log_path().display(), size_bytes);
        }
        LogsCommands::Export { path } => {
            let written = log.export(&path)?;
            output::success(&format!("Event log copied to {}", written.display()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: Option<&str>, details: Option<&str>) -> LogEntry {
        LogEntry {
            id: 1,
            timestamp: 0,
            entry_point: "shell".to_string(),
            app_version: "0.1.0".to_string(),
            platform: "linux".to_string(),
            event: "checkout_failed".to_string(),
            command: None,
            error_message: message.map(str::to_string),
            error_details: details.map(str::to_string),
        }
    }

    #[test]
    fn test_failure_summary() {
        assert_eq!(failure_summary(&entry(None, None)), "");
        assert_eq!(
            failure_summary(&entry(Some("Access denied"), Some("rpc code -32001"))),
            "Access denied (rpc code -32001)"
        );

        let long = "x".repeat(80);
        let summary = failure_summary(&entry(Some(&long), None));
        assert_eq!(summary.chars().count(), ERROR_COLUMN_WIDTH);
        assert!(summary.ends_with("..."));
    }
}
