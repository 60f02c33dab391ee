//! Ping command - check that the service answers

use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::{get_logger, load_config, log_command, log_error, Connection, Overrides};
use barsystem_core::services::EntryPoint;

pub fn run(overrides: &Overrides, login: bool, json: bool) -> Result<()> {
    let logger = get_logger(EntryPoint::Cli);
    log_command(&logger, "ping");

    let config = load_config(overrides)?;
    let connection = Connection::open(&config)?;
    let reachable = connection.backend().ping();

    let authenticated = if reachable && login {
        match connection.login(&config) {
            Ok(()) => Some(Ok(())),
            Err(e) => {
                log_error(&logger, "login_failed", &e.to_string(), None);
                Some(Err(format!("{:#}", e)))
            }
        }
    } else {
        None
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "service": connection.describe(),
                "reachable": reachable,
                "authenticated": authenticated.as_ref().map(|r| r.is_ok()),
                "error": authenticated.as_ref().and_then(|r| r.as_ref().err()),
            })
        );
    } else {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec!["Service".to_string(), connection.describe()]);
        table.add_row(vec![
            "Reachable".to_string(),
            if reachable {
                "yes".green().to_string()
            } else {
                "no".red().to_string()
            },
        ]);
        if let Some(result) = &authenticated {
            table.add_row(vec![
                "Authenticated".to_string(),
                match result {
                    Ok(()) => "yes".green().to_string(),
                    Err(e) => format!("{} ({})", "no".red(), e),
                },
            ]);
        }
        println!("{}", table);
    }

    if !reachable {
        bail!("Service at {} is unavailable", connection.describe());
    }
    if let Some(Err(e)) = authenticated {
        bail!("Login failed: {}", e);
    }
    Ok(())
}
