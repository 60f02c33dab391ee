//! Barsystem CLI - point of sale for the bar, in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;
mod shell;

use commands::{load_config, logs, ping, setup, Overrides};

/// Barsystem - scan products, settle them against member balances
#[derive(Parser)]
#[command(name = "barsystem", version, about, long_about = None)]
struct Cli {
    /// Service URI (overrides the configured one)
    #[arg(long, global = true, env = "BARSYSTEM_URI")]
    uri: Option<String>,

    /// Service user name
    #[arg(long, global = true)]
    user: Option<String>,

    /// File containing the service password
    #[arg(long, global = true)]
    password_file: Option<PathBuf>,

    /// Receipt printer device
    #[arg(long, global = true)]
    printer: Option<PathBuf>,

    /// Run against a built-in demo bar instead of the service
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the register shell (default)
    Shell,

    /// Check that the service is reachable
    Ping {
        /// Also start a session and log in
        #[arg(long)]
        login: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the settings file
    Setup {
        /// Keep the current values and only persist command line overrides
        #[arg(long)]
        no_prompt: bool,
    },

    /// Inspect the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    output::init();
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        uri: cli.uri,
        user: cli.user,
        password_file: cli.password_file,
        printer: cli.printer,
        demo: cli.demo,
    };

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => shell::run(load_config(&overrides)?),
        Commands::Ping { login, json } => ping::run(&overrides, login, json),
        Commands::Setup { no_prompt } => setup::run(&overrides, no_prompt),
        Commands::Logs { command } => logs::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_shell_is_default() {
        let cli = Cli::try_parse_from(["barsystem", "--demo"]).unwrap();
        assert!(cli.demo);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "barsystem",
            "ping",
            "--login",
            "--uri",
            "http://bar.local:8069/jsonrpc",
        ])
        .unwrap();
        assert_eq!(cli.uri.as_deref(), Some("http://bar.local:8069/jsonrpc"));
        assert!(matches!(
            cli.command,
            Some(Commands::Ping {
                login: true,
                json: false
            })
        ));
    }
}
