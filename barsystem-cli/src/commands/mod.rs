//! CLI command implementations

pub mod logs;
pub mod ping;
pub mod setup;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value as JsonValue;

use barsystem_core::services::{EntryPoint, LoggingService};
use barsystem_core::{BarBackend, Config, MemoryBackend, RpcClient};

/// Settings given on the command line; they win over everything else
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub uri: Option<String>,
    pub user: Option<String>,
    pub password_file: Option<PathBuf>,
    pub printer: Option<PathBuf>,
    pub demo: bool,
}

/// Get the logging service
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger(entry_point: EntryPoint) -> Option<LoggingService> {
    let barsystem_dir = get_barsystem_dir().ok()?;
    LoggingService::new(&barsystem_dir, entry_point, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: &str) {
    if let Some(l) = logger {
        let _ = l.log_event(event);
    }
}

/// Log a command execution
pub fn log_command(logger: &Option<LoggingService>, command: &str) {
    if let Some(l) = logger {
        let _ = l.log_command(command);
    }
}

/// Log a failure; the message must not carry names or amounts
pub fn log_error(
    logger: &Option<LoggingService>,
    event: &str,
    message: &str,
    details: Option<&str>,
) {
    if let Some(l) = logger {
        let _ = l.log_error(event, message, details);
    }
}

/// Get the barsystem directory from environment or default
pub fn get_barsystem_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("BARSYSTEM_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".barsystem"))
        .ok_or_else(|| anyhow!("Could not find home directory; set BARSYSTEM_DIR"))
}

/// Load the configuration and apply command line overrides
pub fn load_config(overrides: &Overrides) -> Result<Config> {
    let barsystem_dir = get_barsystem_dir()?;
    let mut config = Config::load(&barsystem_dir)
        .with_context(|| format!("Failed to load configuration from {:?}", barsystem_dir))?;

    if let Some(uri) = &overrides.uri {
        config.set_uri(uri)?;
    }
    if let Some(user) = &overrides.user {
        config.user_name = user.clone();
    }
    if let Some(path) = &overrides.password_file {
        config.password = None;
        config.password_file = Some(path.clone());
    }
    if let Some(device) = &overrides.printer {
        config.printer_device = Some(device.clone());
    }
    if overrides.demo {
        config.enable_demo_mode();
    }

    Ok(config)
}

/// The backend the shell talks to
pub enum Connection {
    /// In-memory demo bar
    Demo(MemoryBackend),
    /// The barsystem service
    Service(Arc<RpcClient>),
}

impl Connection {
    pub fn open(config: &Config) -> Result<Self> {
        if config.demo_mode {
            return Ok(Connection::Demo(MemoryBackend::demo()));
        }
        let client = RpcClient::new(&config.uri).context("Failed to create service client")?;
        Ok(Connection::Service(Arc::new(client)))
    }

    pub fn backend(&self) -> Arc<dyn BarBackend> {
        match self {
            Connection::Demo(backend) => Arc::new(backend.clone()),
            Connection::Service(client) => Arc::clone(client) as Arc<dyn BarBackend>,
        }
    }

    /// Where we are connected to, for display
    pub fn describe(&self) -> String {
        match self {
            Connection::Demo(_) => "demo mode".to_string(),
            Connection::Service(client) => client.uri().to_string(),
        }
    }

    /// Start a session and authenticate it
    pub fn login(&self, config: &Config) -> Result<()> {
        let client = match self {
            Connection::Demo(_) => return Ok(()),
            Connection::Service(client) => client,
        };

        let password = config.password()?;
        client
            .create_session()
            .context("Could not start the session!")?;
        let result = client
            .login(&config.user_name, &password)
            .context("Could not authenticate!")?;
        if result == JsonValue::Bool(false) {
            bail!("Could not authenticate!");
        }
        Ok(())
    }
}
