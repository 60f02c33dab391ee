//! Configuration management
//!
//! Settings live in settings.json in the barsystem directory:
//! ```json
//! {
//!   "server": { "uri": "http://127.0.0.1:8000", "userName": "barsystem", "passwordFile": "barsystem.pw" },
//!   "printer": { "device": "/dev/ttyUSB0", "kodak": false, "logo": "logo.pbm" },
//!   "shell": { "title": "TkkrLab barsystem", "reconnectSeconds": 2, "historyLength": 5 },
//!   "app": { "demoMode": false }
//! }
//! ```
//!
//! Older installations keep the URI and password in `barsystem.uri` and
//! `barsystem.pw`; those files are read when settings.json doesn't say.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapters::rpc::DEFAULT_URI;
use crate::services::register::DEFAULT_HISTORY_LENGTH;

pub const SETTINGS_FILE: &str = "settings.json";
pub const LEGACY_URI_FILE: &str = "barsystem.uri";
pub const LEGACY_PASSWORD_FILE: &str = "barsystem.pw";

pub const DEFAULT_USER_NAME: &str = "barsystem";
pub const DEFAULT_TITLE: &str = "TkkrLab barsystem";
pub const DEFAULT_RECONNECT_SECONDS: u64 = 2;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    server: ServerSettings,
    #[serde(default)]
    printer: PrinterSettings,
    #[serde(default)]
    shell: ShellSettings,
    #[serde(default)]
    app: AppSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password_file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrinterSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device: Option<String>,
    #[serde(default)]
    kodak: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logo: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShellSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reconnect_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    history_length: Option<usize>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Barsystem configuration (resolved view of settings, legacy files and
/// environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub uri: String,
    pub user_name: String,
    /// Password given directly (settings or `BARSYSTEM_PASSWORD`)
    pub password: Option<String>,
    pub password_file: Option<PathBuf>,
    pub printer_device: Option<PathBuf>,
    pub printer_kodak: bool,
    pub printer_logo: Option<PathBuf>,
    pub title: String,
    pub reconnect_seconds: u64,
    pub history_length: usize,
    pub demo_mode: bool,
    dir: PathBuf,
}

impl Config {
    /// Load config from the barsystem directory
    ///
    /// Environment overrides: `BARSYSTEM_URI`, `BARSYSTEM_PASSWORD` and
    /// `BARSYSTEM_DEMO_MODE` (for CI/testing).
    pub fn load(barsystem_dir: &Path) -> Result<Self> {
        Self::load_with_env(barsystem_dir, |key| std::env::var(key).ok())
    }

    /// Load config, reading environment overrides through `env`
    pub fn load_with_env(
        barsystem_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let raw = read_settings(barsystem_dir)?;

        let uri = match env("BARSYSTEM_URI") {
            Some(uri) => uri,
            None => match raw.server.uri.clone() {
                Some(uri) => uri,
                None => read_legacy(&barsystem_dir.join(LEGACY_URI_FILE))?
                    .unwrap_or_else(|| DEFAULT_URI.to_string()),
            },
        };
        let uri = validate_uri(&uri)?;

        let password = env("BARSYSTEM_PASSWORD").or_else(|| raw.server.password.clone());

        let demo_mode = match env("BARSYSTEM_DEMO_MODE").as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.app.demo_mode,
        };

        let resolve = |path: &String| resolve_path(barsystem_dir, path);

        Ok(Self {
            uri,
            user_name: raw
                .server
                .user_name
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            password,
            password_file: raw.server.password_file.as_ref().map(resolve),
            printer_device: raw.printer.device.as_ref().map(PathBuf::from),
            printer_kodak: raw.printer.kodak,
            printer_logo: raw.printer.logo.as_ref().map(resolve),
            title: raw
                .shell
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            reconnect_seconds: raw
                .shell
                .reconnect_seconds
                .unwrap_or(DEFAULT_RECONNECT_SECONDS)
                .max(1),
            history_length: raw.shell.history_length.unwrap_or(DEFAULT_HISTORY_LENGTH),
            demo_mode,
            dir: barsystem_dir.to_path_buf(),
        })
    }

    /// Save config to the barsystem directory
    ///
    /// Preserves settings this program doesn't manage. A password given
    /// in settings.json stays there; one from the environment is never
    /// written.
    pub fn save(&self, barsystem_dir: &Path) -> Result<()> {
        fs::create_dir_all(barsystem_dir)
            .with_context(|| format!("Failed to create {}", barsystem_dir.display()))?;

        let mut settings = read_settings(barsystem_dir)?;

        settings.server.uri = Some(self.uri.clone());
        settings.server.user_name = Some(self.user_name.clone());
        settings.server.password_file = self
            .password_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        settings.printer.device = self
            .printer_device
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        settings.printer.kodak = self.printer_kodak;
        settings.printer.logo = self
            .printer_logo
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        settings.shell.title = Some(self.title.clone());
        settings.shell.reconnect_seconds = Some(self.reconnect_seconds);
        settings.shell.history_length = Some(self.history_length);
        settings.app.demo_mode = self.demo_mode;

        let content = serde_json::to_string_pretty(&settings)?;
        fs::write(barsystem_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    /// Set the service URI after checking it
    pub fn set_uri(&mut self, uri: &str) -> Result<()> {
        self.uri = validate_uri(uri)?;
        Ok(())
    }

    /// Password for `user/authenticate`
    ///
    /// Taken from the direct password, else the password file, else the
    /// legacy `barsystem.pw`.
    pub fn password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        if let Some(path) = &self.password_file {
            return read_legacy(path)?
                .ok_or_else(|| anyhow!("Password file {} is empty", path.display()));
        }
        read_legacy(&self.dir.join(LEGACY_PASSWORD_FILE))?.ok_or_else(|| {
            anyhow!(
                "No password configured. Run 'barsystem setup' or create {}",
                self.dir.join(LEGACY_PASSWORD_FILE).display()
            )
        })
    }

    /// Enable demo mode
    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    /// Directory the configuration was loaded from
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Store a password in the default password file, readable by the owner only
pub fn store_password(barsystem_dir: &Path, password: &str) -> Result<PathBuf> {
    fs::create_dir_all(barsystem_dir)?;
    let path = barsystem_dir.join(LEGACY_PASSWORD_FILE);
    fs::write(&path, format!("{}\n", password))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(path)
}

/// Check a service URI: it must parse and use http or https
pub fn validate_uri(uri: &str) -> Result<String> {
    let uri = uri.trim();
    let parsed = Url::parse(uri).with_context(|| format!("Invalid service URI '{}'", uri))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "Service URI must use http or https, got '{}'",
            parsed.scheme()
        );
    }
    Ok(uri.to_string())
}

fn read_settings(barsystem_dir: &Path) -> Result<SettingsFile> {
    let settings_path = barsystem_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", settings_path.display()))
}

/// Trimmed contents of a one-value file; `None` if missing or blank
fn read_legacy(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let value = content.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
