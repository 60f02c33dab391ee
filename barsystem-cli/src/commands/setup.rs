//! Setup command - write server and printer settings

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};

use super::{get_logger, load_config, log_command, log_event, Overrides};
use barsystem_core::adapters::escpos::Bitmap;
use barsystem_core::config::store_password;
use barsystem_core::services::EntryPoint;

pub fn run(overrides: &Overrides, no_prompt: bool) -> Result<()> {
    let logger = get_logger(EntryPoint::Cli);
    let mut config = load_config(overrides)?;
    let barsystem_dir = config.dir().to_path_buf();

    if !no_prompt {
        let uri: String = Input::new()
            .with_prompt("Service URI")
            .default(config.uri.clone())
            .validate_with(|input: &String| {
                barsystem_core::config::validate_uri(input)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .interact_text()?;
        config.set_uri(&uri)?;

        config.user_name = Input::new()
            .with_prompt("User name")
            .default(config.user_name.clone())
            .interact_text()?;

        if Confirm::new()
            .with_prompt("Store a new password?")
            .default(config.password().is_err())
            .interact()?
        {
            let password = Password::new().with_prompt("Password").interact()?;
            let path = store_password(&barsystem_dir, &password)?;
            config.password_file = Some(path);
        }

        let device: String = Input::new()
            .with_prompt("Printer device (empty for none)")
            .default(
                config
                    .printer_device
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
            .allow_empty(true)
            .interact_text()?;
        config.printer_device = (!device.trim().is_empty()).then(|| PathBuf::from(device.trim()));

        if config.printer_device.is_some() {
            config.printer_kodak = Confirm::new()
                .with_prompt("Is it a Kodak printer?")
                .default(config.printer_kodak)
                .interact()?;

            let logo: String = Input::new()
                .with_prompt("Receipt logo, BMP or PBM (empty for none)")
                .default(
                    config
                        .printer_logo
                        .as_ref()
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                )
                .allow_empty(true)
                .validate_with(|input: &String| {
                    let path = input.trim();
                    if path.is_empty() {
                        return Ok(());
                    }
                    Bitmap::load(Path::new(path))
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()?;
            config.printer_logo = (!logo.trim().is_empty()).then(|| PathBuf::from(logo.trim()));
        }
    }

    config.save(&barsystem_dir)?;
    log_command(&logger, "setup");
    log_event(&logger, "setup_completed");

    println!(
        "{} Settings written to {}",
        "Success!".green(),
        barsystem_dir.join(barsystem_core::config::SETTINGS_FILE).display()
    );
    println!("Run 'barsystem ping --login' to check the connection.");
    Ok(())
}
