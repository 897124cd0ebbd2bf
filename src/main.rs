#![forbid(unsafe_code)]

mod browser;
mod config;
mod constants;
mod controller;
mod css;
mod events;
mod input_gate;
mod keyboard;
mod logging;
mod recovery;
mod schedule;
mod session;
mod signals;
mod surface;
#[cfg(test)]
mod testing;
mod timers;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use browser::BrowserHost;
use config::KioskConfig;
use constants::browser as browser_defaults;
use controller::Controller;
use input_gate::InputGate;
use schedule::LocalClock;

#[derive(Parser, Debug)]
#[command(name = "camera-kiosk", version, about = "Unattended full-screen camera dashboard")]
struct Args {
    /// Config file (defaults to <config_dir>/camera-kiosk/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append-only log file (defaults to <data_dir>/camera-kiosk/kiosk.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Browser executable used as the display surface
    #[arg(long, default_value = browser_defaults::DEFAULT_COMMAND)]
    browser: String,

    /// Browser profile directory (defaults to <data_dir>/camera-kiosk/profile)
    #[arg(long)]
    profile_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_path = args.log_file.clone().unwrap_or_else(logging::default_log_path);
    let _log_guard = logging::init(&log_path).context("Failed to initialize logging")?;
    logging::install_panic_hook();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Camera Kiosk...");
    info!(path = %log_path.display(), "Log file: {}", log_path.display());

    let config_path = args.config.clone().unwrap_or_else(KioskConfig::default_path);
    let config = KioskConfig::load(&config_path);
    info!(
        path = %config_path.display(),
        url = %config.url,
        fullscreen = config.fullscreen,
        schedule = config.reload_schedule.enabled,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to build event loop runtime")?;

    let reason = runtime.block_on(async {
        let (events, mut receiver) = events::channel();

        let _signals = signals::spawn_listener(events.clone())?;

        // Keyboard input is optional; without it only the debug exit is lost
        let gate = InputGate::from_config(&config);
        let _keyboard = if keyboard::check_permissions() {
            match keyboard::spawn_listener(events.clone(), &gate) {
                Ok(handles) => {
                    info!(devices = handles.len(), "Keyboard input enabled");
                    Some(handles)
                }
                Err(e) => {
                    error!(error = ?e, "Failed to start keyboard listener");
                    keyboard::print_permission_error();
                    None
                }
            }
        } else {
            keyboard::print_permission_error();
            None
        };

        let profile_dir = args
            .profile_dir
            .clone()
            .unwrap_or_else(BrowserHost::default_profile_dir);
        let host = BrowserHost::new(args.browser.clone(), profile_dir);

        let mut controller = Controller::new(config, host, events, Box::new(LocalClock));
        controller.start()?;
        anyhow::Ok(controller::run(&mut controller, &mut receiver).await)
    })?;

    match reason {
        Some(reason) => info!(reason = ?reason, "Camera Kiosk stopped"),
        None => warn!("Event channel closed, Camera Kiosk stopped"),
    }
    Ok(())
}
