//! Unix termination signals as shutdown events

use std::thread;

use anyhow::{Context, Result};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use tracing::{debug, info};

use crate::events::{EventSender, KioskEvent, ShutdownReason};

pub const HANDLED: [i32; 3] = [SIGTERM, SIGINT, SIGHUP];

/// Forward SIGTERM, SIGINT and SIGHUP to the event loop from a listener thread
///
/// Closing the returned handle stops the listener.
pub fn spawn_listener(events: EventSender) -> Result<Handle> {
    let mut signals = Signals::new(HANDLED).context("Failed to register signal listeners")?;
    let handle = signals.handle();

    thread::Builder::new()
        .name("kiosk-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                info!(signal, "Received termination signal");
                if events.send(shutdown_event(signal)).is_err() {
                    debug!("Event loop gone, stopping signal listener");
                    break;
                }
            }
        })
        .context("Failed to spawn signal listener thread")?;

    Ok(handle)
}

fn shutdown_event(signal: i32) -> KioskEvent {
    KioskEvent::Shutdown(ShutdownReason::Signal(signal))
}
