//! Load and crash recovery decisions
//!
//! Navigation failures are retried after a fixed delay, forever. Renderer
//! terminations reload the surviving surface at once. Neither path backs off
//! or gives up: the kiosk has nobody to hand an error to.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::constants::timing;
use crate::events::ProcessGoneDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Re-issue the original load after the delay
    RetryLoadAfter(Duration),
    /// Reload the live surface immediately
    ReloadNow,
    Nothing,
}

pub fn on_load_failed(code: i32, description: &str) -> RecoveryAction {
    warn!(code, description = %description, "Failed to load: {description} ({code})");
    info!(
        retry_secs = timing::LOAD_RETRY_DELAY.as_secs(),
        "Retrying in {} seconds...",
        timing::LOAD_RETRY_DELAY.as_secs()
    );
    RecoveryAction::RetryLoadAfter(timing::LOAD_RETRY_DELAY)
}

pub fn on_process_gone(details: &ProcessGoneDetails, session_live: bool) -> RecoveryAction {
    error!(
        reason = ?details.reason,
        exit_code = ?details.exit_code,
        signal = ?details.signal,
        session_live,
        "Render process gone: {details:?}"
    );
    if session_live {
        RecoveryAction::ReloadNow
    } else {
        RecoveryAction::Nothing
    }
}
