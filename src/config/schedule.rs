//! Reload schedule settings (`reloadSchedule` block of the config file)

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{defaults, validation};

/// Time-of-day window in which the page is reloaded periodically
///
/// Hours are wall-clock local. `active_start_hour > active_end_hour` means the
/// window wraps midnight (active outside `[end, start)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub active_start_hour: u32,
    pub active_end_hour: u32,

    /// Reload period inside the active window (ms, 0 = none)
    #[serde(rename = "activeInterval")]
    pub active_interval_ms: u64,

    /// Reload period outside the active window (ms, 0 = idle)
    #[serde(rename = "offInterval")]
    pub off_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            active_start_hour: defaults::ACTIVE_START_HOUR,
            active_end_hour: defaults::ACTIVE_END_HOUR,
            active_interval_ms: defaults::ACTIVE_INTERVAL_MS,
            off_interval_ms: defaults::OFF_INTERVAL_MS,
        }
    }
}

impl ScheduleConfig {
    /// Replace out-of-range hours with their defaults
    pub(super) fn validate_and_clamp(&mut self) {
        if self.active_start_hour >= validation::HOURS_PER_DAY {
            warn!(
                active_start_hour = self.active_start_hour,
                using = defaults::ACTIVE_START_HOUR,
                "activeStartHour out of range, using default"
            );
            self.active_start_hour = defaults::ACTIVE_START_HOUR;
        }
        if self.active_end_hour >= validation::HOURS_PER_DAY {
            warn!(
                active_end_hour = self.active_end_hour,
                using = defaults::ACTIVE_END_HOUR,
                "activeEndHour out of range, using default"
            );
            self.active_end_hour = defaults::ACTIVE_END_HOUR;
        }
    }
}
