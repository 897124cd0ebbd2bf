//! Time-of-day reload scheduler
//!
//! A self-chaining task: every tick reads the wall-clock hour, decides whether
//! the schedule is `Active` or `Off`, logs the decision and arms exactly one
//! timer for the next tick. Mode is never cached across ticks.

use std::time::Duration;

use chrono::Timelike;
use tracing::info;

use crate::config::ScheduleConfig;
use crate::constants::timing;
use crate::timers::{TimerKind, Timers};

/// Source of the local wall-clock hour
pub trait WallClock {
    /// Current local hour in `0..24`
    fn local_hour(&self) -> u32;
}

/// System local time via chrono
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl WallClock for LocalClock {
    fn local_hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    Active,
    Off,
}

/// Result of one schedule evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub mode: ScheduleMode,
    /// Selected reload interval (ms, 0 = idle)
    pub interval_ms: u64,
}

impl ScheduleState {
    /// Whether the armed timer reloads the page when it fires
    pub fn reloads(&self) -> bool {
        self.interval_ms > 0
    }

    /// Delay until the next tick; the recheck interval when idle
    pub fn next_delay(&self) -> Duration {
        if self.reloads() {
            Duration::from_millis(self.interval_ms)
        } else {
            timing::SCHEDULE_RECHECK_INTERVAL
        }
    }
}

/// Whether `hour` falls inside the active window (wraps midnight when start > end)
pub fn is_active(config: &ScheduleConfig, hour: u32) -> bool {
    let (start, end) = (config.active_start_hour, config.active_end_hour);
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

pub fn evaluate(config: &ScheduleConfig, hour: u32) -> ScheduleState {
    if is_active(config, hour) {
        ScheduleState {
            mode: ScheduleMode::Active,
            interval_ms: config.active_interval_ms,
        }
    } else {
        ScheduleState {
            mode: ScheduleMode::Off,
            interval_ms: config.off_interval_ms,
        }
    }
}

/// The recurring reload task
pub struct ReloadScheduler {
    config: ScheduleConfig,
    clock: Box<dyn WallClock>,
    /// State the currently armed timer was computed from
    armed: Option<ScheduleState>,
}

impl ReloadScheduler {
    pub fn new(config: ScheduleConfig, clock: Box<dyn WallClock>) -> Self {
        Self {
            config,
            clock,
            armed: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Recompute the mode from the clock and arm the next tick
    pub fn tick(&mut self, timers: &mut Timers) -> ScheduleState {
        let hour = self.clock.local_hour();
        let state = evaluate(&self.config, hour);
        let delay = state.next_delay();

        if state.reloads() {
            info!(
                mode = ?state.mode,
                hour,
                minutes = state.interval_ms as f64 / 60_000.0,
                "[Reload Schedule] {:?} mode. Next reload in {} minutes.",
                state.mode,
                state.interval_ms as f64 / 60_000.0
            );
        } else {
            info!(
                mode = ?state.mode,
                hour,
                recheck_minutes = delay.as_secs() / 60,
                "[Reload Schedule] {:?} mode. Auto-reload is currently disabled/idle.",
                state.mode
            );
        }

        timers.arm(TimerKind::ScheduledReload, delay);
        self.armed = Some(state);
        state
    }

    /// Handle the armed timer firing; returns whether the page should reload
    ///
    /// The caller reloads (if asked) and then calls [`Self::tick`] again.
    pub fn on_fire(&mut self) -> bool {
        self.armed.take().is_some_and(|state| state.reloads())
    }

    pub fn stop(&mut self, timers: &mut Timers) {
        timers.cancel(TimerKind::ScheduledReload);
        self.armed = None;
    }
}
