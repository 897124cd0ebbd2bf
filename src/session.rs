//! Display session: the single live surface and its navigation state

use anyhow::Result;
use tokio::time::Instant;
use tracing::debug;

use crate::constants::timing;
use crate::surface::DisplaySurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Surface requested, not ready to navigate yet
    Creating,
    Live,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Navigation {
    Idle,
    InFlight { since: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Issued,
    /// A navigation is already running; this request folds into it
    Coalesced,
    /// Surface is not live
    Skipped,
}

pub struct DisplaySession<S> {
    surface: S,
    phase: SessionPhase,
    navigation: Navigation,
}

impl<S: DisplaySurface> DisplaySession<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            phase: SessionPhase::Creating,
            navigation: Navigation::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_live(&self) -> bool {
        self.phase == SessionPhase::Live
    }

    pub fn mark_live(&mut self) {
        if self.phase == SessionPhase::Creating {
            self.phase = SessionPhase::Live;
        }
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn load(&mut self, url: &str, now: Instant) -> Result<()> {
        self.surface.load(url)?;
        self.navigation = Navigation::InFlight { since: now };
        Ok(())
    }

    /// Reload unless a navigation is already in flight
    ///
    /// A navigation older than the in-flight timeout no longer blocks, so a
    /// surface that never reports back is still reloaded eventually.
    pub fn reload(&mut self, now: Instant) -> Result<ReloadOutcome> {
        if !self.is_live() {
            return Ok(ReloadOutcome::Skipped);
        }
        if let Navigation::InFlight { since } = self.navigation
            && now.duration_since(since) < timing::RELOAD_IN_FLIGHT_TIMEOUT
        {
            debug!(in_flight_ms = now.duration_since(since).as_millis() as u64, "Reload coalesced");
            return Ok(ReloadOutcome::Coalesced);
        }
        self.surface.reload()?;
        self.navigation = Navigation::InFlight { since: now };
        Ok(ReloadOutcome::Issued)
    }

    /// The surface reported a navigation outcome
    pub fn navigation_settled(&mut self) {
        self.navigation = Navigation::Idle;
    }

    /// Close the surface and consume the session
    pub fn close(mut self) {
        self.phase = SessionPhase::Closing;
        self.surface.close();
    }
}
