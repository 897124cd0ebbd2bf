//! Messages consumed by the controller loop
//!
//! Host callbacks, timer firings and shutdown requests all arrive on one
//! channel and are handled strictly one at a time.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::input_gate::KeyInput;
use crate::timers::TimerFired;

pub type EventSender = UnboundedSender<KioskEvent>;
pub type EventReceiver = UnboundedReceiver<KioskEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

#[derive(Debug, Clone, PartialEq)]
pub enum KioskEvent {
    Host(HostEvent),
    Timer(TimerFired),
    Shutdown(ShutdownReason),
}

/// Notifications from the display surface
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Surface finished creation and can navigate
    SurfaceReady,
    LoadFinished,
    LoadFailed { code: i32, description: String },
    /// Renderer process crashed, was killed or hung
    ProcessGone(ProcessGoneDetails),
    Input(KeyInput),
    /// The page asked for a new window
    WindowOpenRequest { url: String },
    Closed,
    /// Activation request (recreates the surface when none is live)
    Activate,
}

/// Diagnostic payload of a renderer termination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGoneDetails {
    pub reason: GoneReason,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoneReason {
    /// Non-zero exit or a fault signal
    Crashed,
    /// SIGKILL from outside the kiosk
    Killed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    DebugExit,
    AllSurfacesClosed,
    Signal(i32),
}
