//! Host runtime collaborator interface
//!
//! The controller never talks to a browser directly. A [`HostRuntime`]
//! creates one [`DisplaySurface`] and reports everything that happens to it
//! as [`HostEvent`](crate::events::HostEvent)s on the event channel it is
//! handed at creation.

use anyhow::Result;

use crate::config::KioskConfig;
use crate::constants::surface;
use crate::events::EventSender;
use crate::input_gate::{InputVerdict, KeyInput};

/// Creation options for the display surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub kiosk: bool,
    pub frameless: bool,
    pub background: String,
    pub dev_tools: bool,
}

impl SurfaceOptions {
    pub fn from_config(config: &KioskConfig) -> Self {
        Self {
            width: surface::WIDTH,
            height: surface::HEIGHT,
            fullscreen: config.fullscreen,
            kiosk: config.fullscreen,
            frameless: true,
            background: surface::BACKGROUND.to_string(),
            dev_tools: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOpenDecision {
    Allow,
    Deny,
}

/// A live on-screen rendering context
pub trait DisplaySurface {
    /// Start navigating to `url`; the outcome arrives as a load event
    fn load(&mut self, url: &str) -> Result<()>;

    /// Reload the current page
    fn reload(&mut self) -> Result<()>;

    /// Apply a style sheet to the loaded page verbatim
    fn inject_style(&mut self, stylesheet: &str) -> Result<()>;

    /// Apply the gate's decision for an intercepted key press
    fn resolve_input(&mut self, input: &KeyInput, verdict: InputVerdict);

    /// Answer a window-open request from the page
    fn resolve_window_open(&mut self, url: &str, decision: WindowOpenDecision);

    /// Tear the surface down; no events are delivered afterwards
    fn close(&mut self);
}

/// Creates display surfaces
pub trait HostRuntime {
    type Surface: DisplaySurface;

    fn create_surface(
        &mut self,
        options: &SurfaceOptions,
        events: EventSender,
    ) -> Result<Self::Surface>;
}
