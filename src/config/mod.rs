//! Configuration management for the kiosk
//!
//! - **kiosk**: top-level `KioskConfig` loaded once from JSON at startup
//! - **schedule**: time-of-day reload window settings

pub mod kiosk;
pub mod schedule;

// Re-export commonly used types
pub use kiosk::KioskConfig;
pub use schedule::ScheduleConfig;
