//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Timing of the recovery loop, layout pass and reload chains
pub mod timing {
    use std::time::Duration;

    /// Delay before re-issuing a failed navigation
    pub const LOAD_RETRY_DELAY: Duration = Duration::from_secs(5);

    /// Default delay between load-complete and layout injection (ms)
    pub const DEFAULT_LAYOUT_SETTLE_MS: u64 = 500;

    /// Re-poll interval while the schedule is off with no off-interval
    pub const SCHEDULE_RECHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);

    /// A reload older than this is no longer considered in flight
    pub const RELOAD_IN_FLIGHT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Reachability check timeout used by the browser host
    pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(3);

    /// Grace period before a superseded browser gets SIGKILL
    pub const BROWSER_TERM_GRACE: Duration = Duration::from_secs(2);

    /// How often a browser supervisor checks its child
    pub const SUPERVISOR_POLL: Duration = Duration::from_millis(100);
}

/// Keyboard handling for the escape-hatch gate
pub mod keys {
    /// Fullscreen toggle, always allowed for on-site testing
    pub const FULLSCREEN_TOGGLE: &str = "F11";

    /// OS close-window function key (blocked with Alt)
    pub const CLOSE_WINDOW: &str = "F4";

    /// Keys blocked while Ctrl/Cmd is held (compared lowercase)
    pub const CTRL_DENY_LIST: [&str; 4] = ["q", "w", "r", "f4"];

    /// Default secret letter for Ctrl+Shift+<letter> debug exit
    pub const DEFAULT_DEBUG_EXIT: &str = "x";
}

/// Input event constants (from evdev)
pub mod input {
    /// Key release event value
    pub const KEY_RELEASE: i32 = 0;

    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Name of the uinput keyboard that re-emits allowed keys
    pub const VIRTUAL_KEYBOARD_NAME: &str = "camera-kiosk keyboard";
}

/// Defaults applied when the config file omits a field
pub mod defaults {
    pub const URL: &str = "http://localhost:8080";
    pub const ZOOM_LEVEL: f64 = 1.0;
    pub const GRID_COLUMNS: u32 = 4;
    pub const ACTIVE_START_HOUR: u32 = 7;
    pub const ACTIVE_END_HOUR: u32 = 22;
    pub const ACTIVE_INTERVAL_MS: u64 = 3_600_000;
    pub const OFF_INTERVAL_MS: u64 = 0;
}

/// Validation limits for config values
pub mod validation {
    /// Hours are wall-clock values in [0, 24)
    pub const HOURS_PER_DAY: u32 = 24;

    /// Upper bound on grid columns; larger values are clamped
    pub const MAX_GRID_COLUMNS: u32 = 64;
}

/// Display surface geometry
pub mod surface {
    pub const WIDTH: u32 = 1920;
    pub const HEIGHT: u32 = 1080;
    pub const BACKGROUND: &str = "#000000";
}

/// File and directory names
pub mod paths {
    /// Application directory under the XDG config/data dirs
    pub const APP_DIR: &str = "camera-kiosk";

    /// Config filename
    pub const CONFIG_FILENAME: &str = "config.json";

    /// Log filename
    pub const LOG_FILENAME: &str = "kiosk.log";

    /// Browser profile directory name
    pub const PROFILE_DIR: &str = "profile";

    /// Linux input device directory
    pub const DEV_INPUT: &str = "/dev/input";
}

/// External browser host
pub mod browser {
    /// Browser executable when `--browser` is not given
    pub const DEFAULT_COMMAND: &str = "firefox";

    /// Preferences file inside the profile
    pub const USER_JS: &str = "user.js";

    /// Directory holding user style sheets inside the profile
    pub const CHROME_DIR: &str = "chrome";

    /// User style sheet applied to every page
    pub const USER_CONTENT_CSS: &str = "userContent.css";

    /// Total connection limit; a camera grid holds one stream per tile
    pub const MAX_CONNECTIONS: u32 = 1024;

    /// Per-host persistent connection limit (the browser clamps it to 255)
    pub const MAX_CONNECTIONS_PER_SERVER: u32 = 255;
}

/// Permission-related constants
pub mod permissions {
    /// Linux input group name
    pub const INPUT_GROUP: &str = "input";

    /// Command to add user to input group
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";
}
