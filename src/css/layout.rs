//! Layout override style sheet
//!
//! Turns the camera page's legacy markup into a full-screen grid. The template
//! is fixed; only three values are substituted: extra hide-selectors (already
//! validated), the grid column count and the page zoom.

use tracing::warn;

use super::selector::{self, SelectorRejection, ValidatedSelector};
use crate::config::KioskConfig;
use crate::constants::{defaults, validation};

/// Sanitized numeric parameters for the style sheet template
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    grid_columns: u32,
    zoom_level: f64,
}

impl LayoutParams {
    /// Build params from raw config values, replacing invalid ones with defaults
    pub fn new(grid_columns: f64, zoom_level: f64) -> Self {
        Self {
            grid_columns: sanitize_grid_columns(grid_columns),
            zoom_level: sanitize_zoom_level(zoom_level),
        }
    }

    pub fn grid_columns(&self) -> u32 {
        self.grid_columns
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom_level
    }
}

/// Column count must be a whole number >= 1; anything else becomes the default
pub fn sanitize_grid_columns(raw: f64) -> u32 {
    if !raw.is_finite() || raw < 1.0 || raw.fract() != 0.0 {
        return defaults::GRID_COLUMNS;
    }
    (raw as u32).min(validation::MAX_GRID_COLUMNS)
}

/// Zoom must be finite and positive; anything else becomes 1.0
pub fn sanitize_zoom_level(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        defaults::ZOOM_LEVEL
    }
}

/// A config selector that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSelector {
    pub literal: String,
    pub reason: SelectorRejection,
}

/// The finished style sheet plus the selectors that were dropped building it
#[derive(Debug, Clone)]
pub struct LayoutOverride {
    pub stylesheet: String,
    pub rejected: Vec<RejectedSelector>,
}

impl LayoutOverride {
    /// Validate the configured hide-selectors and build the style sheet
    ///
    /// Each rejected selector is logged with its literal value.
    pub fn from_config(config: &KioskConfig) -> Self {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for literal in &config.hide_selectors {
            match selector::validate(literal) {
                Ok(valid) => accepted.push(valid),
                Err(reason) => {
                    warn!(selector = %literal, reason = %reason, "Rejected invalid CSS selector");
                    rejected.push(RejectedSelector {
                        literal: literal.clone(),
                        reason,
                    });
                }
            }
        }

        let params = LayoutParams::new(config.grid_columns, config.zoom_level);
        Self {
            stylesheet: build(&params, &accepted),
            rejected,
        }
    }
}

/// Render the layout template
pub fn build(params: &LayoutParams, selectors: &[ValidatedSelector]) -> String {
    let extra_hidden: String = selectors
        .iter()
        .map(|s| format!(", {s}"))
        .collect();
    let columns = params.grid_columns;
    let zoom = params.zoom_level;

    format!(
        r#"
/* page chrome */
header, .header, #header, .navbar, #navbar, .menu, #menu, .top-bar, #top-bar{extra_hidden} {{
    display: none !important;
}}

/* motion control links above the preview */
body > b, body > a:not(#id_preview a) {{
    display: none !important;
}}

body {{
    margin: 0 !important;
    padding: 0 !important;
    overflow: hidden !important;
}}

/* camera grid */
#id_preview {{
    display: grid !important;
    grid-template-columns: repeat({columns}, 1fr) !important;
    gap: 10px !important;
    padding: 10px !important;
    width: 100% !important;
    box-sizing: border-box !important;
    margin: 0 !important;
}}

#id_preview a {{
    width: 100% !important;
    height: auto !important;
    display: block !important;
}}

/* the page hardcodes width=25% on every feed */
#id_preview img {{
    width: 100% !important;
    height: auto !important;
    max-width: none !important;
    max-height: none !important;
    display: block !important;
    border: 2px solid white !important;
    border-radius: 4px;
}}

.main-content {{
    padding: 0 !important;
    margin: 0 !important;
    width: 100% !important;
}}

.main-content br {{
    display: none !important;
}}

html {{
    zoom: {zoom} !important;
}}
"#
    )
}
