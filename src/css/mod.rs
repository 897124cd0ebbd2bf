//! Presentation overrides for the embedded page
//!
//! Raw selectors from the config file pass through [`selector::validate`]
//! before [`layout`] splices them into the injected style sheet.

pub mod layout;
pub mod selector;

pub use layout::LayoutOverride;
