//! CSS selector validation
//!
//! A conservative structural filter, not a CSS parser: it may reject exotic
//! but valid selectors, and it must never accept anything that can break out
//! of the rule it is spliced into.

use std::fmt;

use thiserror::Error;

/// A selector that passed [`validate`] and is safe to splice into a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSelector(String);

impl ValidatedSelector {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a selector candidate was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorRejection {
    #[error("selector is empty")]
    Empty,
    #[error("selector contains forbidden character '{0}'")]
    ForbiddenChar(char),
    #[error("selector contains a comment delimiter")]
    Comment,
    #[error("selector contains an at-rule marker '@'")]
    AtRule,
    #[error("selector must start with '.', '#', '[', ':', '*' or a letter, found '{0}'")]
    InvalidStart(char),
    #[error("selector has unbalanced '{open}' and '{close}'")]
    Unbalanced { open: char, close: char },
}

/// Characters that terminate a declaration block or start an escape
const FORBIDDEN_CHARS: [char; 4] = [';', '{', '}', '\\'];

/// Validate a raw selector; the accepted token is the trimmed input
pub fn validate(candidate: &str) -> Result<ValidatedSelector, SelectorRejection> {
    let selector = candidate.trim();
    let Some(first) = selector.chars().next() else {
        return Err(SelectorRejection::Empty);
    };

    if let Some(c) = selector.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(SelectorRejection::ForbiddenChar(c));
    }
    if selector.contains("/*") || selector.contains("*/") {
        return Err(SelectorRejection::Comment);
    }
    if selector.contains('@') {
        return Err(SelectorRejection::AtRule);
    }

    if !(matches!(first, '.' | '#' | '[' | ':' | '*') || first.is_ascii_alphabetic()) {
        return Err(SelectorRejection::InvalidStart(first));
    }

    for (open, close) in [('[', ']'), ('(', ')')] {
        let opened = selector.matches(open).count();
        let closed = selector.matches(close).count();
        if opened != closed {
            return Err(SelectorRejection::Unbalanced { open, close });
        }
    }

    Ok(ValidatedSelector(selector.to_string()))
}
