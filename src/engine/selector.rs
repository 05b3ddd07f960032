//! Selector shape classification.
//!
//! The engine never implements the full CSS selector grammar. It only needs
//! to know which of three shapes a selector falls into, because the shape
//! decides which mutation substrate can honor it:
//!
//! - `DataContent` - attribute equality on the editable-region marker
//!   attribute with an exact quoted value; both mutators support it.
//! - `Simple` - a single tag/class/id/attribute selector; only the
//!   tree-aware streaming mutator supports it.
//! - `Complex` - combinators, pseudo-classes, or anything else we cannot
//!   match without a real selector engine; always deferred to the client.

use regex::Regex;
use std::sync::LazyLock;

/// Combinators and pseudo-classes the server-side mutators never handle.
static COMPLEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[>+~ ]|:nth|:not|:first|:last|:has").unwrap());

// =============================================================================
// Simple Selector
// =============================================================================

/// A single-step selector the streaming mutator can match per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    /// `div` - tag name, case-insensitive.
    Tag(String),
    /// `.hero` - one class among the element's class list.
    Class(String),
    /// `#cta` - exact id.
    Id(String),
    /// `[attr]` - attribute presence.
    AttrExists(String),
    /// `[attr="val"]` - exact attribute value.
    AttrEq { name: String, value: String },
}

impl SimpleSelector {
    /// Parse a single-step selector. Returns `None` for anything compound
    /// (`div.hero`), combined, or otherwise outside the supported grammar.
    pub fn parse(selector: &str) -> Option<Self> {
        let s = selector.trim();

        if let Some(class) = s.strip_prefix('.') {
            return is_ident(class).then(|| Self::Class(class.to_string()));
        }
        if let Some(id) = s.strip_prefix('#') {
            return is_ident(id).then(|| Self::Id(id.to_string()));
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return parse_attr(inner);
        }
        if !s.is_empty() && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) && is_ident(s)
        {
            return Some(Self::Tag(s.to_ascii_lowercase()));
        }
        None
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn parse_attr(inner: &str) -> Option<SimpleSelector> {
    match inner.split_once('=') {
        Some((name, raw)) => {
            let name = name.trim();
            let value = unquote(raw.trim());
            is_ident(name).then(|| SimpleSelector::AttrEq {
                name: name.to_string(),
                value: value.to_string(),
            })
        }
        None => {
            let name = inner.trim();
            is_ident(name).then(|| SimpleSelector::AttrExists(name.to_string()))
        }
    }
}

fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

// =============================================================================
// Selector Shape
// =============================================================================

/// What a selector can safely target in HTML text/stream form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorShape {
    /// `[data-content="key"]` - supported by both mutators.
    DataContent { key: String },
    /// Single-step selector - streaming mutator only.
    Simple(SimpleSelector),
    /// Everything else - client fallback only.
    Complex,
}

/// Classify a selector against the configured marker attribute.
///
/// Total: every input maps to a shape. Selectors outside the supported
/// grammar (compound steps, unknown pseudo-classes) are `Complex`, which
/// fails open toward the client script.
pub fn shape(selector: &str, data_attr: &str) -> SelectorShape {
    if COMPLEX.is_match(selector) {
        return SelectorShape::Complex;
    }
    match SimpleSelector::parse(selector) {
        Some(SimpleSelector::AttrEq { name, value }) if name == data_attr => {
            SelectorShape::DataContent { key: value }
        }
        Some(simple) => SelectorShape::Simple(simple),
        None => SelectorShape::Complex,
    }
}

// =============================================================================
// Tests
// =============================================================================
