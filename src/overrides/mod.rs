//! Content override model.
//!
//! A `ContentOverride` is a declarative instruction produced by the visual
//! editor: replace or restyle the part of a rendered page that a CSS-like
//! selector identifies. Overrides arrive as an ordered list per page; list
//! order is the only priority signal, later entries win.

pub mod source;

use serde::Deserialize;
use serde_json::Value;

// =============================================================================
// Override Value
// =============================================================================

/// The payload of an override, keyed by the wire `type` field.
///
/// Unrecognized or malformed payloads become `Unknown` so a single bad
/// record never poisons the rest of the list.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideValue {
    /// Replace element text content (always literal text, never markup).
    Text(String),
    /// Replace element inner content, interpreted as markup.
    Html(String),
    /// New image source; also applied as a background-image to non-img targets.
    Image(String),
    /// Background image URL, applied via style injection.
    Background(String),
    /// CSS property -> value declarations, applied via style injection.
    /// Declaration order is preserved (serde_json `preserve_order`).
    Css(serde_json::Map<String, Value>),
    /// Relocate the element. Only the client script can do this.
    Move,
    /// Unrecognized `type` - carried but ignored everywhere.
    Unknown,
}

impl OverrideValue {
    /// Wire name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Html(_) => "html",
            Self::Image(_) => "image",
            Self::Background(_) => "background",
            Self::Css(_) => "css",
            Self::Move => "move",
            Self::Unknown => "unknown",
        }
    }
}

// =============================================================================
// Content Override
// =============================================================================

/// One editor-authored override: a selector plus a typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOverride {
    /// CSS-like expression identifying target elements.
    pub selector: String,
    /// Typed payload.
    pub value: OverrideValue,
}

impl ContentOverride {
    pub fn text(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            value: OverrideValue::Text(value.into()),
        }
    }

    pub fn html(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            value: OverrideValue::Html(value.into()),
        }
    }

    pub fn image(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            value: OverrideValue::Image(value.into()),
        }
    }

    pub fn background(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            value: OverrideValue::Background(value.into()),
        }
    }

    /// Build a `css` override from (property, value) pairs, preserving order.
    pub fn css<K, V>(selector: impl Into<String>, declarations: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = declarations
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        Self {
            selector: selector.into(),
            value: OverrideValue::Css(map),
        }
    }

    pub fn relocate(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            value: OverrideValue::Move,
        }
    }
}

// =============================================================================
// Wire Deserialization
// =============================================================================

/// Raw wire shape: `{selector, type, value}` with `value` untyped.
#[derive(Deserialize)]
struct RawOverride {
    #[serde(default)]
    selector: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: Option<Value>,
}

impl<'de> Deserialize<'de> for ContentOverride {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawOverride::deserialize(deserializer)?;
        Ok(Self::from(raw))
    }
}

impl From<RawOverride> for ContentOverride {
    fn from(raw: RawOverride) -> Self {
        let as_string = |v: &Option<Value>| -> Option<String> {
            v.as_ref().and_then(Value::as_str).map(str::to_owned)
        };

        let value = match raw.kind.as_str() {
            "text" => as_string(&raw.value).map_or(OverrideValue::Unknown, OverrideValue::Text),
            "html" => as_string(&raw.value).map_or(OverrideValue::Unknown, OverrideValue::Html),
            "image" => as_string(&raw.value).map_or(OverrideValue::Unknown, OverrideValue::Image),
            "background" => {
                as_string(&raw.value).map_or(OverrideValue::Unknown, OverrideValue::Background)
            }
            // A non-object css payload is kept as an empty declaration map,
            // which the classifier skips.
            "css" => match raw.value {
                Some(Value::Object(map)) => OverrideValue::Css(map),
                _ => OverrideValue::Css(serde_json::Map::new()),
            },
            "move" => OverrideValue::Move,
            _ => OverrideValue::Unknown,
        };

        Self {
            selector: raw.selector,
            value,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
