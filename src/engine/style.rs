//! Style rule synthesis.
//!
//! Style-routed overrides (`css`, `background`, `image`) become one CSS text
//! blob injected into `<head>`. Every declaration carries `!important` so it
//! beats page-authored CSS; rule order follows override list order so the
//! normal cascade resolves ties in favor of later overrides.
//!
//! Selector and value text is trusted input from the platform and is not
//! escaped or validated here.

use crate::overrides::{ContentOverride, OverrideValue};
use serde_json::Value;
use std::fmt::Write;

/// Render a css declaration value. String values appear bare; other JSON
/// values keep their display form (numbers, bools).
fn css_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Synthesize the CSS blob for an override list, in list order.
///
/// Returns an empty string when no override contributes a rule.
pub fn synthesize(overrides: &[ContentOverride]) -> String {
    let mut rules = Vec::new();

    for o in overrides {
        if o.selector.trim().is_empty() {
            continue;
        }
        match &o.value {
            OverrideValue::Css(map) if !map.is_empty() => {
                let mut decls = String::new();
                for (i, (prop, val)) in map.iter().enumerate() {
                    if i > 0 {
                        decls.push_str("; ");
                    }
                    write!(decls, "{prop}: {} !important", css_value(val)).ok();
                }
                rules.push(format!("{} {{ {decls}; }}", o.selector));
            }
            OverrideValue::Background(url) => {
                rules.push(format!(
                    "{} {{ background-image: url({url}) !important; }}",
                    o.selector
                ));
            }
            // The :not(img) guard keeps this off <img> elements, which get a
            // real src rewrite instead; non-image elements get a background.
            OverrideValue::Image(url) => {
                rules.push(format!(
                    "{}:not(img) {{ background-image: url({url}) !important; }}",
                    o.selector
                ));
            }
            _ => {}
        }
    }

    rules.join("\n")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::ContentOverride;

    #[test]
    fn test_css_rule_exact_format() {
        let o = ContentOverride::css(".hero", [("color", "red"), ("font-size", "2px")]);
        assert_eq!(
            synthesize(&[o]),
            ".hero { color: red !important; font-size: 2px !important; }"
        );
    }

    #[test]
    fn test_background_rule() {
        let o = ContentOverride::background("#banner", "/img/bg.png");
        assert_eq!(
            synthesize(&[o]),
            "#banner { background-image: url(/img/bg.png) !important; }"
        );
    }

    #[test]
    fn test_image_rule_excludes_img_elements() {
        let o = ContentOverride::image(r#"[data-content="hero-img"]"#, "/a.jpg");
        assert_eq!(
            synthesize(&[o]),
            r#"[data-content="hero-img"]:not(img) { background-image: url(/a.jpg) !important; }"#
        );
    }

    #[test]
    fn test_rule_order_follows_list_order() {
        let a = ContentOverride::css(".x", [("color", "red")]);
        let b = ContentOverride::css(".x", [("color", "blue")]);
        assert_eq!(
            synthesize(&[a, b]),
            ".x { color: red !important; }\n.x { color: blue !important; }"
        );
    }

    #[test]
    fn test_non_style_overrides_contribute_nothing() {
        let list = [
            ContentOverride::text(".x", "Hi"),
            ContentOverride::html(".y", "<b>Hi</b>"),
            ContentOverride::relocate(".z"),
            ContentOverride::css(".w", Vec::<(String, String)>::new()),
        ];
        assert_eq!(synthesize(&list), "");
    }

    #[test]
    fn test_numeric_css_value() {
        let o = ContentOverride {
            selector: ".x".into(),
            value: crate::overrides::OverrideValue::Css(
                [("z-index".to_string(), serde_json::json!(40))]
                    .into_iter()
                    .collect(),
            ),
        };
        assert_eq!(synthesize(&[o]), ".x { z-index: 40 !important; }");
    }
}
