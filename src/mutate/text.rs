//! Fallback string mutator.
//!
//! Whole-document text transform for hosts where the event stream is not
//! available. Requires the complete HTML in memory and scans it once per
//! override, in list order.
//!
//! Only marker-attribute equality (`[data-content="key"]`) is matched
//! structurally here - tag/class/id matching without a real parse risks
//! false positives inside comments, attribute values and script bodies, so
//! the capability descriptor declines simple selectors and the classifier
//! routes those to the client script.
//!
//! Known, contractual limitation: span matching is not nesting-aware. The
//! replacement span runs from the opening tag to the *first* same-tag-name
//! closing tag, so a same-named descendant truncates it. The client script
//! shares this behavior; do not "fix" it here without fixing it there.

use crate::engine::classify::MutatorCapabilities;
use crate::engine::plan::{Action, RewritePlan};
use crate::engine::selector::SimpleSelector;
use crate::mutate::StructuralMutator;
use crate::utils::html::escape;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(\s)src\s*=\s*("[^"]*"|'[^']*')"#).unwrap());
static SRCSET_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\s+srcset\s*=\s*("[^"]*"|'[^']*')"#).unwrap());

/// Whole-document string mutator.
pub struct FallbackStringMutator;

impl StructuralMutator for FallbackStringMutator {
    fn capabilities(&self) -> MutatorCapabilities {
        MutatorCapabilities {
            supports_simple_selectors: false,
        }
    }

    fn rewrite(&self, html: &str, plan: &RewritePlan) -> Result<String> {
        let mut out = html.to_string();

        for op in &plan.ops {
            // Plans built with this mutator's capabilities only carry
            // marker-attribute ops; anything else is ignored defensively.
            let SimpleSelector::AttrEq { name, value: key } = &op.matcher else {
                continue;
            };
            out = match &op.action {
                Action::SetText(v) => replace_tag_span(&out, name, key, &escape(v))?,
                Action::SetHtml(v) => replace_tag_span(&out, name, key, v)?,
                Action::SetImageSrc(v) => rewrite_img_tags(&out, name, key, v)?,
            };
        }

        Ok(inject_head(&out, &plan.head.render()))
    }
}

// =============================================================================
// Span Replacement
// =============================================================================

/// Opening tags carrying `attr="key"`, attribute order independent,
/// exact quoted value only.
fn open_tag_regex(attr: &str, key: &str) -> Result<Regex> {
    let pattern = format!(
        r#"(?i)<([a-z][a-z0-9-]*)\s[^>]*{}\s*=\s*["']{}["'][^>]*>"#,
        regex::escape(attr),
        regex::escape(key),
    );
    Regex::new(&pattern).context("building marker-attribute pattern")
}

/// Replace the content between each matching opening tag and the nearest
/// same-tag-name closing tag. Not nesting-aware by contract.
fn replace_tag_span(html: &str, attr: &str, key: &str, replacement: &str) -> Result<String> {
    let open = open_tag_regex(attr, key)?;

    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(caps) = open.captures_at(html, cursor) {
        let m = caps.get(0).expect("whole match");
        let tag = caps.get(1).expect("tag capture").as_str();

        // Nearest same-tag-name close after the opening tag.
        let close = Regex::new(&format!(r"(?i)</{}\s*>", regex::escape(tag)))
            .context("building close-tag pattern")?;
        let Some(c) = close.find(&html[m.end()..]) else {
            // No close tag: leave this occurrence untouched.
            out.push_str(&html[cursor..m.end()]);
            cursor = m.end();
            continue;
        };

        out.push_str(&html[cursor..m.end()]);
        out.push_str(replacement);
        out.push_str(&html[m.end() + c.start()..m.end() + c.end()]);
        cursor = m.end() + c.end();
    }

    out.push_str(&html[cursor..]);
    Ok(out)
}

/// Within each `<img>` tag carrying `attr="key"`: replace the `src` value
/// and strip `srcset`. Attribute order within the tag does not matter.
fn rewrite_img_tags(html: &str, attr: &str, key: &str, src: &str) -> Result<String> {
    let pattern = format!(
        r#"(?i)<img\s[^>]*{}\s*=\s*["']{}["'][^>]*>"#,
        regex::escape(attr),
        regex::escape(key),
    );
    let img = Regex::new(&pattern).context("building img pattern")?;
    let new_src = format!(r#"src="{}""#, escape(src));

    let out = img.replace_all(html, |caps: &regex::Captures<'_>| {
        let tag = caps.get(0).expect("whole match").as_str();
        let tag = SRC_ATTR.replace(tag, |c: &regex::Captures<'_>| {
            format!("{}{new_src}", &c[1])
        });
        SRCSET_ATTR.replace(&tag, "").into_owned()
    });
    Ok(out.into_owned())
}

/// Insert the head block before the document's first `</head>`.
/// Documents without a `<head>` are left unsignaled.
fn inject_head(html: &str, block: &str) -> String {
    const PATTERN: &[u8] = b"</head>";

    let Some(pos) = html
        .as_bytes()
        .windows(PATTERN.len())
        .position(|w| w.eq_ignore_ascii_case(PATTERN))
    else {
        return html.to_string();
    };

    let mut out = String::with_capacity(html.len() + block.len());
    out.push_str(&html[..pos]);
    out.push_str(block);
    out.push_str(&html[pos..]);
    out
}

// =============================================================================
// Tests
// =============================================================================
