//! Streaming tree-aware mutator.
//!
//! Processes the document as a single incremental pass of open-tag /
//! close-tag / text events - no parse tree is ever materialized, and output
//! is produced as input arrives. Because it sees real element boundaries it
//! can match simple tag/class/id selectors without the false positives a
//! text-level scan would hit inside comments, attribute values or script
//! bodies, so its capability descriptor advertises simple-selector support.
//!
//! Content replacement is nesting-aware: inner events are consumed with a
//! depth counter until the element's own close tag.

use crate::engine::classify::MutatorCapabilities;
use crate::engine::plan::{Action, RewritePlan};
use crate::engine::selector::SimpleSelector;
use crate::mutate::StructuralMutator;
use crate::utils::html::is_void_element;
use anyhow::{Context, Result};
use quick_xml::{
    Reader, Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};
use std::io::{BufRead, Write};

/// Tree-aware streaming mutator.
pub struct EdgeStreamMutator;

impl EdgeStreamMutator {
    /// Rewrite incrementally from `input` into `output`.
    ///
    /// The whole document is never buffered; callers can drive this with
    /// response bytes as they arrive.
    pub fn rewrite_stream<R: BufRead, W: Write>(
        &self,
        input: R,
        output: W,
        plan: &RewritePlan,
    ) -> Result<()> {
        let mut reader = Reader::from_reader(input);
        // HTML close tags routinely mismatch XML expectations (void
        // elements, case differences); we track pairing ourselves.
        reader.config_mut().check_end_names = false;

        let mut writer = Writer::new(output);
        let mut buf = Vec::new();
        let mut head_done = false;

        loop {
            buf.clear();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = tag_name(&e);
                    let is_void = is_void_element(&tag);

                    // Matching ops fire in registration order; for content
                    // replacement the last matching override wins.
                    let mut content: Option<Action> = None;
                    let mut image_src: Option<String> = None;
                    for op in &plan.ops {
                        if !matches(&op.matcher, &tag, &e) {
                            continue;
                        }
                        match &op.action {
                            Action::SetText(_) | Action::SetHtml(_) if !is_void => {
                                content = Some(op.action.clone());
                            }
                            Action::SetImageSrc(src) if tag == "img" => {
                                image_src = Some(src.clone());
                            }
                            _ => {}
                        }
                    }

                    if let Some(src) = image_src {
                        writer.write_event(Event::Start(rewrite_img_tag(&e, &src)))?;
                    } else {
                        writer.write_event(Event::Start(e))?;
                    }

                    if let Some(action) = content {
                        match &action {
                            Action::SetText(v) => {
                                writer.write_event(Event::Text(BytesText::new(v)))?;
                            }
                            Action::SetHtml(v) => {
                                writer
                                    .write_event(Event::Text(BytesText::from_escaped(v.as_str())))?;
                            }
                            Action::SetImageSrc(_) => unreachable!("img edits never replace content"),
                        }
                        if let Some(end) = consume_element_content(&mut reader, &tag)? {
                            writer.write_event(Event::End(end))?;
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let tag = tag_name(&e);
                    let image_src = plan.ops.iter().rev().find_map(|op| match &op.action {
                        Action::SetImageSrc(src)
                            if tag == "img" && matches(&op.matcher, &tag, &e) =>
                        {
                            Some(src.clone())
                        }
                        _ => None,
                    });
                    match image_src {
                        Some(src) => {
                            writer.write_event(Event::Empty(rewrite_img_tag(&e, &src)))?;
                        }
                        None => writer.write_event(Event::Empty(e))?,
                    }
                }
                Ok(Event::End(e)) => {
                    if !head_done && e.name().as_ref().eq_ignore_ascii_case(b"head") {
                        writer.write_event(Event::Text(BytesText::from_escaped(
                            plan.head.render(),
                        )))?;
                        head_done = true;
                    }
                    writer.write_event(Event::End(e))?;
                }
                Ok(Event::Eof) => break,
                Ok(event) => writer.write_event(event)?,
                Err(e) => anyhow::bail!(
                    "markup parse error at byte {}: {e}",
                    reader.error_position()
                ),
            }
        }

        Ok(())
    }
}

impl StructuralMutator for EdgeStreamMutator {
    fn capabilities(&self) -> MutatorCapabilities {
        MutatorCapabilities {
            supports_simple_selectors: true,
        }
    }

    fn rewrite(&self, html: &str, plan: &RewritePlan) -> Result<String> {
        let mut out = Vec::with_capacity(html.len() + 256);
        self.rewrite_stream(html.as_bytes(), &mut out, plan)?;
        String::from_utf8(out).context("rewritten document is not valid UTF-8")
    }
}

// =============================================================================
// Element Matching
// =============================================================================

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn attr_value(e: &BytesStart<'_>, name: &str) -> Option<String> {
    for attr in e.attributes().with_checks(false).flatten() {
        if attr.key.as_ref().eq_ignore_ascii_case(name.as_bytes()) {
            return Some(match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            });
        }
    }
    None
}

fn has_attr(e: &BytesStart<'_>, name: &str) -> bool {
    e.attributes()
        .with_checks(false)
        .flatten()
        .any(|a| a.key.as_ref().eq_ignore_ascii_case(name.as_bytes()))
}

fn matches(matcher: &SimpleSelector, tag: &str, e: &BytesStart<'_>) -> bool {
    match matcher {
        SimpleSelector::Tag(t) => t == tag,
        SimpleSelector::Class(class) => attr_value(e, "class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == class)),
        SimpleSelector::Id(id) => attr_value(e, "id").as_deref() == Some(id.as_str()),
        SimpleSelector::AttrExists(name) => has_attr(e, name),
        SimpleSelector::AttrEq { name, value } => {
            attr_value(e, name).as_deref() == Some(value.as_str())
        }
    }
}

// =============================================================================
// Mutation Helpers
// =============================================================================

/// Rebuild an `<img>` open tag with `src` replaced and `srcset` dropped.
/// Other attributes keep their order and values.
fn rewrite_img_tag(e: &BytesStart<'_>, src: &str) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut wrote_src = false;

    for attr in e.attributes().with_checks(false).flatten() {
        let key = attr.key.as_ref();
        if key.eq_ignore_ascii_case(b"srcset") {
            continue;
        }
        if key.eq_ignore_ascii_case(b"src") {
            out.push_attribute(("src", src));
            wrote_src = true;
        } else {
            out.push_attribute(attr);
        }
    }
    if !wrote_src {
        out.push_attribute(("src", src));
    }
    out
}

/// Drop everything up to (not including) the element's own close tag.
///
/// Depth-tracks nested elements so a same-named descendant never truncates
/// the replacement. Void elements open nothing; a stray close tag at depth
/// zero that is not ours belongs to the replaced content and is dropped.
/// Returns `None` when the document ends before the element closes.
fn consume_element_content<R: BufRead>(
    reader: &mut Reader<R>,
    tag: &str,
) -> Result<Option<BytesEnd<'static>>> {
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(s)) => {
                if !is_void_element(&tag_name(&s)) {
                    depth += 1;
                }
            }
            Ok(Event::End(end)) => {
                if depth > 0 {
                    depth -= 1;
                } else if end.name().as_ref().eq_ignore_ascii_case(tag.as_bytes()) {
                    return Ok(Some(end.into_owned()));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => anyhow::bail!(
                "markup parse error at byte {}: {e}",
                reader.error_position()
            ),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::ContentOverride;

    const ATTR: &str = "data-content";

    fn rewrite(html: &str, overrides: &[ContentOverride]) -> String {
        let mutator = EdgeStreamMutator;
        let plan = RewritePlan::build(overrides, mutator.capabilities(), ATTR);
        mutator.rewrite(html, &plan).expect("rewrite should succeed")
    }

    #[test]
    fn test_text_replacement_is_literal_and_keeps_attributes() {
        let html = r#"<html><head></head><body><h1 data-content="title" class="big">Old <b>bold</b></h1></body></html>"#;
        let out = rewrite(
            html,
            &[ContentOverride::text(
                r#"[data-content="title"]"#,
                "Hello & Welcome",
            )],
        );
        assert!(out.contains(r#"<h1 data-content="title" class="big">Hello &amp; Welcome</h1>"#));
        assert!(!out.contains("Old"));
    }

    #[test]
    fn test_html_replacement_is_raw_markup() {
        let html = r#"<html><head></head><body><div data-content="promo">x</div></body></html>"#;
        let out = rewrite(
            html,
            &[ContentOverride::html(
                r#"[data-content="promo"]"#,
                "<strong>Sale</strong>",
            )],
        );
        assert!(out.contains(r#"<div data-content="promo"><strong>Sale</strong></div>"#));
    }

    #[test]
    fn test_replacement_is_nesting_aware() {
        // A same-named descendant must not truncate the replaced span.
        let html = concat!(
            r#"<html><head></head><body>"#,
            r#"<div data-content="card">keep out<div>inner</div>tail</div><p>after</p>"#,
            r#"</body></html>"#
        );
        let out = rewrite(
            html,
            &[ContentOverride::text(r#"[data-content="card"]"#, "New")],
        );
        assert!(out.contains(r#"<div data-content="card">New</div><p>after</p>"#));
        assert!(!out.contains("inner"));
        assert!(!out.contains("tail"));
    }

    #[test]
    fn test_simple_selectors_match_structurally() {
        let html = r#"<html><head></head><body><h1 id="headline">Old</h1><p class="lead intro">Lede</p></body></html>"#;
        let out = rewrite(
            html,
            &[
                ContentOverride::text("#headline", "New headline"),
                ContentOverride::text(".lead", "New lede"),
            ],
        );
        assert!(out.contains(r#"<h1 id="headline">New headline</h1>"#));
        assert!(out.contains(r#"<p class="lead intro">New lede</p>"#));
    }

    #[test]
    fn test_tag_selector_does_not_fire_inside_comments() {
        let html = "<html><head></head><body><!-- <h1>fake</h1> --><h1>real</h1></body></html>";
        let out = rewrite(html, &[ContentOverride::text("h1", "New")]);
        assert!(out.contains("<!-- <h1>fake</h1> -->"));
        assert!(out.contains("<h1>New</h1>"));
    }

    #[test]
    fn test_img_src_set_and_srcset_removed() {
        let html = r#"<html><head></head><body><img data-content="hero-img" src="/old.jpg" srcset="/old-2x.jpg 2x" alt="hero"/></body></html>"#;
        let out = rewrite(
            html,
            &[ContentOverride::image(r#"[data-content="hero-img"]"#, "/a.jpg")],
        );
        assert!(out.contains(r#"src="/a.jpg""#));
        assert!(!out.contains("srcset"));
        assert!(out.contains(r#"alt="hero""#));
    }

    #[test]
    fn test_img_without_self_closing_slash() {
        let html = r#"<html><head></head><body><img data-content="pic" src="/old.png"></body></html>"#;
        let out = rewrite(
            html,
            &[ContentOverride::image(r#"[data-content="pic"]"#, "/new.png")],
        );
        assert!(out.contains(r#"src="/new.png""#));
    }

    #[test]
    fn test_last_override_wins_per_element() {
        let html = r#"<html><head></head><body><h1 data-content="t">Old</h1></body></html>"#;
        let out = rewrite(
            html,
            &[
                ContentOverride::text(r#"[data-content="t"]"#, "first"),
                ContentOverride::text(r#"[data-content="t"]"#, "second"),
            ],
        );
        assert!(out.contains("second"));
        assert!(!out.contains("first"));
    }

    #[test]
    fn test_head_injection_happens_once() {
        let html = "<html><head><title>T</title></head><body></body></html>";
        let out = rewrite(html, &[ContentOverride::css(".x", [("color", "red")])]);
        assert_eq!(out.matches("devtools-edge-rewrite").count(), 1);
        assert!(out.contains("<style data-devtools-overrides>"));
        assert!(out.contains(".x { color: red !important; }"));
        // Injected before the head close, after existing children.
        let style_pos = out.find("<style").unwrap();
        let head_close = out.find("</head>").unwrap();
        assert!(style_pos < head_close);
    }

    #[test]
    fn test_partial_marker_present_when_fallback_needed() {
        let html = "<html><head></head><body></body></html>";
        let out = rewrite(html, &[ContentOverride::relocate("#cta")]);
        assert!(out.contains("devtools-edge-partial"));
    }

    #[test]
    fn test_malformed_markup_is_an_error() {
        let mutator = EdgeStreamMutator;
        let plan = RewritePlan::build(
            &[ContentOverride::text("h1", "x")],
            mutator.capabilities(),
            ATTR,
        );
        // Tag left open at end of input.
        assert!(mutator.rewrite("<html><body><div", &plan).is_err());
    }
}
