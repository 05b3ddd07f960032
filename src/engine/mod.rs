//! Override resolution and HTML mutation engine.
//!
//! One page response = one pipeline execution: classify each override for
//! the active mutation substrate, synthesize CSS for the style-routed ones,
//! apply structural edits in list order, and signal through `<head>` markers
//! which overrides the client script still has to finish.
//!
//! The engine is stateless and re-entrant; concurrent requests share no
//! writable state. Every failure path fails open: the caller always gets a
//! servable body back, worst case the original one.

pub mod classify;
pub mod plan;
pub mod selector;
pub mod style;

use crate::debug;
use crate::mutate::stream::EdgeStreamMutator;
use crate::mutate::text::FallbackStringMutator;
use crate::mutate::StructuralMutator;
use crate::overrides::ContentOverride;
use anyhow::Result;
use plan::RewritePlan;

/// Default editable-region marker attribute.
pub const DEFAULT_DATA_ATTRIBUTE: &str = "data-content";

// =============================================================================
// Types
// =============================================================================

/// Which mutation substrate rewrites the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Tree-aware streaming pass (quick-xml events).
    #[default]
    Stream,
    /// Whole-document string transform.
    Text,
}

/// Result of one engine execution.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    /// The body to serve (rewritten, or the original on passthrough).
    pub body: String,
    /// Whether any rewriting was performed.
    pub rewritten: bool,
    /// Whether at least one override was deferred to the client script.
    pub client_fallback: bool,
}

impl RewriteOutcome {
    fn passthrough(body: &str) -> Self {
        Self {
            body: body.to_string(),
            rewritten: false,
            client_fallback: false,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The override resolution and HTML mutation engine.
pub struct RewriteEngine {
    data_attribute: String,
}

impl RewriteEngine {
    pub fn new(data_attribute: impl Into<String>) -> Self {
        Self {
            data_attribute: data_attribute.into(),
        }
    }

    /// Process one response body. Never fails.
    ///
    /// Non-HTML content types and empty override lists pass through
    /// byte-identical. A mutator error (e.g. markup the streaming reader
    /// cannot parse) also passes the original through - fail-open.
    pub fn process(
        &self,
        content_type: &str,
        body: &str,
        overrides: &[ContentOverride],
        backend: Backend,
    ) -> RewriteOutcome {
        if !content_type.contains("text/html") {
            return RewriteOutcome::passthrough(body);
        }
        if overrides.is_empty() {
            return RewriteOutcome::passthrough(body);
        }

        match self.rewrite_document(body, overrides, backend) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("engine"; "rewrite failed, serving original: {e:#}");
                RewriteOutcome::passthrough(body)
            }
        }
    }

    /// Rewrite a complete HTML document with the given backend.
    ///
    /// The streaming reader rejects markup it cannot pair into events, which
    /// includes legal HTML like a bare `&` in text. Rather than dropping
    /// every override on such pages, a failed streaming pass degrades to the
    /// string backend, whose own (narrower) capability set re-routes the
    /// plan. Only a string-backend failure reaches the caller.
    pub fn rewrite_document(
        &self,
        html: &str,
        overrides: &[ContentOverride],
        backend: Backend,
    ) -> Result<RewriteOutcome> {
        let (plan, body) = match backend {
            Backend::Stream => {
                let mutator = EdgeStreamMutator;
                let plan =
                    RewritePlan::build(overrides, mutator.capabilities(), &self.data_attribute);
                match mutator.rewrite(html, &plan) {
                    Ok(body) => (plan, body),
                    Err(e) => {
                        debug!("engine"; "stream pass failed, degrading to string pass: {e:#}");
                        return self.rewrite_document(html, overrides, Backend::Text);
                    }
                }
            }
            Backend::Text => {
                let mutator = FallbackStringMutator;
                let plan =
                    RewritePlan::build(overrides, mutator.capabilities(), &self.data_attribute);
                let body = mutator.rewrite(html, &plan)?;
                (plan, body)
            }
        };

        Ok(RewriteOutcome {
            body,
            rewritten: true,
            client_fallback: plan.client_fallback(),
        })
    }
}

impl Default for RewriteEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ATTRIBUTE)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = concat!(
        r#"<html><head><title>T</title></head><body>"#,
        r#"<h1 data-content="title">Old</h1>"#,
        r#"</body></html>"#
    );

    fn engine() -> RewriteEngine {
        RewriteEngine::default()
    }

    #[test]
    fn test_non_html_content_type_passes_through_byte_identical() {
        let body = r#"{"not": "html"}"#;
        let overrides = [ContentOverride::text(r#"[data-content="title"]"#, "New")];
        for backend in [Backend::Stream, Backend::Text] {
            let out = engine().process("application/json", body, &overrides, backend);
            assert_eq!(out.body, body);
            assert!(!out.rewritten);
        }
    }

    #[test]
    fn test_empty_override_list_passes_through_byte_identical() {
        for backend in [Backend::Stream, Backend::Text] {
            let out = engine().process("text/html; charset=utf-8", PAGE, &[], backend);
            assert_eq!(out.body, PAGE);
            assert!(!out.rewritten);
            assert!(!out.body.contains("devtools-edge-rewrite"));
        }
    }

    #[test]
    fn test_rewrite_under_both_backends() {
        let overrides = [ContentOverride::text(r#"[data-content="title"]"#, "New")];
        for backend in [Backend::Stream, Backend::Text] {
            let out = engine().process("text/html", PAGE, &overrides, backend);
            assert!(out.rewritten);
            assert!(out.body.contains(">New<"));
            assert!(out.body.contains("devtools-edge-rewrite"));
            assert!(!out.client_fallback);
        }
    }

    #[test]
    fn test_fallback_flag_propagates() {
        let overrides = [ContentOverride::relocate("#cta")];
        let out = engine().process("text/html", PAGE, &overrides, Backend::Stream);
        assert!(out.client_fallback);
        assert!(out.body.contains("devtools-edge-partial"));
    }

    #[test]
    fn test_bare_ampersand_page_is_still_rewritten() {
        // A bare `&` in text is legal HTML the streaming reader may reject;
        // the override must land regardless of which pass applies it.
        let page = concat!(
            r#"<html><head></head><body><p>Tom & Jerry</p>"#,
            r#"<h1 data-content="title">Old</h1></body></html>"#
        );
        let overrides = [ContentOverride::text(r#"[data-content="title"]"#, "New")];
        let out = engine().process("text/html", page, &overrides, Backend::Stream);
        assert!(out.rewritten);
        assert!(out.body.contains(">New<"));
        assert!(out.body.contains("Tom & Jerry"));
        assert!(out.body.contains("devtools-edge-rewrite"));
    }

    #[test]
    fn test_stream_parse_error_degrades_to_string_pass() {
        // Tag left open at end of input: the streaming reader errors, the
        // string pass still signals and applies what it can.
        let broken = r#"<html><head></head><body><h1 data-content="title">Old</h1><div"#;
        let overrides = [ContentOverride::text(r#"[data-content="title"]"#, "New")];
        let out = engine().process("text/html", broken, &overrides, Backend::Stream);
        assert!(out.rewritten);
        assert!(out.body.contains(">New<"));
        assert!(out.body.contains("devtools-edge-rewrite"));
    }

    #[test]
    fn test_capability_divergence_between_backends() {
        // Simple selector: structural under the streaming backend,
        // client-deferred under the string backend.
        let page = r#"<html><head></head><body><h1 id="h">Old</h1></body></html>"#;
        let overrides = [ContentOverride::text("#h", "New")];

        let stream = engine().process("text/html", page, &overrides, Backend::Stream);
        assert!(stream.body.contains(">New<"));
        assert!(!stream.client_fallback);

        let text = engine().process("text/html", page, &overrides, Backend::Text);
        assert!(text.body.contains(">Old<"));
        assert!(text.client_fallback);
    }
}
