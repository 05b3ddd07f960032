//! Head injection block.
//!
//! After structural and style resolution, both mutators insert one markup
//! block before the document's first `</head>`:
//!
//! - a marker meta tag telling the client script that edge rewriting ran;
//! - a partial marker iff at least one override needs the client script;
//! - the synthesized `<style>` block, when non-empty, carrying a marker
//!   attribute so the client can replace it idempotently later.
//!
//! The engine runs at most once per response; a second run would duplicate
//! the block and is out of contract.

/// Meta name signaling that edge rewriting is active.
pub const REWRITE_MARKER: &str = "devtools-edge-rewrite";
/// Meta name signaling that some overrides still need the client script.
pub const PARTIAL_MARKER: &str = "devtools-edge-partial";
/// Attribute marking the injected style element.
pub const STYLE_MARKER: &str = "data-devtools-overrides";

/// What goes into `<head>` for one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadInjection {
    /// At least one override classified `ClientFallbackRequired`.
    pub partial: bool,
    /// Synthesized CSS; empty means no style block.
    pub style: String,
}

impl HeadInjection {
    /// Render the markup block inserted before `</head>`.
    pub fn render(&self) -> String {
        let mut block = format!("<meta name=\"{REWRITE_MARKER}\" content=\"true\">\n");
        if self.partial {
            block.push_str(&format!("<meta name=\"{PARTIAL_MARKER}\" content=\"true\">\n"));
        }
        if !self.style.is_empty() {
            block.push_str(&format!("<style {STYLE_MARKER}>\n{}\n</style>\n", self.style));
        }
        block
    }
}
