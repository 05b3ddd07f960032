//! Structural mutators.
//!
//! "Mutate the elements matching selector S per override O" is one logical
//! operation with two physical substrates:
//!
//! - [`stream::EdgeStreamMutator`] - a tree-aware single pass over the
//!   document's tag/text event stream, produced incrementally.
//! - [`text::FallbackStringMutator`] - whole-document regex transforms,
//!   requiring the complete HTML in memory.
//!
//! Both consume the same [`RewritePlan`], built from the shared classifier
//! with the mutator's own capability descriptor, so the two paths cannot
//! silently diverge on routing.

pub mod head;
pub mod stream;
pub mod text;

use crate::engine::classify::MutatorCapabilities;
use crate::engine::plan::RewritePlan;
use anyhow::Result;

/// A structural mutation substrate.
pub trait StructuralMutator {
    /// What this mutator can safely match. Feed this to the classifier.
    fn capabilities(&self) -> MutatorCapabilities;

    /// Apply a plan to a complete document, returning the rewritten text.
    ///
    /// Errors mean the document could not be safely rewritten; the engine
    /// treats any error as "serve the original" (fail-open).
    fn rewrite(&self, html: &str, plan: &RewritePlan) -> Result<String>;
}
