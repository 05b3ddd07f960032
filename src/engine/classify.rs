//! Override routing.
//!
//! `classify` decides, for one override and one mutator capability set, how
//! the override is honored: injected CSS, a structural edit, deferral to the
//! client script, or nothing at all. It is a pure function of its inputs -
//! the same (override, capabilities) pair always yields the same decision,
//! regardless of request history.
//!
//! The capability parameter is the whole point: the streaming mutator can
//! match simple tag/class/id selectors against a real element stream, the
//! string mutator cannot (tag names also occur inside comments, attribute
//! values and script bodies, so text-level matching risks false positives).
//! Classification is shared; only the capability descriptor differs.

use crate::engine::selector::{SelectorShape, shape};
use crate::overrides::{ContentOverride, OverrideValue};

// =============================================================================
// Types
// =============================================================================

/// What a structural mutator can safely match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutatorCapabilities {
    /// Whether single tag/class/id/attribute selectors can be matched
    /// structurally. True for the tree-aware streaming mutator, false for
    /// the whole-document string mutator.
    pub supports_simple_selectors: bool,
}

/// How one override is honored. Derived per request, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Contributes a rule to the synthesized `<style>` block.
    StyleInjection,
    /// Applied by the active structural mutator.
    StructuralMutation,
    /// Deferred to the client script; sets the partial marker.
    ClientFallbackRequired,
    /// No effect at all.
    Skipped,
}

// =============================================================================
// Classification
// =============================================================================

/// Route one override for a mutator with the given capabilities.
///
/// Note on `image`: the structural routing below covers only the `<img>`
/// src rewrite. Every image override *additionally* contributes a
/// `:not(img)` background-image rule via the style synthesizer; the two
/// effects are independent and a `DataContent` image override fires both.
pub fn classify(
    override_: &ContentOverride,
    capabilities: MutatorCapabilities,
    data_attr: &str,
) -> RoutingDecision {
    if override_.selector.trim().is_empty() {
        return RoutingDecision::Skipped;
    }

    match &override_.value {
        OverrideValue::Move => RoutingDecision::ClientFallbackRequired,
        OverrideValue::Unknown => RoutingDecision::Skipped,
        OverrideValue::Background(_) => RoutingDecision::StyleInjection,
        OverrideValue::Css(map) => {
            if map.is_empty() {
                RoutingDecision::Skipped
            } else {
                RoutingDecision::StyleInjection
            }
        }
        OverrideValue::Image(_) => match shape(&override_.selector, data_attr) {
            SelectorShape::DataContent { .. } => RoutingDecision::StructuralMutation,
            // The style rule reaches any selector CSS can express.
            _ => RoutingDecision::StyleInjection,
        },
        OverrideValue::Text(_) | OverrideValue::Html(_) => {
            match shape(&override_.selector, data_attr) {
                SelectorShape::DataContent { .. } => RoutingDecision::StructuralMutation,
                SelectorShape::Complex => RoutingDecision::ClientFallbackRequired,
                SelectorShape::Simple(_) => {
                    if capabilities.supports_simple_selectors {
                        RoutingDecision::StructuralMutation
                    } else {
                        RoutingDecision::ClientFallbackRequired
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
