//! Rewrite plan.
//!
//! A plan is the resolved form of one override list for one mutator: the
//! ordered structural operations that mutator will apply, the synthesized
//! CSS, and the head injection block. Building a plan is pure - it touches
//! no I/O and no shared state - so one list can be planned independently
//! for either substrate.

use crate::engine::classify::{MutatorCapabilities, RoutingDecision, classify};
use crate::engine::selector::{SelectorShape, SimpleSelector, shape};
use crate::engine::style;
use crate::mutate::head::HeadInjection;
use crate::overrides::{ContentOverride, OverrideValue};

// =============================================================================
// Structural Operations
// =============================================================================

/// What a structural operation does to a matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Replace inner content with literal text (entity-escaped on output).
    SetText(String),
    /// Replace inner content with raw markup.
    SetHtml(String),
    /// On `<img>` elements: set `src`, drop `srcset` so the browser cannot
    /// re-select a responsive source that bypasses the override.
    SetImageSrc(String),
}

/// One selector-scoped mutation, fired per matching element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralOp {
    pub matcher: SimpleSelector,
    pub action: Action,
}

// =============================================================================
// Rewrite Plan
// =============================================================================

/// Everything a mutator needs to rewrite one document.
#[derive(Debug, Clone, Default)]
pub struct RewritePlan {
    /// Structural operations in override list order.
    pub ops: Vec<StructuralOp>,
    /// Head block (markers + synthesized CSS).
    pub head: HeadInjection,
}

impl RewritePlan {
    /// Resolve an override list for a mutator with the given capabilities.
    pub fn build(
        overrides: &[ContentOverride],
        capabilities: MutatorCapabilities,
        data_attr: &str,
    ) -> Self {
        let mut ops = Vec::new();
        let mut partial = false;

        for o in overrides {
            match classify(o, capabilities, data_attr) {
                RoutingDecision::StructuralMutation => {
                    if let Some(op) = structural_op(o, data_attr) {
                        ops.push(op);
                    }
                }
                RoutingDecision::ClientFallbackRequired => partial = true,
                RoutingDecision::StyleInjection | RoutingDecision::Skipped => {}
            }
        }

        Self {
            ops,
            head: HeadInjection {
                partial,
                style: style::synthesize(overrides),
            },
        }
    }

    /// Whether any override was deferred to the client script.
    pub fn client_fallback(&self) -> bool {
        self.head.partial
    }
}

/// Turn one structurally-routed override into an operation.
fn structural_op(o: &ContentOverride, data_attr: &str) -> Option<StructuralOp> {
    let matcher = match shape(&o.selector, data_attr) {
        SelectorShape::DataContent { key } => SimpleSelector::AttrEq {
            name: data_attr.to_string(),
            value: key,
        },
        SelectorShape::Simple(simple) => simple,
        SelectorShape::Complex => return None,
    };

    let action = match &o.value {
        OverrideValue::Text(v) => Action::SetText(v.clone()),
        OverrideValue::Html(v) => Action::SetHtml(v.clone()),
        OverrideValue::Image(v) => Action::SetImageSrc(v.clone()),
        _ => return None,
    };

    Some(StructuralOp { matcher, action })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ATTR: &str = "data-content";
    const TREE: MutatorCapabilities = MutatorCapabilities {
        supports_simple_selectors: true,
    };
    const STRING: MutatorCapabilities = MutatorCapabilities {
        supports_simple_selectors: false,
    };

    #[test]
    fn test_image_override_fires_both_effects() {
        let o = ContentOverride::image(r#"[data-content="hero-img"]"#, "/a.jpg");
        let plan = RewritePlan::build(std::slice::from_ref(&o), TREE, ATTR);

        // Structural img-src op...
        assert_eq!(plan.ops.len(), 1);
        assert_eq!(plan.ops[0].action, Action::SetImageSrc("/a.jpg".into()));
        // ...and the :not(img) background rule, simultaneously.
        assert!(plan.head.style.contains(":not(img)"));
        assert!(plan.head.style.contains("url(/a.jpg)"));
        assert!(!plan.client_fallback());
    }

    #[test]
    fn test_simple_selector_plan_differs_by_capability() {
        let o = ContentOverride::text("#headline", "Hi");

        let tree = RewritePlan::build(std::slice::from_ref(&o), TREE, ATTR);
        assert_eq!(tree.ops.len(), 1);
        assert!(!tree.client_fallback());

        let string = RewritePlan::build(std::slice::from_ref(&o), STRING, ATTR);
        assert!(string.ops.is_empty());
        assert!(string.client_fallback());
    }

    #[test]
    fn test_move_sets_fallback_only() {
        let plan = RewritePlan::build(&[ContentOverride::relocate("#cta")], TREE, ATTR);
        assert!(plan.ops.is_empty());
        assert!(plan.client_fallback());
    }

    #[test]
    fn test_ops_keep_list_order() {
        let list = [
            ContentOverride::text(r#"[data-content="a"]"#, "one"),
            ContentOverride::text(r#"[data-content="a"]"#, "two"),
        ];
        let plan = RewritePlan::build(&list, STRING, ATTR);
        assert_eq!(plan.ops.len(), 2);
        assert_eq!(plan.ops[0].action, Action::SetText("one".into()));
        assert_eq!(plan.ops[1].action, Action::SetText("two".into()));
    }
}
