use crate::range::RefinedBoundary;
use crate::tree::{Document, NodeId};

use super::MarkerTemplate;

/// Elements whose text is never highlighted: scripts, form controls,
/// embedded media and interactive widgets.
pub const IGNORED_TAGS: &[&str] = &[
    "script", "style", "noscript", "select", "option", "button", "textarea", "input", "object",
    "applet", "video", "audio", "canvas", "embed", "iframe", "param", "meter", "progress",
];

fn is_ignored(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(|tag| IGNORED_TAGS.contains(&tag))
}

/// A text leaf qualifies when it has visible content and does not sit
/// directly inside an ignored element.
pub fn is_highlightable_leaf(doc: &Document, node: NodeId) -> bool {
    let Some(text) = doc.text(node) else {
        return false;
    };
    if text.trim().is_empty() {
        return false;
    }
    doc.parent(node).is_none_or(|parent| !is_ignored(doc, parent))
}

/// Wrap every qualifying text leaf between the refined boundaries.
///
/// Walks depth-first from `refined.start` and stops once `refined.end` has
/// been reached with nothing left to descend into. Leaves are wrapped one by
/// one, never across element boundaries. Only inserts nodes; returns the new
/// markers in document order.
pub fn apply(doc: &mut Document, refined: &RefinedBoundary, template: &MarkerTemplate) -> Vec<NodeId> {
    let end = refined.end;
    let mut markers = Vec::new();
    let mut node = Some(refined.start);
    let mut go_deeper = refined.descend_initially;

    while let Some(current) = node {
        if go_deeper && doc.is_text(current) {
            if is_highlightable_leaf(doc, current) {
                let marker = template.instantiate(doc);
                markers.push(doc.wrap(current, marker));
            }
            go_deeper = false;
        }
        if current == end && !(doc.has_children(end) && go_deeper) {
            break;
        }
        if is_ignored(doc, current) {
            if doc.parent(end) == Some(current) {
                break;
            }
            go_deeper = false;
        }

        if go_deeper && doc.has_children(current) {
            node = doc.first_child(current);
        } else if let Some(next) = doc.next_sibling(current) {
            node = Some(next);
            go_deeper = true;
        } else {
            node = doc.parent(current);
            go_deeper = false;
        }
    }

    log::debug!("applied {} markers", markers.len());
    markers
}
