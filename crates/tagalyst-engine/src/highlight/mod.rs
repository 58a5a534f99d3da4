//! Painting highlights into the tree.
//!
//! A highlight is a set of *markers*: `span` elements wrapping individual
//! text leaves. [`apply`] creates them, [`normalize`] flattens and merges
//! them, and the helpers here find, tag and remove them again.

mod applier;
mod normalizer;

pub use applier::{IGNORED_TAGS, apply, is_highlightable_leaf};
pub use normalizer::normalize;

use serde::{Deserialize, Serialize};

use crate::tree::{Document, NodeId};

/// Present on every marker element.
pub const DATA_ATTR: &str = "data-highlighted";
/// Creation timestamp shared by all markers of one operation.
pub const TIMESTAMP_ATTR: &str = "data-timestamp";
/// Style identifier of a marker.
pub const STYLE_ATTR: &str = "data-style";
/// Identifier of the annotation a marker belongs to.
pub const ANNOTATION_ATTR: &str = "data-annotation-id";

/// Visual style of a highlight. Markers with the same `name` are merged when
/// they touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightStyle {
    pub name: String,
    pub color: String,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            name: "tagalyst-highlight".to_string(),
            color: "yellow".to_string(),
        }
    }
}

/// Per-operation wrapper blueprint. Every marker cloned from one template
/// carries the same timestamp.
#[derive(Debug, Clone)]
pub struct MarkerTemplate {
    pub style: HighlightStyle,
    pub timestamp: u64,
}

impl MarkerTemplate {
    pub fn new(style: HighlightStyle, timestamp: u64) -> Self {
        Self { style, timestamp }
    }

    /// Create a detached marker element.
    pub fn instantiate(&self, doc: &mut Document) -> NodeId {
        let marker = doc.create_element("span");
        doc.set_attribute(marker, "class", &self.style.name);
        doc.set_attribute(
            marker,
            "style",
            &format!("background-color: {}", self.style.color),
        );
        doc.set_attribute(marker, DATA_ATTR, "true");
        doc.set_attribute(marker, STYLE_ATTR, &self.style.name);
        doc.set_attribute(marker, TIMESTAMP_ATTR, &self.timestamp.to_string());
        marker
    }
}

pub fn is_marker(doc: &Document, node: NodeId) -> bool {
    doc.is_element(node) && doc.has_attribute(node, DATA_ATTR)
}

/// Markers merge only when both the style and the owning annotation agree,
/// so that touching highlights of two annotations stay distinct.
pub fn same_style(doc: &Document, a: NodeId, b: NodeId) -> bool {
    doc.attribute(a, STYLE_ATTR) == doc.attribute(b, STYLE_ATTR)
        && doc.attribute(a, ANNOTATION_ATTR) == doc.attribute(b, ANNOTATION_ATTR)
}

/// All markers below `container` (inclusive), in document order.
pub fn markers_in(doc: &Document, container: NodeId) -> Vec<NodeId> {
    doc.elements_with_attribute(container, DATA_ATTR)
}

/// Markers belonging to one annotation.
pub fn markers_for(doc: &Document, container: NodeId, annotation_id: &str) -> Vec<NodeId> {
    markers_in(doc, container)
        .into_iter()
        .filter(|&m| doc.attribute(m, ANNOTATION_ATTR) == Some(annotation_id))
        .collect()
}

/// Stamp markers with the annotation they belong to.
pub fn tag_markers(doc: &mut Document, markers: &[NodeId], annotation_id: &str) {
    for &marker in markers {
        doc.set_attribute(marker, ANNOTATION_ATTR, annotation_id);
    }
}

/// A group of markers created by the same operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerGroup {
    pub timestamp: String,
    pub markers: Vec<NodeId>,
}

impl MarkerGroup {
    pub fn text(&self, doc: &Document) -> String {
        self.markers.iter().map(|&m| doc.text_content(m)).collect()
    }
}

/// Group markers by creation timestamp, in order of first appearance.
pub fn group_by_timestamp(doc: &Document, markers: &[NodeId]) -> Vec<MarkerGroup> {
    let mut groups: Vec<MarkerGroup> = Vec::new();
    for &marker in markers {
        let timestamp = doc.attribute(marker, TIMESTAMP_ATTR).unwrap_or_default();
        match groups.iter_mut().find(|g| g.timestamp == timestamp) {
            Some(group) => group.markers.push(marker),
            None => groups.push(MarkerGroup {
                timestamp: timestamp.to_string(),
                markers: vec![marker],
            }),
        }
    }
    groups
}

/// Unwrap markers and merge the text runs they leave behind.
pub fn remove_markers(doc: &mut Document, markers: &[NodeId]) {
    let mut parents = Vec::new();
    for &marker in markers {
        if let Some(parent) = doc.parent(marker) {
            parents.push(parent);
        }
        doc.unwrap(marker);
    }
    for parent in parents {
        doc.normalize_text_nodes(parent);
    }
}

/// Flattened text of `node` with every marker shown as `[...]`.
pub fn marked_text(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_marked(doc, node, &mut out);
    out
}

fn write_marked(doc: &Document, node: NodeId, out: &mut String) {
    if let Some(text) = doc.text(node) {
        out.push_str(text);
        return;
    }
    let marker = is_marker(doc, node);
    if marker {
        out.push('[');
    }
    for &child in doc.children(node) {
        write_marked(doc, child, out);
    }
    if marker {
        out.push(']');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_template_instances_share_timestamp() {
        let mut doc = Document::new("body");
        let template = MarkerTemplate::new(HighlightStyle::default(), 42);

        let a = template.instantiate(&mut doc);
        let b = template.instantiate(&mut doc);

        assert!(is_marker(&doc, a));
        assert_eq!(doc.attribute(a, TIMESTAMP_ATTR), Some("42"));
        assert_eq!(doc.attribute(b, TIMESTAMP_ATTR), Some("42"));
        assert_eq!(doc.attribute(a, "class"), Some("tagalyst-highlight"));
    }

    #[test]
    fn test_group_by_timestamp_keeps_first_seen_order() {
        let mut doc = Document::new("body");
        let late = MarkerTemplate::new(HighlightStyle::default(), 2);
        let early = MarkerTemplate::new(HighlightStyle::default(), 1);
        let a = late.instantiate(&mut doc);
        let b = early.instantiate(&mut doc);
        let c = late.instantiate(&mut doc);

        let groups = group_by_timestamp(&doc, &[a, b, c]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].timestamp, "2");
        assert_eq!(groups[0].markers, vec![a, c]);
        assert_eq!(groups[1].markers, vec![b]);
    }

    #[test]
    fn test_remove_markers_restores_single_text_run() {
        let mut doc = Document::parse("<body><p>Hello world</p></body>").unwrap();
        let text = doc.text_leaves(doc.root())[0];
        let right = doc.split_text(text, 6);
        let marker = MarkerTemplate::new(HighlightStyle::default(), 1).instantiate(&mut doc);
        doc.wrap(right, marker);
        assert_eq!(marked_text(&doc, doc.root()), "Hello [world]");

        remove_markers(&mut doc, &[marker]);

        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(marked_text(&doc, doc.root()), "Hello world");
    }
}
