//! Selection spans and boundary refinement.
//!
//! A user selection rarely ends exactly on node edges. [`refine`] splits the
//! boundary text nodes so that the region to highlight consists of whole
//! nodes, which is what the applier needs to wrap leaves without cutting
//! through them.

use std::cmp::Ordering;

use crate::error::EngineError;
use crate::tree::{BoundaryPoint, Document, NodeId};

/// An ordered pair of boundary points delimiting a region of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
}

impl Span {
    pub fn new(start: BoundaryPoint, end: BoundaryPoint) -> Self {
        Self { start, end }
    }

    /// Span covering `[start, end)` characters of a single text node.
    pub fn within_text(node: NodeId, start: usize, end: usize) -> Self {
        Self::new(BoundaryPoint::new(node, start), BoundaryPoint::new(node, end))
    }

    /// Span covering all children of an element.
    pub fn around_contents(doc: &Document, node: NodeId) -> Self {
        Self::new(
            BoundaryPoint::new(node, 0),
            BoundaryPoint::new(node, doc.node_length(node)),
        )
    }

    pub fn is_collapsed(&self, doc: &Document) -> bool {
        doc.compare_points(self.start, self.end) != Ordering::Less
    }
}

/// Node-exact boundaries produced by [`refine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinedBoundary {
    /// First node of the walk
    pub start: NodeId,
    /// Last node of the walk (inclusive)
    pub end: NodeId,
    /// Whether the walk may descend into `start`. False when the selection
    /// begins at the very end of a text node, which has nothing left to wrap.
    pub descend_initially: bool,
}

/// Move span boundaries onto node edges, splitting text nodes as needed.
///
/// Splits at offset zero or at a node's full length never happen, so refining
/// a span whose boundaries already sit on node edges leaves the tree untouched.
pub fn refine(doc: &mut Document, span: Span) -> Result<RefinedBoundary, EngineError> {
    if !doc.is_attached(span.start.node) || !doc.is_attached(span.end.node) {
        return Err(EngineError::StructuralMutationConflict);
    }
    if span.is_collapsed(doc) {
        return Err(EngineError::CollapsedSpan);
    }

    let ancestor = doc
        .common_ancestor(span.start.node, span.end.node)
        .ok_or(EngineError::StructuralMutationConflict)?;
    let mut end = span.end.node;
    let mut descend_initially = true;

    if span.end.offset == 0 {
        // Exclusive end: step back to whatever precedes the boundary.
        while doc.previous_sibling(end).is_none() && doc.parent(end) != Some(ancestor) {
            end = doc.parent(end).ok_or(EngineError::StructuralMutationConflict)?;
        }
        end = doc.previous_sibling(end).ok_or(EngineError::CollapsedSpan)?;
    } else if doc.is_text(end) {
        if span.end.offset < doc.node_length(end) {
            doc.split_text(end, span.end.offset);
        }
    } else {
        end = doc
            .children(end)
            .get(span.end.offset - 1)
            .copied()
            .ok_or(EngineError::StructuralMutationConflict)?;
    }

    let mut start = span.start.node;
    if doc.is_text(start) {
        let length = doc.node_length(start);
        if span.start.offset >= length {
            descend_initially = false;
        } else if span.start.offset > 0 {
            let right = doc.split_text(start, span.start.offset);
            if end == start {
                end = right;
            }
            start = right;
        }
    } else if let Some(&child) = doc.children(start).get(span.start.offset) {
        start = child;
    } else {
        start = next_outside(doc, start).ok_or(EngineError::CollapsedSpan)?;
    }

    if doc.compare_nodes(end, start) == Ordering::Less && !doc.contains(end, start) {
        return Err(EngineError::CollapsedSpan);
    }

    Ok(RefinedBoundary {
        start,
        end,
        descend_initially,
    })
}

/// Next node in document order that is not inside `node`.
fn next_outside(doc: &Document, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(doc.ancestors(node))
        .find_map(|n| doc.next_sibling(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_of(doc: &Document, node: NodeId) -> String {
        doc.text_content(node)
    }

    #[test]
    fn test_refine_splits_both_ends_of_single_text_node() {
        let mut doc = Document::parse("<body><p>Hello brave world</p></body>").unwrap();
        let text = doc.text_leaves(doc.root())[0];

        let refined = refine(&mut doc, Span::within_text(text, 6, 11)).unwrap();

        assert_eq!(refined.start, refined.end);
        assert_eq!(text_of(&doc, refined.start), "brave");
        assert!(refined.descend_initially);
        assert_eq!(doc.text_content(doc.root()), "Hello brave world");
    }

    #[test]
    fn test_refine_across_paragraphs() {
        let mut doc = Document::parse("<body><p>first para</p><p>second para</p></body>").unwrap();
        let leaves = doc.text_leaves(doc.root());
        let span = Span::new(
            BoundaryPoint::new(leaves[0], 6),
            BoundaryPoint::new(leaves[1], 6),
        );

        let refined = refine(&mut doc, span).unwrap();

        assert_eq!(text_of(&doc, refined.start), "para");
        assert_eq!(text_of(&doc, refined.end), "second");
    }

    #[test]
    fn test_refine_start_at_end_of_text_does_not_descend() {
        let mut doc = Document::parse("<body><p>abc</p><p>def</p></body>").unwrap();
        let leaves = doc.text_leaves(doc.root());
        let span = Span::new(
            BoundaryPoint::new(leaves[0], 3),
            BoundaryPoint::new(leaves[1], 2),
        );

        let refined = refine(&mut doc, span).unwrap();

        assert_eq!(refined.start, leaves[0]);
        assert!(!refined.descend_initially);
    }

    #[test]
    fn test_refine_zero_end_offset_steps_back_to_previous_sibling() {
        let mut doc = Document::parse("<body><p>abc</p><p>def</p></body>").unwrap();
        let leaves = doc.text_leaves(doc.root());
        let first_p = doc.children(doc.root())[0];
        let span = Span::new(
            BoundaryPoint::new(leaves[0], 1),
            BoundaryPoint::new(leaves[1], 0),
        );

        let refined = refine(&mut doc, span).unwrap();

        assert_eq!(refined.end, first_p);
        assert_eq!(text_of(&doc, refined.start), "bc");
    }

    #[test]
    fn test_refine_is_idempotent_on_refined_span() {
        let mut doc = Document::parse("<body><p>Hello brave world</p></body>").unwrap();
        let text = doc.text_leaves(doc.root())[0];
        let refined = refine(&mut doc, Span::within_text(text, 6, 11)).unwrap();
        let nodes_after_first = doc.node_count();

        let again = Span::new(
            BoundaryPoint::new(refined.start, 0),
            BoundaryPoint::new(refined.end, doc.node_length(refined.end)),
        );
        let second = refine(&mut doc, again).unwrap();

        assert_eq!(doc.node_count(), nodes_after_first);
        assert_eq!(second, refined);
    }

    #[test]
    fn test_refine_rejects_collapsed_span() {
        let mut doc = Document::parse("<body><p>abc</p></body>").unwrap();
        let text = doc.text_leaves(doc.root())[0];

        let result = refine(&mut doc, Span::within_text(text, 2, 2));

        assert!(matches!(result, Err(EngineError::CollapsedSpan)));
    }

    #[test]
    fn test_refine_rejects_detached_boundaries() {
        let mut doc = Document::parse("<body><p>abc</p></body>").unwrap();
        let p = doc.children(doc.root())[0];
        let text = doc.text_leaves(doc.root())[0];
        doc.detach(p);

        let result = refine(&mut doc, Span::within_text(text, 0, 2));

        assert!(matches!(result, Err(EngineError::StructuralMutationConflict)));
    }

    #[test]
    fn test_refine_element_boundaries_select_children() {
        let mut doc = Document::parse("<body><p>a</p><p>b</p><p>c</p></body>").unwrap();
        let root = doc.root();
        let children = doc.children(root).to_vec();
        let span = Span::new(BoundaryPoint::new(root, 1), BoundaryPoint::new(root, 3));

        let refined = refine(&mut doc, span).unwrap();

        assert_eq!(refined.start, children[1]);
        assert_eq!(refined.end, children[2]);
    }
}
