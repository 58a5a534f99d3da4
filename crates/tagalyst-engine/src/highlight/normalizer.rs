use std::cmp::Ordering;

use crate::tree::{Document, NodeId};

use super::{is_marker, same_style};

/// Flatten nested markers and merge touching same-style markers.
///
/// Returns the surviving, attached markers in document order. Running it on
/// its own output changes nothing.
pub fn normalize(doc: &mut Document, markers: Vec<NodeId>) -> Vec<NodeId> {
    let mut markers = flatten_nested(doc, markers);
    merge_siblings(doc, &markers);

    markers.retain(|&m| doc.is_attached(m) && is_marker(doc, m));
    markers.sort_by(|&a, &b| doc.compare_nodes(a, b));
    markers.dedup();
    markers
}

/// Resolve markers whose parent is itself a marker.
///
/// Different style: the child is hoisted next to its parent (splitting the
/// parent when the child sits in the middle). Same style: the child is
/// unwrapped into the parent, which takes its place in the list.
fn flatten_nested(doc: &mut Document, mut markers: Vec<NodeId>) -> Vec<NodeId> {
    markers.sort_by(|&a, &b| match doc.depth(b).cmp(&doc.depth(a)) {
        Ordering::Equal => doc.compare_nodes(a, b),
        other => other,
    });

    loop {
        let mut again = false;
        for i in 0..markers.len() {
            let marker = markers[i];
            let Some(parent) = doc.parent(marker) else {
                continue;
            };
            if !is_marker(doc, parent) {
                continue;
            }

            if same_style(doc, parent, marker) {
                doc.unwrap(marker);
                markers[i] = parent;
            } else {
                hoist(doc, marker, parent);
            }
            again = true;
        }
        if !again {
            break;
        }
    }
    markers
}

/// Move `marker` out of `parent` so that it becomes the parent's sibling,
/// keeping document order.
fn hoist(doc: &mut Document, marker: NodeId, parent: NodeId) {
    let has_previous = doc.previous_sibling(marker).is_some();
    let has_next = doc.next_sibling(marker).is_some();

    match (has_previous, has_next) {
        (false, _) => doc.insert_before(parent, marker),
        (true, false) => doc.insert_after(parent, marker),
        (true, true) => {
            // interior: the tail of the parent becomes a new marker
            let tail = doc.clone_shallow(parent);
            let index = doc.index_in_parent(marker).unwrap_or_default();
            let trailing: Vec<NodeId> = doc.children(parent)[index + 1..].to_vec();
            for node in trailing {
                doc.append_child(tail, node);
            }
            doc.insert_after(parent, tail);
            doc.insert_after(parent, marker);
        }
    }

    if !doc.has_children(parent) {
        doc.detach(parent);
    }
}

/// Absorb neighbouring same-style markers and tidy the text runs.
fn merge_siblings(doc: &mut Document, markers: &[NodeId]) {
    for &marker in markers {
        if !doc.is_attached(marker) {
            continue;
        }
        while let Some(previous) = doc.previous_sibling(marker)
            && is_marker(doc, previous)
            && same_style(doc, marker, previous)
        {
            let moved = doc.children(previous).to_vec();
            for node in moved.into_iter().rev() {
                doc.prepend_child(marker, node);
            }
            doc.detach(previous);
        }
        while let Some(next) = doc.next_sibling(marker)
            && is_marker(doc, next)
            && same_style(doc, marker, next)
        {
            let moved = doc.children(next).to_vec();
            for node in moved {
                doc.append_child(marker, node);
            }
            doc.detach(next);
        }
        doc.normalize_text_nodes(marker);
        if let Some(parent) = doc.parent(marker) {
            doc.normalize_text_nodes(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::TextProjection;
    use crate::highlight::{ANNOTATION_ATTR, HighlightStyle, MarkerTemplate, apply, marked_text};
    use crate::range::refine;
    use pretty_assertions::assert_eq;

    fn style(name: &str) -> HighlightStyle {
        HighlightStyle {
            name: name.to_string(),
            color: name.to_string(),
        }
    }

    fn paint(doc: &mut Document, start: usize, end: usize, style: HighlightStyle, ts: u64) -> Vec<NodeId> {
        let span = TextProjection::new(doc, doc.root()).span_for(start, end).unwrap();
        let refined = refine(doc, span).unwrap();
        apply(doc, &refined, &MarkerTemplate::new(style, ts))
    }

    #[test]
    fn test_adjacent_same_style_markers_merge() {
        let mut doc = Document::parse("<body><p>abcdef</p></body>").unwrap();
        let first = paint(&mut doc, 0, 3, style("yellow"), 1);
        let second = paint(&mut doc, 3, 6, style("yellow"), 1);
        assert_eq!(marked_text(&doc, doc.root()), "[abc][def]");

        let merged = normalize(&mut doc, [first, second].concat());

        assert_eq!(merged.len(), 1);
        assert_eq!(marked_text(&doc, doc.root()), "[abcdef]");
        assert_eq!(doc.children(merged[0]).len(), 1);
    }

    #[test]
    fn test_adjacent_markers_of_different_annotations_stay_apart() {
        let mut doc = Document::parse("<body><p>abcdef</p></body>").unwrap();
        let first = paint(&mut doc, 0, 3, style("yellow"), 1);
        doc.set_attribute(first[0], ANNOTATION_ATTR, "a");
        let second = paint(&mut doc, 3, 6, style("yellow"), 2);

        let result = normalize(&mut doc, second);

        assert_eq!(result.len(), 1);
        assert_eq!(marked_text(&doc, doc.root()), "[abc][def]");
    }

    #[test]
    fn test_nested_same_style_marker_is_unwrapped_into_parent() {
        let mut doc = Document::parse("<body><p>abcdef</p></body>").unwrap();
        let outer = paint(&mut doc, 0, 6, style("yellow"), 1);
        // highlight again inside the existing marker
        let inner = paint(&mut doc, 2, 4, style("yellow"), 2);
        assert_eq!(marked_text(&doc, doc.root()), "[ab[cd]ef]");

        let result = normalize(&mut doc, inner);

        assert_eq!(result, outer);
        assert_eq!(marked_text(&doc, doc.root()), "[abcdef]");
    }

    #[test]
    fn test_nested_different_style_marker_splits_parent() {
        let mut doc = Document::parse("<body><p>abcdef</p></body>").unwrap();
        paint(&mut doc, 0, 6, style("yellow"), 1);
        let inner = paint(&mut doc, 2, 4, style("green"), 2);

        let result = normalize(&mut doc, inner.clone());

        assert_eq!(result, inner);
        assert_eq!(marked_text(&doc, doc.root()), "[ab][cd][ef]");
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 3);
        assert_eq!(doc.parent(inner[0]), Some(p));
    }

    #[test]
    fn test_nested_different_style_at_edge_removes_empty_parent() {
        let mut doc = Document::parse("<body><p>abcdef</p></body>").unwrap();
        let outer = paint(&mut doc, 0, 3, style("yellow"), 1);
        let inner = paint(&mut doc, 0, 3, style("green"), 2);

        let result = normalize(&mut doc, inner.clone());

        assert_eq!(result, inner);
        assert!(!doc.is_attached(outer[0]));
        assert_eq!(marked_text(&doc, doc.root()), "[abc]def");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut doc = Document::parse("<body><p>one <b>two</b> three</p><p>four</p></body>").unwrap();
        let first = paint(&mut doc, 0, 7, style("yellow"), 1);
        let second = paint(&mut doc, 4, 17, style("yellow"), 1);
        let once = normalize(&mut doc, [first, second].concat());
        let markup = doc.to_markup(doc.root());

        let twice = normalize(&mut doc, once.clone());

        assert_eq!(twice, once);
        assert_eq!(doc.to_markup(doc.root()), markup);
    }

    #[test]
    fn test_no_adjacent_same_style_siblings_after_normalize() {
        let mut doc = Document::parse("<body><p>abcdefghi</p></body>").unwrap();
        let mut markers = Vec::new();
        for (start, end) in [(0, 3), (3, 6), (6, 9)] {
            markers.extend(paint(&mut doc, start, end, style("yellow"), 1));
        }

        let result = normalize(&mut doc, markers);

        for &marker in &result {
            let next = doc.next_sibling(marker);
            assert!(
                !next.is_some_and(|n| is_marker(&doc, n) && same_style(&doc, marker, n)),
                "adjacent same-style markers survived"
            );
        }
        assert_eq!(marked_text(&doc, doc.root()), "[abcdefghi]");
    }
}
