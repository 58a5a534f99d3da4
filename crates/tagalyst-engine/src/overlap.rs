//! Collisions between a new selection and existing annotations.

use crate::anchoring::codec::structural_to_span;
use crate::anchoring::TextProjection;
use crate::annotation::{Annotation, normalize_identity};
use crate::highlight::{markers_for, remove_markers};
use crate::tree::{Document, NodeId};

/// Half-open character range in a root's flattened text.
pub type CharRange = (usize, usize);

/// Two ranges overlap unless one ends at or before the start of the other.
pub fn spans_overlap(a: CharRange, b: CharRange) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Where an existing annotation sits in the current tree.
///
/// Painted markers win, then the position form, then the structural form.
/// A stored form only counts while the text it covers is still the
/// annotation's text; an annotation that did not restore is never located.
pub fn locate(doc: &Document, root: NodeId, projection: &TextProjection, annotation: &Annotation) -> Option<CharRange> {
    let markers = markers_for(doc, root, &annotation.id);
    if !markers.is_empty() {
        return projection.range_of_nodes(doc, &markers);
    }
    let holds_text = |(start, end): CharRange| projection.slice(start, end) == annotation.text;
    if let Some(position) = &annotation.anchors.position
        && position.start < position.end
        && position.end <= projection.len()
        && holds_text((position.start, position.end))
    {
        return Some((position.start, position.end));
    }
    let structural = annotation.anchors.structural.as_ref()?;
    let span = structural_to_span(doc, root, structural)?;
    projection.range_of(doc, &span).filter(|&range| holds_text(range))
}

/// Existing annotations of `identity` whose span overlaps `candidate`.
pub fn find_overlaps<'a>(
    doc: &Document,
    root: NodeId,
    candidate: CharRange,
    existing: &'a [Annotation],
    identity: &str,
) -> Vec<&'a Annotation> {
    let identity = normalize_identity(identity);
    let projection = TextProjection::new(doc, root);
    existing
        .iter()
        .filter(|a| a.document_identity == identity)
        .filter(|a| locate(doc, root, &projection, a).is_some_and(|range| spans_overlap(range, candidate)))
        .collect()
}

/// Unpaint the given annotations and return the ids that were superseded.
pub fn supersede(doc: &mut Document, root: NodeId, superseded: &[&Annotation]) -> Vec<String> {
    let mut ids = Vec::with_capacity(superseded.len());
    for annotation in superseded {
        let markers = markers_for(doc, root, &annotation.id);
        remove_markers(doc, &markers);
        log::info!("annotation {} superseded by a new selection", annotation.id);
        ids.push(annotation.id.clone());
    }
    ids
}
