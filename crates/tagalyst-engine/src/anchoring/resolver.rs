//! Re-locating an annotation by escalating through its anchor forms.

use crate::annotation::Annotation;
use crate::error::EngineError;
use crate::highlight::{MarkerTemplate, apply, markers_for, normalize, remove_markers, tag_markers};
use crate::range::refine;
use crate::tree::{Document, NodeId};

use super::codec::decode;
use super::{AnchorFailure, AnchorForm, FormKind, TextProjection};

/// Lifecycle of one annotation during a restore pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Pending,
    Matched,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub state: ResolveState,
    /// Form that produced the markers, if any
    pub matched_form: Option<FormKind>,
    /// Number of forms tried, including the one that matched
    pub attempts: usize,
    /// Markers painted for the annotation, in document order
    pub markers: Vec<NodeId>,
}

impl ResolveOutcome {
    fn pending() -> Self {
        Self {
            state: ResolveState::Pending,
            matched_form: None,
            attempts: 0,
            markers: Vec::new(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.state == ResolveState::Matched
    }
}

/// Paint `annotation` using the first anchor form (up to `max_level`) whose
/// decoded text still equals the annotation's text.
///
/// An annotation with no form at or below `max_level` is an error, not an
/// exhausted outcome.
///
/// The descriptor itself is never modified, whichever form matches.
pub fn resolve(
    doc: &mut Document,
    root: NodeId,
    annotation: &Annotation,
    max_level: u8,
    template: &MarkerTemplate,
) -> Result<ResolveOutcome, EngineError> {
    let forms: Vec<AnchorForm<'_>> = annotation
        .anchors
        .forms()
        .into_iter()
        .filter(|f| f.kind().level() <= max_level)
        .collect();
    if forms.is_empty() {
        return Err(EngineError::NoAnchorForms(annotation.id.clone()));
    }
    if !doc.is_attached(root) {
        return Err(EngineError::StructuralMutationConflict);
    }

    let mut outcome = ResolveOutcome::pending();
    for form in forms {
        outcome.attempts += 1;
        match attempt(doc, root, annotation, form, template) {
            Ok(markers) => {
                outcome.state = ResolveState::Matched;
                outcome.matched_form = Some(form.kind());
                outcome.markers = markers;
                log::debug!("annotation {} matched by {} anchor", annotation.id, form.kind());
                return Ok(outcome);
            }
            Err(failure) => {
                log::debug!("annotation {}: {failure}", annotation.id);
            }
        }
    }

    outcome.state = ResolveState::Exhausted;
    log::warn!(
        "annotation {} could not be restored after {} attempts",
        annotation.id,
        outcome.attempts
    );
    Ok(outcome)
}

fn attempt(
    doc: &mut Document,
    root: NodeId,
    annotation: &Annotation,
    form: AnchorForm<'_>,
    template: &MarkerTemplate,
) -> Result<Vec<NodeId>, AnchorFailure> {
    let kind = form.kind();
    // rebuilt per attempt, an earlier attempt may have split text nodes
    let projection = TextProjection::new(doc, root);
    let span = decode(doc, root, &projection, form).ok_or(AnchorFailure::Decode(kind))?;

    let (start, end) = projection
        .range_of(doc, &span)
        .ok_or(AnchorFailure::Decode(kind))?;
    if projection.slice(start, end) != annotation.text {
        return Err(AnchorFailure::Verification(kind));
    }

    let refined = refine(doc, span).map_err(|_| AnchorFailure::Decode(kind))?;
    let painted = apply(doc, &refined, template);
    tag_markers(doc, &painted, &annotation.id);
    normalize(doc, painted);

    let markers = markers_for(doc, root, &annotation.id);
    if markers.is_empty() {
        return Err(AnchorFailure::Verification(kind));
    }
    if markers.iter().any(|&m| !text_within(doc, m, &annotation.text)) {
        remove_markers(doc, &markers);
        return Err(AnchorFailure::Verification(kind));
    }
    Ok(markers)
}

fn text_within(doc: &Document, marker: NodeId, text: &str) -> bool {
    text.contains(doc.text_content(marker).as_str())
}
