//! Command surface over a document and a store.

use std::time::{Duration, Instant};

use crate::anchoring::codec::{DEFAULT_QUOTE_CONTEXT, describe_range};
use crate::anchoring::{ResolveOutcome, TextProjection, resolve};
use crate::annotation::{Annotation, normalize_identity};
use crate::error::EngineError;
use crate::highlight::{
    HighlightStyle, MarkerTemplate, apply, markers_for, markers_in, normalize, remove_markers,
    tag_markers,
};
use crate::overlap::{find_overlaps, supersede};
use crate::range::{Span, refine};
use crate::scheduler::{DEFAULT_DEBOUNCE, RestoreScheduler};
use crate::store::AnnotationStore;
use crate::tree::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Highest anchor form tried on restore, 1 (structural) to 4 (content)
    pub max_match_level: u8,
    pub style: HighlightStyle,
    pub flash_class: String,
    pub quote_context: usize,
    pub debounce: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_match_level: 3,
            style: HighlightStyle::default(),
            flash_class: "tagalyst-highlight-flash".to_string(),
            quote_context: DEFAULT_QUOTE_CONTEXT,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// A document as the engine sees it: an identity and the root below which
/// annotations live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub identity: String,
    pub root: NodeId,
}

impl Page {
    pub fn new(identity: &str, root: NodeId) -> Self {
        Self {
            identity: normalize_identity(identity),
            root,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub failed: usize,
    /// The root left the tree during the pass
    pub aborted: bool,
}

pub struct Highlighter<S: AnnotationStore> {
    store: S,
    settings: EngineSettings,
    scheduler: RestoreScheduler,
    last_timestamp: u64,
}

impl<S: AnnotationStore> Highlighter<S> {
    pub fn new(store: S, settings: EngineSettings) -> Self {
        let scheduler = RestoreScheduler::new(settings.debounce);
        Self {
            store,
            settings,
            scheduler,
            last_timestamp: 0,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unix milliseconds, strictly increasing across calls.
    fn next_timestamp(&mut self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    /// Persist and paint a new annotation for `selection`.
    ///
    /// Existing annotations overlapping the selection are unpainted and
    /// dropped from the store in the same write that adds the new one. If the
    /// new selection cannot be painted they are painted again and the store
    /// is left alone.
    pub fn create_annotation(
        &mut self,
        doc: &mut Document,
        page: &Page,
        selection: Span,
        note: &str,
    ) -> Result<Annotation, EngineError> {
        if !doc.is_attached(page.root) {
            return Err(EngineError::StructuralMutationConflict);
        }
        if selection.is_collapsed(doc) {
            return Err(EngineError::CollapsedSpan);
        }
        let projection = TextProjection::new(doc, page.root);
        let (start, end) = projection
            .range_of(doc, &selection)
            .ok_or(EngineError::StructuralMutationConflict)?;
        let text = projection.slice(start, end).to_string();
        if text.trim().is_empty() {
            return Err(EngineError::EmptySelection);
        }
        let anchors = describe_range(
            doc,
            page.root,
            &projection,
            start,
            end,
            self.settings.quote_context,
        )
        .ok_or(EngineError::CollapsedSpan)?;

        let mut records = self.store.get(&page.identity)?;
        let overlapping: Vec<Annotation> =
            find_overlaps(doc, page.root, (start, end), &records, &page.identity)
                .into_iter()
                .cloned()
                .collect();
        let superseded = supersede(doc, page.root, &overlapping.iter().collect::<Vec<_>>());
        records.retain(|a| !superseded.contains(&a.id));

        let timestamp = self.next_timestamp();
        let mut annotation = Annotation::new(&page.identity, text, anchors, timestamp as i64)
            .with_style(self.settings.style.clone());
        annotation.user_note = note.to_string();

        // unpainting merges text nodes, so the selection is mapped again
        let painted = TextProjection::new(doc, page.root)
            .span_for(start, end)
            .ok_or(EngineError::StructuralMutationConflict)
            .and_then(|span| self.paint(doc, page.root, span, &annotation.id, timestamp))
            .and_then(|markers| {
                if markers.is_empty() {
                    Err(EngineError::EmptySelection)
                } else {
                    Ok(markers)
                }
            });
        let markers = match painted {
            Ok(markers) => markers,
            Err(err) => {
                self.repaint(doc, page.root, &overlapping);
                return Err(err);
            }
        };

        records.push(annotation.clone());
        self.store.set(&page.identity, records)?;
        log::info!(
            "created annotation {} with {} markers ({} superseded)",
            annotation.id,
            markers.len(),
            superseded.len()
        );
        Ok(annotation)
    }

    fn paint(
        &self,
        doc: &mut Document,
        root: NodeId,
        span: Span,
        annotation_id: &str,
        timestamp: u64,
    ) -> Result<Vec<NodeId>, EngineError> {
        let refined = refine(doc, span)?;
        let template = MarkerTemplate::new(self.settings.style.clone(), timestamp);
        let painted = apply(doc, &refined, &template);
        tag_markers(doc, &painted, annotation_id);
        normalize(doc, painted);
        Ok(markers_for(doc, root, annotation_id))
    }

    /// Put superseded annotations back after a failed create.
    fn repaint(&self, doc: &mut Document, root: NodeId, annotations: &[Annotation]) {
        doc.normalize_text_nodes(root);
        for annotation in annotations {
            match self.restore_one(doc, root, annotation) {
                Ok(outcome) if outcome.is_matched() => {}
                Ok(_) => log::warn!("annotation {} could not be repainted", annotation.id),
                Err(err) => log::warn!("annotation {} could not be repainted: {err}", annotation.id),
            }
        }
    }

    fn restore_one(
        &self,
        doc: &mut Document,
        root: NodeId,
        annotation: &Annotation,
    ) -> Result<ResolveOutcome, EngineError> {
        let style = annotation
            .style
            .clone()
            .unwrap_or_else(|| self.settings.style.clone());
        let timestamp = u64::try_from(annotation.created_at).unwrap_or_default();
        let template = MarkerTemplate::new(style, timestamp);
        resolve(doc, root, annotation, self.settings.max_match_level, &template)
    }

    /// Paint every stored annotation of the page that is not painted yet.
    ///
    /// Annotations that cannot be found are counted as failed and stay in the
    /// store. A record without usable anchor forms is an error.
    pub fn restore_all(&mut self, doc: &mut Document, page: &Page) -> Result<RestoreReport, EngineError> {
        let mut report = RestoreReport::default();
        if !doc.is_attached(page.root) {
            log::warn!("restore of {} aborted: root is detached", page.identity);
            report.aborted = true;
            return Ok(report);
        }

        let records = self.store.get(&page.identity)?;
        for annotation in &records {
            if !markers_for(doc, page.root, &annotation.id).is_empty() {
                report.restored += 1;
                continue;
            }
            match self.restore_one(doc, page.root, annotation) {
                Ok(outcome) if outcome.is_matched() => report.restored += 1,
                Ok(_) => report.failed += 1,
                Err(EngineError::StructuralMutationConflict) => {
                    log::warn!("restore of {} aborted mid-pass", page.identity);
                    report.aborted = true;
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        log::info!(
            "restored {} of {} annotations for {}",
            report.restored,
            records.len(),
            page.identity
        );
        Ok(report)
    }

    /// Record a tree mutation; the next due restore pass picks it up.
    pub fn notify_mutation(&mut self, now: Instant) {
        self.scheduler.notify(now);
    }

    /// Run a restore pass if the debounce window has elapsed. An aborted pass
    /// is scheduled again.
    pub fn restore_due(
        &mut self,
        doc: &mut Document,
        page: &Page,
        now: Instant,
    ) -> Result<Option<RestoreReport>, EngineError> {
        if !self.scheduler.poll(now) {
            return Ok(None);
        }
        let result = self.restore_all(doc, page);
        self.scheduler.finish(now);
        let report = result?;
        if report.aborted {
            self.scheduler.notify(now);
        }
        Ok(Some(report))
    }

    /// Flash the markers of one annotation. Returns whether any exist.
    pub fn scroll_to_annotation(&self, doc: &mut Document, page: &Page, annotation_id: &str) -> bool {
        for marker in markers_in(doc, page.root) {
            doc.remove_class(marker, &self.settings.flash_class);
        }
        let markers = markers_for(doc, page.root, annotation_id);
        for &marker in &markers {
            doc.add_class(marker, &self.settings.flash_class);
        }
        !markers.is_empty()
    }

    pub fn remove_annotation(
        &mut self,
        doc: &mut Document,
        page: &Page,
        annotation_id: &str,
    ) -> Result<(), EngineError> {
        let mut records = self.store.get(&page.identity)?;
        let index = records
            .iter()
            .position(|a| a.id == annotation_id)
            .ok_or_else(|| EngineError::UnknownAnnotation(annotation_id.to_string()))?;
        records.remove(index);

        let markers = markers_for(doc, page.root, annotation_id);
        remove_markers(doc, &markers);
        self.store.set(&page.identity, records)?;
        log::info!("removed annotation {annotation_id}");
        Ok(())
    }

    pub fn set_note(&mut self, identity: &str, annotation_id: &str, note: &str) -> Result<Annotation, EngineError> {
        let mut records = self.store.get(identity)?;
        let annotation = records
            .iter_mut()
            .find(|a| a.id == annotation_id)
            .ok_or_else(|| EngineError::UnknownAnnotation(annotation_id.to_string()))?;
        annotation.user_note = note.to_string();
        let updated = annotation.clone();
        self.store.set(identity, records)?;
        Ok(updated)
    }

    pub fn annotations(&self, identity: &str) -> Result<Vec<Annotation>, EngineError> {
        Ok(self.store.get(identity)?)
    }

    /// Paint every occurrence of `text` without persisting anything.
    /// Occurrences overlapping an earlier one are skipped.
    pub fn highlight_text(
        &mut self,
        doc: &mut Document,
        page: &Page,
        text: &str,
        case_sensitive: bool,
    ) -> Result<Vec<NodeId>, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::EmptySelection);
        }
        let length = text.chars().count();
        let projection = TextProjection::new(doc, page.root);
        let occurrences = if case_sensitive {
            projection.find_all(text)
        } else {
            projection.find_all_ignore_case(text)
        };
        let template = MarkerTemplate::new(self.settings.style.clone(), self.next_timestamp());

        let mut painted = Vec::new();
        let mut free_from = 0;
        for start in occurrences {
            if start < free_from {
                continue;
            }
            free_from = start + length;
            // splits from earlier occurrences invalidate node positions, not offsets
            let Some(span) = TextProjection::new(doc, page.root).span_for(start, start + length) else {
                continue;
            };
            let refined = refine(doc, span)?;
            painted.extend(apply(doc, &refined, &template));
        }
        Ok(normalize(doc, painted))
    }

    /// Remove every marker below `root`, restoring the original text runs.
    pub fn clear_highlights(&self, doc: &mut Document, root: NodeId) -> usize {
        let markers = markers_in(doc, root);
        remove_markers(doc, &markers);
        markers.len()
    }
}
