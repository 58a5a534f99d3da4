use crate::store::StoreError;

/// Errors that escape the engine.
///
/// Per-annotation matching failures never show up here: the resolver turns
/// them into a fallback attempt or an exhausted outcome. What remains are
/// contract violations by the caller and store failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Span is collapsed or reversed")]
    CollapsedSpan,
    #[error("Selection contains no highlightable text")]
    EmptySelection,
    #[error("Target region was removed from the tree during the operation")]
    StructuralMutationConflict,
    #[error("Annotation {0} has no anchor forms within the match level")]
    NoAnchorForms(String),
    #[error("Unknown annotation: {0}")]
    UnknownAnnotation(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
