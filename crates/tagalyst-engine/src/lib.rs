pub mod anchoring;
pub mod annotation;
pub mod error;
pub mod highlight;
pub mod overlap;
pub mod range;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod tree;

// Re-export key types for easier usage
pub use anchoring::{AnchorDescriptor, FormKind, ResolveOutcome, ResolveState, TextProjection};
pub use annotation::{Annotation, StoredAnnotation, normalize_identity};
pub use error::EngineError;
pub use highlight::{HighlightStyle, marked_text};
pub use range::Span;
pub use scheduler::RestoreScheduler;
pub use service::{EngineSettings, Highlighter, Page, RestoreReport};
pub use store::{AnnotationStore, JsonFileStore, MemoryStore, StoreError};
pub use tree::{BoundaryPoint, Document, NodeId, TreeError};
