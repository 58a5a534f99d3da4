//! Persisted annotation records.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::anchoring::{AnchorDescriptor, ContentAnchor, PositionAnchor, QuoteAnchor};
use crate::highlight::HighlightStyle;

/// Version written into every record this crate produces.
pub const SCHEMA_VERSION: u32 = 2;

/// A highlighted span plus the user's note about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub document_identity: String,
    /// Selected text at creation time
    pub text: String,
    #[serde(default)]
    pub user_note: String,
    pub anchors: AnchorDescriptor,
    /// Unix milliseconds
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<HighlightStyle>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Annotation {
    pub fn new(
        document_identity: &str,
        text: impl Into<String>,
        anchors: AnchorDescriptor,
        created_at: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_identity: normalize_identity(document_identity),
            text: text.into(),
            user_note: String::new(),
            anchors,
            created_at,
            style: None,
            schema_version: SCHEMA_VERSION,
        }
    }

    pub fn with_style(mut self, style: HighlightStyle) -> Self {
        self.style = Some(style);
        self
    }
}

/// Snippet layout written by the first release: a DOM-path selection with an
/// ISO timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySnippet {
    pub id: String,
    pub url: String,
    pub text: String,
    #[serde(default)]
    pub start_container_path: String,
    #[serde(default)]
    pub start_offset: usize,
    #[serde(default)]
    pub end_container_path: String,
    #[serde(default)]
    pub end_offset: usize,
    #[serde(default)]
    pub timestamp: String,
}

/// Snippet layout with text-position and text-quote selectors next to a
/// serialized DOM range, and the note stored as `annotation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSnippet {
    pub id: String,
    pub url: String,
    pub text: String,
    #[serde(default)]
    pub annotation: String,
    pub anchors: SnippetSelectors,
    /// Highlight class name
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetSelectors {
    #[serde(default)]
    pub rangy_serialized: Option<String>,
    #[serde(default)]
    pub text_position: Option<PositionAnchor>,
    #[serde(default)]
    pub text_quote: Option<QuoteAnchor>,
}

/// Any record found in a store, current or legacy.
///
/// Variants are tried in order; `Selector` needs an `anchors` object, which
/// the oldest layout never has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredAnnotation {
    Current(Annotation),
    Selector(SelectorSnippet),
    Legacy(LegacySnippet),
}

impl StoredAnnotation {
    /// Bring a record to the current schema.
    ///
    /// Legacy DOM paths and serialized DOM ranges count element siblings by
    /// tag name and cannot be mapped onto structural anchors. A legacy snippet
    /// keeps only its text, as a quote without context and as content; a
    /// selector snippet keeps its position and quote selectors as well.
    pub fn upgrade(self) -> Annotation {
        match self {
            StoredAnnotation::Current(annotation) => annotation,
            StoredAnnotation::Selector(snippet) => {
                if snippet.anchors.rangy_serialized.is_some() {
                    log::debug!("dropping serialized DOM range of snippet {}", snippet.id);
                }
                let quote = snippet.anchors.text_quote.unwrap_or_else(|| QuoteAnchor {
                    exact: snippet.text.clone(),
                    prefix: String::new(),
                    suffix: String::new(),
                });
                let anchors = AnchorDescriptor {
                    position: snippet.anchors.text_position,
                    quote: Some(quote),
                    content: Some(ContentAnchor {
                        text: snippet.text.clone(),
                    }),
                    ..AnchorDescriptor::default()
                };
                let style = snippet.style.map(|name| HighlightStyle {
                    name,
                    ..HighlightStyle::default()
                });
                Annotation {
                    id: snippet.id,
                    document_identity: normalize_identity(&snippet.url),
                    text: snippet.text,
                    user_note: snippet.annotation,
                    anchors,
                    created_at: 0,
                    style,
                    schema_version: SCHEMA_VERSION,
                }
            }
            StoredAnnotation::Legacy(snippet) => {
                let created_at = DateTime::parse_from_rfc3339(&snippet.timestamp)
                    .map(|t| t.timestamp_millis())
                    .unwrap_or_default();
                let anchors = AnchorDescriptor {
                    quote: Some(QuoteAnchor {
                        exact: snippet.text.clone(),
                        prefix: String::new(),
                        suffix: String::new(),
                    }),
                    content: Some(ContentAnchor {
                        text: snippet.text.clone(),
                    }),
                    ..AnchorDescriptor::default()
                };
                log::debug!("upgrading legacy snippet {}", snippet.id);
                Annotation {
                    id: snippet.id,
                    document_identity: normalize_identity(&snippet.url),
                    text: snippet.text,
                    user_note: String::new(),
                    anchors,
                    created_at,
                    style: None,
                    schema_version: SCHEMA_VERSION,
                }
            }
        }
    }
}

/// Canonical document identity: the URL without fragment or trailing slash.
pub fn normalize_identity(identity: &str) -> String {
    let without_fragment = identity.split('#').next().unwrap_or_default();
    let trimmed = without_fragment.trim();
    match trimmed.strip_suffix('/') {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => trimmed.to_string(),
    }
}
