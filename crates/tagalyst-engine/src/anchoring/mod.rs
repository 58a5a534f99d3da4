//! Portable anchors for highlighted spans.
//!
//! An [`AnchorDescriptor`] stores up to four alternative ways of finding a
//! span again, from the most precise and brittle to the loosest:
//!
//! 1. **Structural**: child-index path plus in-run offsets
//! 2. **Position**: character offsets into the root's flattened text
//! 3. **Quote**: exact text with surrounding context
//! 4. **Content**: exact text alone, first occurrence wins
//!
//! [`resolver::resolve`] walks these in order and stops at the first one that
//! verifies.

pub mod codec;
mod projection;
pub mod resolver;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{describe_markers, describe_span};
pub use projection::TextProjection;
pub use resolver::{ResolveOutcome, ResolveState, resolve};

/// Child-index paths from the root to the text runs holding each boundary.
///
/// Paths ignore marker elements and treat consecutive text nodes as one run,
/// so they mean the same thing whether or not highlights are painted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralAnchor {
    pub path: Vec<usize>,
    pub start_offset: usize,
    pub end_path: Vec<usize>,
    pub end_offset: usize,
}

/// Character range in the root's flattened text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAnchor {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteAnchor {
    pub exact: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAnchor {
    pub text: String,
}

/// Multi-strategy address of a span, independent of any live tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnchorDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural: Option<StructuralAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<QuoteAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentAnchor>,
}

impl AnchorDescriptor {
    /// Present forms in priority order.
    pub fn forms(&self) -> Vec<AnchorForm<'_>> {
        let mut forms = Vec::with_capacity(4);
        if let Some(structural) = &self.structural {
            forms.push(AnchorForm::Structural(structural));
        }
        if let Some(position) = &self.position {
            forms.push(AnchorForm::Position(position));
        }
        if let Some(quote) = &self.quote {
            forms.push(AnchorForm::Quote(quote));
        }
        if let Some(content) = &self.content
            && !content.text.is_empty()
        {
            forms.push(AnchorForm::Content(content));
        }
        forms
    }

    pub fn is_empty(&self) -> bool {
        self.forms().is_empty()
    }
}

/// One anchor form borrowed from a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorForm<'a> {
    Structural(&'a StructuralAnchor),
    Position(&'a PositionAnchor),
    Quote(&'a QuoteAnchor),
    Content(&'a ContentAnchor),
}

impl AnchorForm<'_> {
    pub fn kind(&self) -> FormKind {
        match self {
            AnchorForm::Structural(_) => FormKind::Structural,
            AnchorForm::Position(_) => FormKind::Position,
            AnchorForm::Quote(_) => FormKind::Quote,
            AnchorForm::Content(_) => FormKind::Content,
        }
    }
}

/// Anchor form tag, ordered by escalation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    Structural,
    Position,
    Quote,
    Content,
}

impl FormKind {
    /// Escalation level, 1 (structural) to 4 (content).
    pub fn level(self) -> u8 {
        match self {
            FormKind::Structural => 1,
            FormKind::Position => 2,
            FormKind::Quote => 3,
            FormKind::Content => 4,
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormKind::Structural => "structural",
            FormKind::Position => "position",
            FormKind::Quote => "quote",
            FormKind::Content => "content",
        };
        f.write_str(name)
    }
}

/// Why a single anchor form did not produce a match. Never leaves the
/// resolver loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorFailure {
    #[error("{0} anchor does not map onto the current tree")]
    Decode(FormKind),
    #[error("{0} anchor matched text that does not verify")]
    Verification(FormKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_forms_are_in_priority_order() {
        let descriptor = AnchorDescriptor {
            structural: None,
            position: Some(PositionAnchor { start: 0, end: 3 }),
            quote: Some(QuoteAnchor {
                exact: "abc".into(),
                prefix: String::new(),
                suffix: String::new(),
            }),
            content: Some(ContentAnchor { text: "abc".into() }),
        };

        let kinds: Vec<FormKind> = descriptor.forms().iter().map(|f| f.kind()).collect();

        assert_eq!(kinds, vec![FormKind::Position, FormKind::Quote, FormKind::Content]);
    }

    #[test]
    fn test_empty_content_is_not_a_form() {
        let descriptor = AnchorDescriptor {
            content: Some(ContentAnchor { text: String::new() }),
            ..AnchorDescriptor::default()
        };

        assert!(descriptor.is_empty());
    }

    #[test]
    fn test_descriptor_json_uses_camel_case_and_omits_missing_forms() {
        let descriptor = AnchorDescriptor {
            structural: Some(StructuralAnchor {
                path: vec![0, 1],
                start_offset: 2,
                end_path: vec![0, 1],
                end_offset: 5,
            }),
            ..AnchorDescriptor::default()
        };

        let json = serde_json::to_string(&descriptor).unwrap();

        assert_eq!(
            json,
            r#"{"structural":{"path":[0,1],"startOffset":2,"endPath":[0,1],"endOffset":5}}"#
        );
    }
}
