use std::cmp::Ordering;
use std::collections::HashMap;

use crate::range::Span;
use crate::tree::{BoundaryPoint, Document, NodeId};

#[derive(Debug, Clone, Copy)]
struct Segment {
    node: NodeId,
    start: usize,
    len: usize,
}

impl Segment {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Flattened text of a subtree with a map back to its text nodes.
///
/// All offsets are character offsets. The projection is a snapshot: it must
/// be rebuilt after the text topology changes (splits, merges, unwraps).
#[derive(Debug, Clone)]
pub struct TextProjection {
    text: String,
    /// Byte offset of every character, plus one entry for the end of text.
    boundaries: Vec<usize>,
    segments: Vec<Segment>,
    by_node: HashMap<NodeId, usize>,
}

impl TextProjection {
    pub fn new(doc: &Document, root: NodeId) -> Self {
        let mut text = String::new();
        let mut boundaries = Vec::new();
        let mut segments = Vec::new();
        let mut by_node = HashMap::new();
        for node in doc.text_leaves(root) {
            let value = doc.text(node).unwrap_or_default();
            let start = boundaries.len();
            boundaries.extend(value.char_indices().map(|(i, _)| text.len() + i));
            by_node.insert(node, segments.len());
            segments.push(Segment {
                node,
                start,
                len: boundaries.len() - start,
            });
            text.push_str(value);
        }
        boundaries.push(text.len());
        Self {
            text,
            boundaries,
            segments,
            by_node,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Substring by character range, clamped to the text.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let from = self.byte_at(start);
        let to = self.byte_at(end.max(start));
        &self.text[from..to]
    }

    fn byte_at(&self, pos: usize) -> usize {
        self.boundaries[pos.min(self.len())]
    }

    fn char_at_byte(&self, byte: usize) -> usize {
        self.boundaries.partition_point(|&b| b < byte)
    }

    /// Text point where the character at `pos` begins.
    pub fn start_point(&self, pos: usize) -> Option<BoundaryPoint> {
        let index = self.segments.partition_point(|s| s.end() <= pos);
        if let Some(segment) = self.segments.get(index) {
            return Some(BoundaryPoint::new(segment.node, pos - segment.start));
        }
        if pos == self.len() {
            return self
                .segments
                .iter()
                .rev()
                .find(|s| s.len > 0)
                .map(|s| BoundaryPoint::new(s.node, s.len));
        }
        None
    }

    /// Text point right after the character at `pos - 1`.
    pub fn end_point(&self, pos: usize) -> Option<BoundaryPoint> {
        if pos == 0 {
            return self.segments.first().map(|s| BoundaryPoint::new(s.node, 0));
        }
        let index = self.segments.partition_point(|s| s.end() < pos);
        self.segments[index..]
            .iter()
            .find(|s| s.start < pos && pos <= s.end())
            .map(|s| BoundaryPoint::new(s.node, pos - s.start))
    }

    /// Span over the character range `[start, end)`.
    pub fn span_for(&self, start: usize, end: usize) -> Option<Span> {
        if start >= end || end > self.len() {
            return None;
        }
        Some(Span::new(self.start_point(start)?, self.end_point(end)?))
    }

    /// Character offset of a boundary point.
    pub fn offset_of(&self, doc: &Document, point: BoundaryPoint) -> Option<usize> {
        if doc.is_text(point.node) {
            let segment = self.segments[*self.by_node.get(&point.node)?];
            return Some(segment.start + point.offset.min(segment.len));
        }
        // segments are in document order, so the ones before the point form a prefix
        let index = self
            .segments
            .partition_point(|s| doc.compare_points(BoundaryPoint::new(s.node, 0), point) == Ordering::Less);
        Some(self.segments.get(index).map_or(self.len(), |s| s.start))
    }

    /// Character range covered by a span.
    pub fn range_of(&self, doc: &Document, span: &Span) -> Option<(usize, usize)> {
        let start = self.offset_of(doc, span.start)?;
        let end = self.offset_of(doc, span.end)?;
        (start <= end).then_some((start, end))
    }

    /// Character range covered by a set of nodes, from the start of the first
    /// to the end of the last.
    pub fn range_of_nodes(&self, doc: &Document, nodes: &[NodeId]) -> Option<(usize, usize)> {
        let first = *nodes.first()?;
        let last = *nodes.last()?;
        let start = self.offset_of(doc, BoundaryPoint::new(first, 0))?;
        let end = self.offset_of(doc, BoundaryPoint::new(last, doc.node_length(last)))?;
        (start <= end).then_some((start, end))
    }

    /// Character positions of every occurrence of `needle`, including
    /// occurrences that overlap each other.
    pub fn find_all(&self, needle: &str) -> Vec<usize> {
        if needle.is_empty() {
            return Vec::new();
        }
        let mut found = Vec::new();
        let mut byte = 0;
        while let Some(relative) = self.text[byte..].find(needle) {
            let pos = self.char_at_byte(byte + relative);
            found.push(pos);
            // resume one character past the match start
            byte = self.byte_at(pos + 1);
        }
        found
    }

    /// Like [`find_all`](Self::find_all), comparing characters without
    /// regard to case. Every match is as many characters long as `needle`.
    pub fn find_all_ignore_case(&self, needle: &str) -> Vec<usize> {
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() {
            return Vec::new();
        }
        let haystack: Vec<char> = self.text.chars().collect();
        haystack
            .windows(needle.len())
            .enumerate()
            .filter(|(_, window)| {
                window
                    .iter()
                    .zip(&needle)
                    .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
            })
            .map(|(start, _)| start)
            .collect()
    }
}
