//! Encoding spans into [`AnchorDescriptor`]s and decoding them back onto a
//! (possibly changed) tree.

use crate::highlight::is_marker;
use crate::range::Span;
use crate::tree::{BoundaryPoint, Document, NodeId};

use super::{
    AnchorDescriptor, AnchorForm, ContentAnchor, PositionAnchor, QuoteAnchor, StructuralAnchor,
    TextProjection,
};

/// Default number of context characters stored on each side of a quote.
pub const DEFAULT_QUOTE_CONTEXT: usize = 32;

/// Build a descriptor carrying every anchor form for a span.
///
/// Returns `None` when the span is outside `root` or covers no text.
pub fn describe_span(
    doc: &Document,
    root: NodeId,
    span: &Span,
    quote_context: usize,
) -> Option<AnchorDescriptor> {
    let projection = TextProjection::new(doc, root);
    let (start, end) = projection.range_of(doc, span)?;
    describe_range(doc, root, &projection, start, end, quote_context)
}

/// Build a descriptor for the region covered by a set of markers.
pub fn describe_markers(
    doc: &Document,
    root: NodeId,
    markers: &[NodeId],
    quote_context: usize,
) -> Option<AnchorDescriptor> {
    let projection = TextProjection::new(doc, root);
    let (start, end) = projection.range_of_nodes(doc, markers)?;
    describe_range(doc, root, &projection, start, end, quote_context)
}

pub(crate) fn describe_range(
    doc: &Document,
    root: NodeId,
    projection: &TextProjection,
    start: usize,
    end: usize,
    quote_context: usize,
) -> Option<AnchorDescriptor> {
    if start >= end {
        return None;
    }
    let exact = projection.slice(start, end).to_string();
    Some(AnchorDescriptor {
        structural: structural_anchor(doc, root, projection, start, end),
        position: Some(PositionAnchor { start, end }),
        quote: Some(QuoteAnchor {
            exact: exact.clone(),
            prefix: projection
                .slice(start.saturating_sub(quote_context), start)
                .to_string(),
            suffix: projection.slice(end, end + quote_context).to_string(),
        }),
        content: Some(ContentAnchor { text: exact }),
    })
}

/// Decode one anchor form into a span over the current tree.
pub fn decode(
    doc: &Document,
    root: NodeId,
    projection: &TextProjection,
    form: AnchorForm<'_>,
) -> Option<Span> {
    match form {
        AnchorForm::Structural(anchor) => structural_to_span(doc, root, anchor),
        AnchorForm::Position(anchor) => position_to_span(projection, anchor),
        AnchorForm::Quote(anchor) => quote_to_span(projection, anchor),
        AnchorForm::Content(anchor) => content_to_span(projection, &anchor.text),
    }
}

// ============ Structural ============

/// Child of an element as seen by structural paths: markers are transparent
/// and adjacent text nodes form a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogicalChild {
    Element(NodeId),
    Run(Vec<NodeId>),
}

fn logical_children(doc: &Document, node: NodeId) -> Vec<LogicalChild> {
    let mut flat = Vec::new();
    flatten_markers(doc, node, &mut flat);

    let mut children: Vec<LogicalChild> = Vec::new();
    for child in flat {
        if doc.is_text(child) {
            if let Some(LogicalChild::Run(run)) = children.last_mut() {
                run.push(child);
                continue;
            }
            children.push(LogicalChild::Run(vec![child]));
        } else {
            children.push(LogicalChild::Element(child));
        }
    }
    children
}

fn flatten_markers(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    for &child in doc.children(node) {
        if is_marker(doc, child) {
            flatten_markers(doc, child, out);
        } else {
            out.push(child);
        }
    }
}

fn structural_anchor(
    doc: &Document,
    root: NodeId,
    projection: &TextProjection,
    start: usize,
    end: usize,
) -> Option<StructuralAnchor> {
    let (path, start_offset) = logical_address(doc, root, projection.start_point(start)?)?;
    let (end_path, end_offset) = logical_address(doc, root, projection.end_point(end)?)?;
    Some(StructuralAnchor {
        path,
        start_offset,
        end_path,
        end_offset,
    })
}

/// Logical path and in-run offset of a text point.
fn logical_address(doc: &Document, root: NodeId, point: BoundaryPoint) -> Option<(Vec<usize>, usize)> {
    let text = point.node;
    if !doc.is_text(text) || !doc.contains(root, text) {
        return None;
    }
    let mut chain: Vec<NodeId> = doc
        .ancestors(text)
        .into_iter()
        .take_while(|&a| a != root)
        .filter(|&a| !is_marker(doc, a))
        .collect();
    chain.reverse();

    let mut path = Vec::with_capacity(chain.len() + 1);
    let mut parent = root;
    for element in chain {
        let index = logical_children(doc, parent)
            .iter()
            .position(|c| *c == LogicalChild::Element(element))?;
        path.push(index);
        parent = element;
    }

    let children = logical_children(doc, parent);
    let (index, run) = children.iter().enumerate().find_map(|(i, c)| match c {
        LogicalChild::Run(run) if run.contains(&text) => Some((i, run)),
        _ => None,
    })?;
    path.push(index);

    let before: usize = run
        .iter()
        .take_while(|&&n| n != text)
        .map(|&n| doc.node_length(n))
        .sum();
    Some((path, before + point.offset))
}

/// Walk a structural anchor. Fails instead of guessing when any index or
/// offset is out of range.
pub fn structural_to_span(doc: &Document, root: NodeId, anchor: &StructuralAnchor) -> Option<Span> {
    let start = resolve_address(doc, root, &anchor.path, anchor.start_offset, Bias::Start)?;
    let end = resolve_address(doc, root, &anchor.end_path, anchor.end_offset, Bias::End)?;
    Some(Span::new(start, end))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bias {
    Start,
    End,
}

fn resolve_address(
    doc: &Document,
    root: NodeId,
    path: &[usize],
    offset: usize,
    bias: Bias,
) -> Option<BoundaryPoint> {
    let (&last, init) = path.split_last()?;
    let mut node = root;
    for &index in init {
        match logical_children(doc, node).into_iter().nth(index)? {
            LogicalChild::Element(element) => node = element,
            LogicalChild::Run(_) => return None,
        }
    }
    let LogicalChild::Run(run) = logical_children(doc, node).into_iter().nth(last)? else {
        return None;
    };

    let mut consumed = 0;
    for (i, &text) in run.iter().enumerate() {
        let len = doc.node_length(text);
        let inside = match bias {
            Bias::Start => offset < consumed + len,
            Bias::End => offset > consumed && offset <= consumed + len,
        };
        if inside || (bias == Bias::End && offset == 0 && i == 0) {
            return Some(BoundaryPoint::new(text, offset - consumed));
        }
        consumed += len;
    }
    // start bias at the very end of the run
    (bias == Bias::Start && offset == consumed)
        .then(|| run.last().map(|&n| BoundaryPoint::new(n, doc.node_length(n))))
        .flatten()
}

// ============ Position ============

pub fn position_to_span(projection: &TextProjection, anchor: &PositionAnchor) -> Option<Span> {
    projection.span_for(anchor.start, anchor.end)
}

// ============ Quote / content ============

/// Find the quoted text, using prefix/suffix context to choose between
/// repeated occurrences. Ties go to the earliest occurrence.
pub fn quote_to_span(projection: &TextProjection, anchor: &QuoteAnchor) -> Option<Span> {
    let exact_len = anchor.exact.chars().count();
    let prefix_len = anchor.prefix.chars().count();
    let suffix_len = anchor.suffix.chars().count();
    let best = projection
        .find_all(&anchor.exact)
        .into_iter()
        .map(|start| {
            let end = start + exact_len;
            let before = projection.slice(start.saturating_sub(prefix_len), start);
            let after = projection.slice(end, end + suffix_len);
            let score = common_suffix_len(before, &anchor.prefix)
                + common_prefix_len(after, &anchor.suffix);
            (start, score)
        })
        .fold(None, |best: Option<(usize, usize)>, candidate| match best {
            Some((_, score)) if score >= candidate.1 => best,
            _ => Some(candidate),
        })?;
    projection.span_for(best.0, best.0 + exact_len)
}

/// First occurrence of `text`.
pub fn content_to_span(projection: &TextProjection, text: &str) -> Option<Span> {
    let start = *projection.find_all(text).first()?;
    projection.span_for(start, start + text.chars().count())
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

fn common_suffix_len(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::{HighlightStyle, MarkerTemplate, apply, normalize};
    use crate::range::refine;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const ARTICLE: &str = "<body><h1>Title</h1><p>The quick <em>brown</em> fox.</p><p>Jumps over the lazy dog.</p></body>";

    fn span_text(doc: &Document, root: NodeId, span: &Span) -> String {
        let projection = TextProjection::new(doc, root);
        let (start, end) = projection.range_of(doc, span).unwrap();
        projection.slice(start, end).to_string()
    }

    fn describe_chars(doc: &Document, start: usize, end: usize) -> AnchorDescriptor {
        let projection = TextProjection::new(doc, doc.root());
        let span = projection.span_for(start, end).unwrap();
        describe_span(doc, doc.root(), &span, 8).unwrap()
    }

    #[rstest]
    #[case(0, 5)]
    #[case(9, 20)]
    #[case(15, 25)]
    #[case(19, 30)]
    fn test_every_form_round_trips_on_stable_tree(#[case] start: usize, #[case] end: usize) {
        let doc = Document::parse(ARTICLE).unwrap();
        let root = doc.root();
        let expected = TextProjection::new(&doc, root).slice(start, end).to_string();
        let descriptor = describe_chars(&doc, start, end);
        let projection = TextProjection::new(&doc, root);

        for form in descriptor.forms() {
            let span = decode(&doc, root, &projection, form)
                .unwrap_or_else(|| panic!("{} form failed to decode", form.kind()));
            assert_eq!(span_text(&doc, root, &span), expected, "{} form", form.kind());
        }
    }

    #[test]
    fn test_describe_records_context() {
        let doc = Document::parse(ARTICLE).unwrap();

        let descriptor = describe_chars(&doc, 15, 20);

        let quote = descriptor.quote.unwrap();
        assert_eq!(quote.exact, "brown");
        assert_eq!(quote.prefix, "e quick ");
        assert_eq!(quote.suffix, " fox.Jum");
        assert_eq!(descriptor.position, Some(PositionAnchor { start: 15, end: 20 }));
    }

    #[test]
    fn test_structural_paths_ignore_markers() {
        let mut doc = Document::parse(ARTICLE).unwrap();
        let root = doc.root();
        let before = describe_chars(&doc, 21, 24).structural.unwrap();

        // paint "quick" so the paragraph's text is split and wrapped
        let span = TextProjection::new(&doc, root).span_for(9, 14).unwrap();
        let refined = refine(&mut doc, span).unwrap();
        let markers = apply(&mut doc, &refined, &MarkerTemplate::new(HighlightStyle::default(), 1));
        normalize(&mut doc, markers);

        let after = describe_chars(&doc, 21, 24).structural.unwrap();
        assert_eq!(after, before);
        let span = structural_to_span(&doc, root, &after).unwrap();
        assert_eq!(span_text(&doc, root, &span), "fox");
    }

    #[test]
    fn test_describe_markers_covers_first_to_last_marker() {
        let mut doc = Document::parse(ARTICLE).unwrap();
        let root = doc.root();
        let span = TextProjection::new(&doc, root).span_for(15, 25).unwrap();
        let refined = refine(&mut doc, span).unwrap();
        let markers = apply(&mut doc, &refined, &MarkerTemplate::new(HighlightStyle::default(), 1));
        let markers = normalize(&mut doc, markers);
        assert_eq!(markers.len(), 2);

        let descriptor = describe_markers(&doc, root, &markers, 4).unwrap();

        assert_eq!(descriptor.position, Some(PositionAnchor { start: 15, end: 25 }));
        assert_eq!(descriptor.content.unwrap().text, "brown fox.");
    }

    #[test]
    fn test_structural_decode_fails_on_out_of_range_index() {
        let doc = Document::parse(ARTICLE).unwrap();
        let anchor = StructuralAnchor {
            path: vec![7, 0],
            start_offset: 0,
            end_path: vec![7, 0],
            end_offset: 2,
        };

        assert_eq!(structural_to_span(&doc, doc.root(), &anchor), None);
    }

    #[test]
    fn test_structural_decode_fails_on_out_of_range_offset() {
        let doc = Document::parse(ARTICLE).unwrap();
        let anchor = StructuralAnchor {
            path: vec![0, 0],
            start_offset: 0,
            end_path: vec![0, 0],
            end_offset: 99,
        };

        assert_eq!(structural_to_span(&doc, doc.root(), &anchor), None);
    }

    #[test]
    fn test_quote_prefers_occurrence_with_matching_context() {
        let doc = Document::parse("<body><p>red apple, green apple, red apple</p></body>").unwrap();
        let projection = TextProjection::new(&doc, doc.root());
        let anchor = QuoteAnchor {
            exact: "apple".into(),
            prefix: "green ".into(),
            suffix: ", red".into(),
        };

        let span = quote_to_span(&projection, &anchor).unwrap();

        assert_eq!(projection.range_of(&doc, &span), Some((17, 22)));
    }

    #[test]
    fn test_quote_scores_overlapping_occurrences() {
        let doc = Document::parse("<body><p>ababa</p></body>").unwrap();
        let projection = TextProjection::new(&doc, doc.root());
        let anchor = QuoteAnchor {
            exact: "aba".into(),
            prefix: "ab".into(),
            suffix: String::new(),
        };

        let span = quote_to_span(&projection, &anchor).unwrap();

        assert_eq!(projection.range_of(&doc, &span), Some((2, 5)));
    }

    #[test]
    fn test_quote_without_context_falls_back_to_first_occurrence() {
        let doc = Document::parse("<body><p>one two one</p></body>").unwrap();
        let projection = TextProjection::new(&doc, doc.root());
        let anchor = QuoteAnchor {
            exact: "one".into(),
            prefix: String::new(),
            suffix: String::new(),
        };

        let span = quote_to_span(&projection, &anchor).unwrap();

        assert_eq!(projection.range_of(&doc, &span), Some((0, 3)));
    }

    #[test]
    fn test_content_search_misses_absent_text() {
        let doc = Document::parse(ARTICLE).unwrap();
        let projection = TextProjection::new(&doc, doc.root());

        assert!(content_to_span(&projection, "purple").is_none());
        assert!(content_to_span(&projection, "lazy").is_some());
    }
}
