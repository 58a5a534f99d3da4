//! XHTML fixtures in and out of the arena.

use super::{Document, NodeId, NodeKind};

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Failed to parse markup: {0}")]
    Parse(#[from] roxmltree::Error),
}

impl Document {
    /// Build a document from well-formed XHTML/XML markup.
    ///
    /// Comments and processing instructions are dropped; whitespace-only text
    /// is kept so that flattened text matches what a browser would report.
    pub fn parse(markup: &str) -> Result<Self, TreeError> {
        let mut options = roxmltree::ParsingOptions::default();
        options.allow_dtd = true;
        let source = roxmltree::Document::parse_with_options(markup, options)?;
        let root_element = source.root_element();

        let mut doc = Document::new(root_element.tag_name().name());
        let root = doc.root();
        copy_attributes(&mut doc, root, root_element);
        for child in root_element.children() {
            import_node(&mut doc, root, child);
        }
        Ok(doc)
    }

    /// Create a document from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let markup = std::str::from_utf8(bytes)?;
        Ok(Self::parse(markup)?)
    }

    /// Serialize the subtree rooted at `node` back to markup.
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Element(data) => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                if !self.has_children(node) {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &child in self.children(node) {
                    self.write_markup(child, out);
                }
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
        }
    }
}

fn import_node(doc: &mut Document, parent: NodeId, source: roxmltree::Node<'_, '_>) {
    if source.is_element() {
        let element = doc.create_element(source.tag_name().name());
        copy_attributes(doc, element, source);
        doc.append_child(parent, element);
        for child in source.children() {
            import_node(doc, element, child);
        }
    } else if source.is_text()
        && let Some(text) = source.text()
    {
        let node = doc.create_text(text);
        doc.append_child(parent, node);
    }
}

fn copy_attributes(doc: &mut Document, element: NodeId, source: roxmltree::Node<'_, '_>) {
    for attribute in source.attributes() {
        doc.set_attribute(element, attribute.name(), attribute.value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_keeps_structure_and_text() {
        let doc = Document::parse(r#"<body><p class="lead">Hello <b>world</b></p></body>"#).unwrap();

        let p = doc.children(doc.root())[0];
        assert_eq!(doc.tag(p), Some("p"));
        assert_eq!(doc.attribute(p, "class"), Some("lead"));
        assert_eq!(doc.children(p).len(), 2);
        assert_eq!(doc.text_content(doc.root()), "Hello world");
    }

    #[test]
    fn test_markup_round_trip_escapes_text() {
        let source = r#"<body><p title="a b">x &lt; y &amp; z</p><br/></body>"#;
        let doc = Document::parse(source).unwrap();

        insta::assert_snapshot!(
            doc.to_markup(doc.root()),
            @r#"<body><p title="a b">x &lt; y &amp; z</p><br/></body>"#
        );
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        assert!(Document::from_bytes(&[0x3c, 0xff, 0x3e]).is_err());
        assert!(Document::from_bytes(b"<body>ok</body>").is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed_markup() {
        let result = Document::parse("<body><p>unclosed</body>");
        assert!(matches!(result, Err(TreeError::Parse(_))));
    }
}
