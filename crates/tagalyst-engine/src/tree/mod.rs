//! In-memory host tree.
//!
//! The engine never talks to a browser DOM directly. Everything it needs from
//! a host tree (ordered children, text splitting, wrap/unwrap, flattened text,
//! document-order comparison) is exposed by [`Document`], an arena of nodes
//! addressed by [`NodeId`]. Nodes are never freed: detaching a node only
//! unlinks it from its parent, so stale ids stay valid and can be checked with
//! [`Document::is_attached`].

pub mod markup;

use std::cmp::Ordering;

pub use markup::TreeError;

/// Handle of a node inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Tag name and attributes of an element node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementData {
    /// Lower-case tag name
    pub tag: String,
    /// Attributes in source order
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A point between two characters of a text node, or between two children
/// of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryPoint {
    pub node: NodeId,
    /// Character index for text nodes, child index for elements
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Arena-backed element/text tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Document {
    /// Create a document consisting of a single empty root element.
    pub fn new(root_tag: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.create_element(root_tag);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ============ Construction ============

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Copy a node without its children.
    pub fn clone_shallow(&mut self, node: NodeId) -> NodeId {
        let kind = self.nodes[node.0].kind.clone();
        self.push(kind)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // ============ Inspection ============

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Text(_))
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Element(_))
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element(data) => Some(data.tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element(_) => None,
        }
    }

    /// Length of a node for boundary purposes: characters for text, children
    /// for elements.
    pub fn node_length(&self, node: NodeId) -> usize {
        match self.kind(node) {
            NodeKind::Text(text) => text.chars().count(),
            NodeKind::Element(_) => self.nodes[node.0].children.len(),
        }
    }

    pub fn set_text(&mut self, node: NodeId, value: &str) {
        if let NodeKind::Text(text) = &mut self.nodes[node.0].kind {
            *text = value.to_string();
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn has_children(&self, node: NodeId) -> bool {
        !self.nodes[node.0].children.is_empty()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).first().copied()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).last().copied()
    }

    /// Position of `node` among its parent's children.
    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        index
            .checked_sub(1)
            .map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Parent chain, nearest first. Does not include `node` itself.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(node);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }

    pub fn depth(&self, node: NodeId) -> usize {
        self.ancestors(node).len()
    }

    /// True if `ancestor` is `node` or one of its ancestors.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    /// True if the node is reachable from the document root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        std::iter::once(a)
            .chain(self.ancestors(a))
            .find(|&candidate| self.contains(candidate, b))
    }

    // ============ Attributes ============

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element(data) => data
                .attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            match data.attributes.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => data.attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            data.attributes.retain(|(key, _)| key != name);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if !self.is_element(node) || self.has_class(node, class) {
            return;
        }
        let classes = match self.attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &classes);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(existing) = self.attribute(node, "class") else {
            return;
        };
        let remaining: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            let joined = remaining.join(" ");
            self.set_attribute(node, "class", &joined);
        }
    }

    // ============ Mutation ============

    /// Unlink a node from its parent. The node and its subtree stay in the
    /// arena and can be re-inserted.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_child(parent, 0, child);
    }

    /// Insert `child` at `index` among `parent`'s children (clamped).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `node` as the sibling directly before `reference`.
    /// Does nothing when `reference` is detached.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if node == reference {
            return;
        }
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference)) {
            self.insert_child(parent, index, node);
        }
    }

    /// Insert `node` as the sibling directly after `reference`.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        if node == reference {
            return;
        }
        self.detach(node);
        if let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference)) {
            self.insert_child(parent, index + 1, node);
        }
    }

    /// Put `wrapper` where `node` is and move `node` inside it.
    pub fn wrap(&mut self, node: NodeId, wrapper: NodeId) -> NodeId {
        if self.parent(node).is_some() {
            self.insert_before(node, wrapper);
        }
        self.append_child(wrapper, node);
        wrapper
    }

    /// Replace `node` by its children. Returns the moved children.
    pub fn unwrap(&mut self, node: NodeId) -> Vec<NodeId> {
        let children = self.children(node).to_vec();
        if self.parent(node).is_some() {
            for &child in &children {
                self.insert_before(node, child);
            }
        }
        self.detach(node);
        children
    }

    /// Split a text node at a character offset. The original node keeps the
    /// left half; the right half becomes a new sibling which is returned.
    pub fn split_text(&mut self, node: NodeId, offset: usize) -> NodeId {
        let text = self.text(node).unwrap_or_default().to_string();
        let at = byte_offset(&text, offset);
        let (left, right) = text.split_at(at);
        let right = self.create_text(right);
        self.set_text(node, left);
        self.insert_after(node, right);
        right
    }

    /// Merge adjacent text children and drop empty ones, recursively.
    pub fn normalize_text_nodes(&mut self, node: NodeId) {
        let children = self.children(node).to_vec();
        let mut previous_text: Option<NodeId> = None;
        for child in children {
            match self.kind(child).clone() {
                NodeKind::Text(text) => {
                    if text.is_empty() {
                        self.detach(child);
                    } else if let Some(previous) = previous_text {
                        let merged = format!("{}{text}", self.text(previous).unwrap_or_default());
                        self.set_text(previous, &merged);
                        self.detach(child);
                    } else {
                        previous_text = Some(child);
                    }
                }
                NodeKind::Element(_) => {
                    previous_text = None;
                    self.normalize_text_nodes(child);
                }
            }
        }
    }

    // ============ Traversal ============

    /// All nodes below `node` (inclusive) in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Text nodes below `node` in document order.
    pub fn text_leaves(&self, node: NodeId) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.is_text(n))
            .collect()
    }

    /// Concatenated text of all text nodes below `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        self.text_leaves(node)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// First element (document order) with the given tag.
    pub fn find_element(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| self.tag(n) == Some(tag))
    }

    /// Elements below `node` (inclusive) carrying the given attribute.
    pub fn elements_with_attribute(&self, node: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.has_attribute(n, name))
            .collect()
    }

    /// Child-index path from `ancestor` down to `node`.
    pub fn path_from(&self, ancestor: NodeId, node: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = node;
        while current != ancestor {
            path.push(self.index_in_parent(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    /// Follow a child-index path; `None` if any index is out of range.
    pub fn node_at_path(&self, ancestor: NodeId, path: &[usize]) -> Option<NodeId> {
        path.iter()
            .try_fold(ancestor, |node, &index| self.children(node).get(index).copied())
    }

    // ============ Document order ============

    /// Compare two boundary points in document order.
    ///
    /// Both points must be attached to this document. An element point
    /// `(e, i)` sorts before everything inside `e`'s `i`-th child and after
    /// everything inside its earlier children.
    pub fn compare_points(&self, a: BoundaryPoint, b: BoundaryPoint) -> Ordering {
        self.point_key(a).cmp(&self.point_key(b))
    }

    /// Compare two nodes by their position in a pre-order walk.
    pub fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        let key_a = self.path_from(self.root, a).unwrap_or_default();
        let key_b = self.path_from(self.root, b).unwrap_or_default();
        key_a.cmp(&key_b)
    }

    fn point_key(&self, point: BoundaryPoint) -> Vec<usize> {
        let mut key = self.path_from(self.root, point.node).unwrap_or_default();
        key.push(point.offset);
        key
    }
}

/// Byte index of the `chars`-th character of `text` (or its length).
pub fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

/// Substring by character range, clamped to the string.
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let from = byte_offset(text, start);
    let to = byte_offset(text, end.max(start));
    &text[from..to]
}
