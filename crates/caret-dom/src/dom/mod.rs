//! Arena document tree.
//!
//! The tree is the single source of truth for all range and selection state:
//! a `Document` owns every node ever created for it and hands out copyable
//! `NodeId` handles. Nodes removed from the tree are detached (no parent) but
//! stay owned by the arena, so stale handles never dangle — they just refer
//! to content that is no longer attached, which the range validity checks
//! detect.
//!
//! Character-data offsets count `char`s, element offsets count children
//! (the gap before child `offset`, or after the last child when
//! `offset == child_count`).

pub mod markup;

use crate::error::{DomError, DomResult};
use crate::position::Position;

/// Handle to a node in a [`Document`] arena.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Discriminates the node payloads without borrowing them.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NodeKind {
    Document,
    Fragment,
    Element,
    Text,
    CData,
    Comment,
    DocumentType,
}

#[derive(Clone, Debug)]
enum Payload {
    Document,
    Fragment,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    CData(String),
    Comment(String),
    DocumentType(String),
}

impl Payload {
    fn kind(&self) -> NodeKind {
        match self {
            Payload::Document => NodeKind::Document,
            Payload::Fragment => NodeKind::Fragment,
            Payload::Element { .. } => NodeKind::Element,
            Payload::Text(_) => NodeKind::Text,
            Payload::CData(_) => NodeKind::CData,
            Payload::Comment(_) => NodeKind::Comment,
            Payload::DocumentType(_) => NodeKind::DocumentType,
        }
    }
}

#[derive(Clone, Debug)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    payload: Payload,
}

/// An in-memory document tree addressed by [`NodeId`] handles.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document. The document root is node 0.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                parent: None,
                children: Vec::new(),
                payload: Payload::Document,
            }],
        }
    }

    /// The document root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn alloc(&mut self, payload: Payload) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            payload,
        });
        id
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    // ---- node creation ----

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Payload::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.alloc(Payload::Text(data.to_string()))
    }

    pub fn create_cdata(&mut self, data: &str) -> NodeId {
        self.alloc(Payload::CData(data.to_string()))
    }

    pub fn create_comment(&mut self, data: &str) -> NodeId {
        self.alloc(Payload::Comment(data.to_string()))
    }

    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.alloc(Payload::DocumentType(name.to_string()))
    }

    /// A fragment is a free-standing root: its subtree is not part of the
    /// document tree until its children are moved into it.
    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(Payload::Fragment)
    }

    // ---- kind and payload access ----

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).payload.kind()
    }

    /// Text, CDATA and comment nodes are all addressed by character offset.
    pub fn is_character_data(&self, id: NodeId) -> bool {
        matches!(
            self.kind(id),
            NodeKind::Text | NodeKind::CData | NodeKind::Comment
        )
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).payload {
            Payload::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn data(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).payload {
            Payload::Text(d) | Payload::CData(d) | Payload::Comment(d) => Some(d),
            _ => None,
        }
    }

    pub fn set_data(&mut self, id: NodeId, data: &str) {
        if let Payload::Text(d) | Payload::CData(d) | Payload::Comment(d) =
            &mut self.node_mut(id).payload
        {
            *d = data.to_string();
        }
    }

    /// Node capacity: character count for character data, child count
    /// otherwise. Valid offsets into the node are `0..=node_length`.
    pub fn node_length(&self, id: NodeId) -> usize {
        match &self.node(id).payload {
            Payload::Text(d) | Payload::CData(d) | Payload::Comment(d) => d.chars().count(),
            _ => self.node(id).children.len(),
        }
    }

    // ---- attributes ----

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).payload {
            Payload::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Payload::Element { attrs, .. } = &mut self.node_mut(id).payload {
            if let Some(entry) = attrs.iter_mut().find(|(n, _)| n == name) {
                entry.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Payload::Element { attrs, .. } = &mut self.node_mut(id).payload {
            attrs.retain(|(n, _)| n != name);
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match &self.node(id).payload {
            Payload::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    /// Depth-first search for an element with the given `id` attribute.
    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .find(|&n| self.attribute(n, "id") == Some(element_id))
    }

    // ---- navigation ----

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).children.get(index).copied()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.last().copied()
    }

    /// Index of `id` among its parent's children. Detached nodes have no
    /// index.
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.node(parent).children.iter().position(|&c| c == id)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.node_index(id)?;
        if index == 0 {
            None
        } else {
            self.child(parent, index - 1)
        }
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.node_index(id)?;
        self.child(parent, index + 1)
    }

    /// Walks up from `id` to its root (document, fragment, or detached
    /// subtree top).
    pub fn root_container(&self, id: NodeId) -> NodeId {
        let mut n = id;
        while let Some(p) = self.parent(n) {
            n = p;
        }
        n
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, descendant: NodeId, self_is_ancestor: bool) -> bool {
        let mut n = if self_is_ancestor {
            Some(descendant)
        } else {
            self.parent(descendant)
        };
        while let Some(cur) = n {
            if cur == ancestor {
                return true;
            }
            n = self.parent(cur);
        }
        false
    }

    pub fn is_or_is_ancestor_of(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        self.is_ancestor_of(ancestor, descendant, true)
    }

    /// The ancestor-or-self of `node` that is a direct child of `ancestor`.
    pub fn closest_ancestor_in(
        &self,
        node: NodeId,
        ancestor: NodeId,
        self_is_ancestor: bool,
    ) -> Option<NodeId> {
        let mut n = if self_is_ancestor {
            Some(node)
        } else {
            self.parent(node)
        };
        while let Some(cur) = n {
            let p = self.parent(cur)?;
            if p == ancestor {
                return Some(cur);
            }
            n = Some(p);
        }
        None
    }

    /// Nearest node containing both `a` and `b`, if they share a root.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut ancestors = Vec::new();
        let mut n = Some(a);
        while let Some(cur) = n {
            ancestors.push(cur);
            n = self.parent(cur);
        }
        let mut n = Some(b);
        while let Some(cur) = n {
            if ancestors.contains(&cur) {
                return Some(cur);
            }
            n = self.parent(cur);
        }
        None
    }

    /// Iterator over `root` and all its descendants in document order.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: vec![root],
        }
    }

    /// Concatenated text of all text/CDATA descendants (and self).
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(id) {
            if matches!(self.kind(n), NodeKind::Text | NodeKind::CData) {
                if let Some(d) = self.data(n) {
                    out.push_str(d);
                }
            }
        }
        out
    }

    /// Whether `id` or an ancestor is a read-only node (document types are
    /// the only read-only kind representable in this tree).
    pub fn has_readonly_ancestor(&self, id: NodeId, self_inclusive: bool) -> bool {
        let mut n = if self_inclusive {
            Some(id)
        } else {
            self.parent(id)
        };
        while let Some(cur) = n {
            if self.kind(cur) == NodeKind::DocumentType {
                return true;
            }
            n = self.parent(cur);
        }
        false
    }

    // ---- structural mutation ----

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            let children = &mut self.node_mut(parent).children;
            if let Some(pos) = children.iter().position(|&c| c == id) {
                children.remove(pos);
            }
            self.node_mut(id).parent = None;
        }
    }

    /// Remove `id` from its parent. The node stays in the arena and can be
    /// re-inserted.
    pub fn remove_node(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// Insert `child` at `index` within `parent`'s children.
    pub fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> DomResult<()> {
        if self.is_or_is_ancestor_of(child, parent) {
            return Err(DomError::HierarchyRequest(
                "cannot insert a node into its own subtree",
            ));
        }
        if self.is_character_data(parent) || self.kind(parent) == NodeKind::DocumentType {
            return Err(DomError::HierarchyRequest(
                "node kind cannot contain children",
            ));
        }
        let len = self.node(parent).children.len();
        if index > len {
            return Err(DomError::IndexSize {
                offset: index,
                capacity: len,
            });
        }
        self.detach(child);
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let len = self.node(parent).children.len();
        self.insert_at(parent, len, child)
    }

    pub fn insert_before(&mut self, node: NodeId, reference: NodeId) -> DomResult<()> {
        let parent = self
            .parent(reference)
            .ok_or(DomError::HierarchyRequest("reference node has no parent"))?;
        let index = self.node_index(reference).unwrap_or(0);
        self.insert_at(parent, index, node)
    }

    /// Insert `node` immediately after `preceding` (append if `preceding`
    /// is the last child).
    pub fn insert_after(&mut self, node: NodeId, preceding: NodeId) -> DomResult<()> {
        let parent = self
            .parent(preceding)
            .ok_or(DomError::HierarchyRequest("reference node has no parent"))?;
        let index = self.node_index(preceding).unwrap_or(0);
        self.insert_at(parent, index + 1, node)
    }

    /// Clone a node; a deep clone copies the whole subtree. The clone is
    /// detached.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let payload = self.node(id).payload.clone();
        let clone = self.alloc(payload);
        if deep {
            let children = self.node(id).children.clone();
            for child in children {
                let child_clone = self.clone_node(child, true);
                self.node_mut(clone).children.push(child_clone);
                self.node_mut(child_clone).parent = Some(clone);
            }
        }
        clone
    }

    // ---- character data mutation ----

    fn char_to_byte(data: &str, char_offset: usize) -> usize {
        data.char_indices()
            .nth(char_offset)
            .map(|(i, _)| i)
            .unwrap_or(data.len())
    }

    fn data_mut(&mut self, id: NodeId) -> DomResult<&mut String> {
        match &mut self.node_mut(id).payload {
            Payload::Text(d) | Payload::CData(d) | Payload::Comment(d) => Ok(d),
            _ => Err(DomError::InvalidNodeType("not a character-data node")),
        }
    }

    pub fn insert_data(&mut self, id: NodeId, offset: usize, text: &str) -> DomResult<()> {
        let capacity = self.node_length(id);
        if offset > capacity {
            return Err(DomError::IndexSize { offset, capacity });
        }
        let data = self.data_mut(id)?;
        let at = Self::char_to_byte(data, offset);
        data.insert_str(at, text);
        Ok(())
    }

    pub fn append_data(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        self.data_mut(id)?.push_str(text);
        Ok(())
    }

    pub fn delete_data(&mut self, id: NodeId, offset: usize, count: usize) -> DomResult<()> {
        let capacity = self.node_length(id);
        if offset > capacity {
            return Err(DomError::IndexSize { offset, capacity });
        }
        let end = (offset + count).min(capacity);
        let data = self.data_mut(id)?;
        let from = Self::char_to_byte(data, offset);
        let to = Self::char_to_byte(data, end);
        data.replace_range(from..to, "");
        Ok(())
    }

    /// Substring of a character-data node by char offsets.
    pub fn substring_data(&self, id: NodeId, from: usize, to: usize) -> String {
        match self.data(id) {
            Some(d) => d.chars().skip(from).take(to.saturating_sub(from)).collect(),
            None => String::new(),
        }
    }

    /// Split a character-data node at `index`, moving the tail into a new
    /// node inserted immediately after the original.
    ///
    /// Every position in `positions_to_preserve` is re-targeted so that it
    /// still refers to the same place in the text: positions inside the
    /// split-off tail move to the new node (offset reduced by `index`), and
    /// child-index positions in the parent after the original node shift by
    /// one for the inserted sibling. Callers must pass in every position that
    /// has to survive the split, including any range boundaries.
    pub fn split_data_node(
        &mut self,
        id: NodeId,
        index: usize,
        positions_to_preserve: &mut [&mut Position],
    ) -> DomResult<NodeId> {
        if !self.is_character_data(id) {
            return Err(DomError::InvalidNodeType("not a character-data node"));
        }
        let capacity = self.node_length(id);
        if index > capacity {
            return Err(DomError::IndexSize {
                offset: index,
                capacity,
            });
        }
        let new_node = self.clone_node(id, false);
        self.delete_data(new_node, 0, index)?;
        self.delete_data(id, index, capacity - index)?;
        self.insert_after(new_node, id)?;

        let parent = self.parent(id);
        let node_index = self.node_index(id);
        for position in positions_to_preserve {
            if position.node == id && position.offset > index {
                position.node = new_node;
                position.offset -= index;
            } else if let (Some(parent), Some(node_index)) = (parent, node_index) {
                if position.node == parent && position.offset > node_index {
                    position.offset += 1;
                }
            }
        }
        Ok(new_node)
    }

    /// Append `sibling`'s data onto `node` and remove `sibling`. Both must
    /// be character data of the same kind.
    pub fn merge_character_data(&mut self, node: NodeId, sibling: NodeId) -> DomResult<()> {
        if self.kind(node) != self.kind(sibling) || !self.is_character_data(node) {
            return Err(DomError::InvalidNodeType(
                "can only merge character data of the same kind",
            ));
        }
        let data = self.data(sibling).unwrap_or_default().to_string();
        self.append_data(node, &data)?;
        self.remove_node(sibling);
        Ok(())
    }
}

/// Document-order iterator produced by [`Document::descendants`].
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let next = self.stack.pop()?;
        let children = self.doc.children(next);
        self.stack.extend(children.iter().rev());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_doc(text: &str) -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let t = doc.create_text(text);
        doc.append_child(doc.root(), div).unwrap();
        doc.append_child(div, t).unwrap();
        (doc, div, t)
    }

    #[test]
    fn navigation_reflects_structure() {
        let (doc, div, t) = text_doc("hello");
        assert_eq!(doc.parent(t), Some(div));
        assert_eq!(doc.first_child(div), Some(t));
        assert_eq!(doc.node_index(t), Some(0));
        assert_eq!(doc.root_container(t), doc.root());
        assert!(doc.is_or_is_ancestor_of(div, t));
        assert!(!doc.is_ancestor_of(t, div, false));
    }

    #[test]
    fn node_length_counts_chars_and_children() {
        let (doc, div, t) = text_doc("héllo");
        assert_eq!(doc.node_length(t), 5);
        assert_eq!(doc.node_length(div), 1);
    }

    #[test]
    fn insert_rejects_cycles() {
        let (mut doc, div, t) = text_doc("x");
        let err = doc.insert_at(t, 0, div).unwrap_err();
        assert!(matches!(err, DomError::HierarchyRequest(_)));
        let err = doc.append_child(div, div).unwrap_err();
        assert!(matches!(err, DomError::HierarchyRequest(_)));
    }

    #[test]
    fn remove_detaches_but_keeps_node() {
        let (mut doc, div, t) = text_doc("x");
        doc.remove_node(t);
        assert_eq!(doc.parent(t), None);
        assert_eq!(doc.children(div), &[]);
        assert_eq!(doc.data(t), Some("x"));
    }

    #[test]
    fn split_preserves_positions_in_tail() {
        let (mut doc, div, t) = text_doc("hello world");
        let mut in_tail = Position::new(t, 8);
        let mut in_head = Position::new(t, 3);
        let mut after_node = Position::new(div, 1);
        let new_node = doc
            .split_data_node(t, 5, &mut [&mut in_tail, &mut in_head, &mut after_node])
            .unwrap();

        assert_eq!(doc.data(t), Some("hello"));
        assert_eq!(doc.data(new_node), Some(" world"));
        assert_eq!(doc.next_sibling(t), Some(new_node));

        assert_eq!(in_tail, Position::new(new_node, 3));
        assert_eq!(in_head, Position::new(t, 3));
        assert_eq!(after_node, Position::new(div, 2));
    }

    #[test]
    fn split_at_multibyte_boundary() {
        let (mut doc, _div, t) = text_doc("aé✓b");
        let new_node = doc.split_data_node(t, 2, &mut []).unwrap();
        assert_eq!(doc.data(t), Some("aé"));
        assert_eq!(doc.data(new_node), Some("✓b"));
    }

    #[test]
    fn merge_appends_and_removes_sibling() {
        let (mut doc, div, t) = text_doc("foo");
        let t2 = doc.create_text("bar");
        doc.append_child(div, t2).unwrap();
        doc.merge_character_data(t, t2).unwrap();
        assert_eq!(doc.data(t), Some("foobar"));
        assert_eq!(doc.children(div), &[t]);
    }

    #[test]
    fn clone_deep_copies_subtree() {
        let (mut doc, div, t) = text_doc("foo");
        doc.set_attribute(div, "class", "para");
        let clone = doc.clone_node(div, true);
        assert_eq!(doc.parent(clone), None);
        assert_eq!(doc.attribute(clone, "class"), Some("para"));
        let cloned_text = doc.first_child(clone).unwrap();
        assert_ne!(cloned_text, t);
        assert_eq!(doc.data(cloned_text), Some("foo"));
    }

    #[test]
    fn common_ancestor_and_closest_ancestor_in() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let b = doc.create_element("b");
        let i = doc.create_element("i");
        let t1 = doc.create_text("a");
        let t2 = doc.create_text("b");
        doc.append_child(doc.root(), div).unwrap();
        doc.append_child(div, b).unwrap();
        doc.append_child(div, i).unwrap();
        doc.append_child(b, t1).unwrap();
        doc.append_child(i, t2).unwrap();

        assert_eq!(doc.common_ancestor(t1, t2), Some(div));
        assert_eq!(doc.closest_ancestor_in(t1, div, true), Some(b));
        assert_eq!(doc.closest_ancestor_in(t2, doc.root(), true), Some(div));
    }

    #[test]
    fn get_element_by_id_finds_nested() {
        let (mut doc, div, _t) = text_doc("x");
        let span = doc.create_element("span");
        doc.set_attribute(span, "id", "needle");
        doc.append_child(div, span).unwrap();
        assert_eq!(doc.get_element_by_id("needle"), Some(span));
        assert_eq!(doc.get_element_by_id("nope"), None);
    }
}
