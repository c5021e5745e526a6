//! Structural content operations on [`Range`]: insert, clone, extract,
//! delete, surround, and covered-node collection.
//!
//! Extraction and deletion share one discipline: a read-only pre-pass over
//! everything the range covers runs before any mutation, so a failure leaves
//! the tree untouched; afterwards the range collapses to where the removed
//! content used to start.

use super::{NodeRangeComparison, Range};
use crate::dom::{Document, NodeId, NodeKind};
use crate::error::{DomError, DomResult};
use crate::iterator::{
    clone_subtree, delete_subtree, extract_subtree, iterate_subtree, RangeIterator,
};
use crate::position::Position;

impl Range {
    /// Insert `node` (or a fragment's children) at the range start. Returns
    /// the first node inserted; the range start moves to just before it.
    pub fn insert_node(&mut self, doc: &mut Document, node: NodeId) -> DomResult<NodeId> {
        self.assert_valid(doc)?;
        if doc.has_readonly_ancestor(self.start.node, true) {
            return Err(DomError::NoModificationAllowed);
        }
        if doc.is_or_is_ancestor_of(node, self.start.node) {
            return Err(DomError::HierarchyRequest(
                "cannot insert a node around its own boundary",
            ));
        }
        let first = insert_node_at_position(doc, node, self.start)?;
        self.set_start_before(doc, first)?;
        Ok(first)
    }

    /// Copy the covered content into a new fragment, leaving the tree
    /// untouched. Boundary character-data nodes are cloned clipped.
    pub fn clone_contents(&self, doc: &mut Document) -> DomResult<NodeId> {
        self.assert_valid(doc)?;
        if self.collapsed() {
            return Ok(doc.create_fragment());
        }
        if self.start.node == self.end.node && doc.is_character_data(self.start.node) {
            let clone = doc.clone_node(self.start.node, true);
            let data = doc.substring_data(self.start.node, self.start.offset, self.end.offset);
            doc.set_data(clone, &data);
            let frag = doc.create_fragment();
            doc.append_child(frag, clone)?;
            return Ok(frag);
        }
        let mut iter = RangeIterator::new(doc, self)?;
        clone_subtree(doc, &mut iter)
    }

    /// Move the covered content into a new fragment. The range collapses to
    /// the removal point.
    pub fn extract_contents(&mut self, doc: &mut Document) -> DomResult<NodeId> {
        self.assert_valid(doc)?;
        let landing = self.post_removal_boundary(doc)?;
        self.assert_covered_content_writable(doc)?;
        let mut iter = RangeIterator::new(doc, self)?;
        let frag = extract_subtree(doc, &mut iter)?;
        self.start = landing;
        self.end = landing;
        Ok(frag)
    }

    /// Delete the covered content in place. The range collapses to the
    /// removal point.
    pub fn delete_contents(&mut self, doc: &mut Document) -> DomResult<()> {
        self.assert_valid(doc)?;
        let landing = self.post_removal_boundary(doc)?;
        self.assert_covered_content_writable(doc)?;
        let mut iter = RangeIterator::new(doc, self)?;
        delete_subtree(doc, &mut iter)?;
        self.start = landing;
        self.end = landing;
        Ok(())
    }

    /// Whether the contents could be wrapped in a single element: true when
    /// the range partially selects no container (boundary character-data
    /// nodes are fine, they can be split).
    pub fn can_surround_contents(&self, doc: &Document) -> DomResult<bool> {
        self.assert_valid(doc)?;
        if doc.has_readonly_ancestor(self.start.node, true)
            || doc.has_readonly_ancestor(self.end.node, true)
        {
            return Err(DomError::NoModificationAllowed);
        }
        let mut iter = RangeIterator::new(doc, self)?;
        let mut ok = true;
        while iter.next_node(doc).is_some() {
            if iter.is_partially_selected_subtree(doc) {
                ok = false;
                break;
            }
        }
        Ok(ok)
    }

    /// Extract the covered content and re-insert it wrapped in `wrapper`.
    /// The range ends up selecting the wrapper.
    pub fn surround_contents(&mut self, doc: &mut Document, wrapper: NodeId) -> DomResult<()> {
        if !matches!(doc.kind(wrapper), NodeKind::Element) {
            return Err(DomError::InvalidNodeType("wrapper must be an element"));
        }
        if !self.can_surround_contents(doc)? {
            return Err(DomError::InvalidState(
                "range partially selects a container",
            ));
        }
        let content = self.extract_contents(doc)?;
        while let Some(child) = doc.last_child(wrapper) {
            doc.remove_node(child);
        }
        insert_node_at_position(doc, wrapper, self.start)?;
        while let Some(child) = doc.first_child(content) {
            doc.append_child(wrapper, child)?;
        }
        self.select_node(doc, wrapper)
    }

    /// All nodes the range covers (recursing into partially selected
    /// containers), optionally restricted by kind and a caller filter.
    /// A boundary character-data node none of whose characters are covered
    /// is excluded.
    pub fn get_nodes(
        &self,
        doc: &Document,
        kinds: Option<&[NodeKind]>,
        mut filter: impl FnMut(NodeId) -> bool,
    ) -> DomResult<Vec<NodeId>> {
        self.assert_valid(doc)?;
        let mut nodes = Vec::new();
        let mut iter = RangeIterator::new(doc, self)?;
        iterate_subtree(doc, &mut iter, &mut |node, _| {
            if let Some(kinds) = kinds {
                if !kinds.contains(&doc.kind(node)) {
                    return;
                }
            }
            if !filter(node) {
                return;
            }
            if node == self.start.node
                && doc.is_character_data(node)
                && self.start.offset == doc.node_length(node)
            {
                return;
            }
            if node == self.end.node && doc.is_character_data(node) && self.end.offset == 0 {
                return;
            }
            nodes.push(node);
        })?;
        Ok(nodes)
    }

    /// Where the range should collapse to once its content is removed: just
    /// after the start boundary's ancestor directly under the common
    /// ancestor.
    fn post_removal_boundary(&self, doc: &Document) -> DomResult<Position> {
        let root = self.common_ancestor_container(doc)?;
        if self.start.node == root {
            return Ok(self.start);
        }
        let node = doc
            .closest_ancestor_in(self.start.node, root, true)
            .ok_or(DomError::WrongDocument)?;
        let index = doc.node_index(node).ok_or(DomError::WrongDocument)?;
        Ok(Position::new(root, index + 1))
    }

    /// Read-only pre-pass: fail before mutating anything if any covered node
    /// sits in a read-only subtree.
    fn assert_covered_content_writable(&self, doc: &Document) -> DomResult<()> {
        let mut covered = Vec::new();
        let mut iter = RangeIterator::new(doc, self)?;
        iterate_subtree(doc, &mut iter, &mut |node, _| covered.push(node))?;
        for node in covered {
            if doc.has_readonly_ancestor(node, true) {
                return Err(DomError::NoModificationAllowed);
            }
        }
        Ok(())
    }
}

/// Place `node` at a boundary point, splitting a character-data container
/// when the point falls mid-text. Fragments are expanded in place.
fn insert_node_at_position(doc: &mut Document, node: NodeId, at: Position) -> DomResult<NodeId> {
    let first_inserted = if doc.kind(node) == NodeKind::Fragment {
        doc.first_child(node)
            .ok_or(DomError::InvalidState("cannot insert an empty fragment"))?
    } else {
        node
    };

    let (parent, index) = if doc.is_character_data(at.node) {
        let parent = doc
            .parent(at.node)
            .ok_or(DomError::HierarchyRequest("boundary node has no parent"))?;
        let node_index = doc
            .node_index(at.node)
            .ok_or(DomError::HierarchyRequest("boundary node has no parent"))?;
        if at.offset == 0 {
            (parent, node_index)
        } else if at.offset == doc.node_length(at.node) {
            (parent, node_index + 1)
        } else {
            doc.split_data_node(at.node, at.offset, &mut [])?;
            (parent, node_index + 1)
        }
    } else {
        (at.node, at.offset.min(doc.node_length(at.node)))
    };

    if doc.kind(node) == NodeKind::Fragment {
        let children: Vec<NodeId> = doc.children(node).to_vec();
        for (k, child) in children.into_iter().enumerate() {
            doc.insert_at(parent, index + k, child)?;
        }
    } else {
        doc.insert_at(parent, index, node)?;
    }
    Ok(first_inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::markup;
    use pretty_assertions::assert_eq;

    fn doc_from(html: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.append_child(doc.root(), div).unwrap();
        let frag = markup::parse_fragment(&mut doc, html).unwrap();
        while let Some(child) = doc.first_child(frag) {
            doc.append_child(div, child).unwrap();
        }
        (doc, div)
    }

    fn text_range(doc: &Document, div: NodeId, from: usize, to: usize) -> Range {
        // Build a range over char offsets into the div's text.
        let bookmark = crate::range::Bookmark {
            start: from,
            end: to,
            container: div,
        };
        let mut range = Range::new(doc);
        range.move_to_bookmark(doc, &bookmark).unwrap();
        range
    }

    #[test]
    fn clone_contents_leaves_tree_intact() {
        let (mut doc, div) = doc_from("one<b>two</b>three");
        let range = text_range(&doc, div, 2, 8);
        let frag = range.clone_contents(&mut doc).unwrap();
        assert_eq!(markup::serialize_inner(&doc, frag), "e<b>two</b>th");
        assert_eq!(
            markup::serialize_inner(&doc, div),
            "one<b>two</b>three"
        );
        assert_eq!(range.to_text(&doc).unwrap(), "etwoth");
    }

    #[test]
    fn extract_contents_removes_and_collapses() {
        let (mut doc, div) = doc_from("one<b>two</b>three");
        let mut range = text_range(&doc, div, 2, 8);
        let frag = range.extract_contents(&mut doc).unwrap();
        assert_eq!(markup::serialize_inner(&doc, frag), "e<b>two</b>th");
        assert_eq!(markup::serialize_inner(&doc, div), "on<b></b>ree");
        assert!(range.collapsed());
        assert_eq!(range.to_text(&doc).unwrap(), "");
    }

    #[test]
    fn delete_contents_same_result_without_fragment() {
        let (mut doc, div) = doc_from("one<b>two</b>three");
        let mut range = text_range(&doc, div, 2, 8);
        range.delete_contents(&mut doc).unwrap();
        assert_eq!(markup::serialize_inner(&doc, div), "on<b></b>ree");
        assert!(range.collapsed());
    }

    #[test]
    fn delete_within_single_text_node() {
        let (mut doc, div) = doc_from("hello world");
        let mut range = text_range(&doc, div, 5, 6);
        range.delete_contents(&mut doc).unwrap();
        assert_eq!(markup::serialize_inner(&doc, div), "helloworld");
    }

    #[test]
    fn fully_selected_element_is_extracted_whole() {
        let (mut doc, div) = doc_from("one<b>two</b>three");
        let mut range = Range::new(&doc);
        let b = doc.child(div, 1).unwrap();
        range.select_node(&doc, b).unwrap();
        let frag = range.extract_contents(&mut doc).unwrap();
        assert_eq!(markup::serialize_inner(&doc, frag), "<b>two</b>");
        assert_eq!(markup::serialize_inner(&doc, div), "onethree");
    }

    #[test]
    fn insert_node_mid_text_splits() {
        let (mut doc, div) = doc_from("hello");
        let br = doc.create_element("br");
        let text = doc.first_child(div).unwrap();
        let mut range = Range::new(&doc);
        range.collapse_to_point(&doc, text, 2).unwrap();
        let first = range.insert_node(&mut doc, br).unwrap();
        assert_eq!(first, br);
        assert_eq!(markup::serialize_inner(&doc, div), "he<br>llo");
        // Start moved to just before the inserted node.
        assert_eq!(range.start(), Position::new(div, 1));
    }

    #[test]
    fn insert_fragment_expands_children() {
        let (mut doc, div) = doc_from("ab");
        let frag = markup::parse_fragment(&mut doc, "<i>x</i>y").unwrap();
        let text = doc.first_child(div).unwrap();
        let mut range = Range::new(&doc);
        range.collapse_to_point(&doc, text, 1).unwrap();
        range.insert_node(&mut doc, frag).unwrap();
        assert_eq!(markup::serialize_inner(&doc, div), "a<i>x</i>yb");
    }

    #[test]
    fn surround_contents_wraps_and_selects() {
        let (mut doc, div) = doc_from("hello world");
        let mut range = text_range(&doc, div, 6, 11);
        let em = doc.create_element("em");
        range.surround_contents(&mut doc, em).unwrap();
        assert_eq!(markup::serialize_inner(&doc, div), "hello <em>world</em>");
        assert_eq!(
            range.compare_node(&doc, em).unwrap(),
            NodeRangeComparison::Inside
        );
    }

    #[test]
    fn surround_refused_for_partial_element_selection() {
        let (mut doc, div) = doc_from("one<b>two</b>three");
        // Covers part of <b> only.
        let mut range = text_range(&doc, div, 2, 5);
        assert!(!range.can_surround_contents(&doc).unwrap());
        let em = doc.create_element("em");
        assert!(matches!(
            range.surround_contents(&mut doc, em),
            Err(DomError::InvalidState(_))
        ));
        // Nothing was mutated.
        assert_eq!(markup::serialize_inner(&doc, div), "one<b>two</b>three");
    }

    #[test]
    fn get_nodes_excludes_empty_boundary_text() {
        let (doc, div) = doc_from("one<b>two</b>three");
        let one = doc.child(div, 0).unwrap();
        let b = doc.child(div, 1).unwrap();
        let two = doc.first_child(b).unwrap();

        // Start at the very end of "one": no character of it is covered.
        let mut range = Range::new(&doc);
        range.set_start(&doc, one, 3).unwrap();
        range.set_end(&doc, two, 2).unwrap();

        let text_nodes = range
            .get_nodes(&doc, Some(&[NodeKind::Text]), |_| true)
            .unwrap();
        assert_eq!(text_nodes, vec![two]);

        let all = range.get_nodes(&doc, None, |_| true).unwrap();
        assert!(all.contains(&b));
        assert!(!all.contains(&one));
    }

    #[test]
    fn to_html_serializes_covered_content() {
        let (mut doc, div) = doc_from("one<b>two</b>three");
        let mut range = Range::new(&doc);
        range.select_node_contents(&doc, div).unwrap();
        assert_eq!(range.to_html(&mut doc).unwrap(), "one<b>two</b>three");

        let range = text_range(&doc, div, 2, 8);
        assert_eq!(range.to_html(&mut doc).unwrap(), "e<b>two</b>th");
    }
}
