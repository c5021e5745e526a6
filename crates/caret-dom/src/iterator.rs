//! Traversal over the content covered by a range.
//!
//! `RangeIterator` walks the top-level run of nodes between a range's
//! boundaries: the siblings under the common ancestor from the node
//! containing the start to the node containing the end. Nodes that merely
//! contain a boundary ("partially selected subtrees") are recursed into via
//! [`RangeIterator::subtree_iterator`]; boundary character-data nodes are
//! yielded whole and clipped through [`RangeIterator::clamp`].
//!
//! The subtree routines built on top (`clone_subtree`, `extract_subtree`,
//! `delete_subtree`, `iterate_subtree`) are what the range content
//! operations delegate to.

use crate::dom::{Document, NodeId, NodeKind};
use crate::error::{DomError, DomResult};
use crate::position::Position;
use crate::range::Range;

pub struct RangeIterator {
    start: Position,
    end: Position,
    first: Option<NodeId>,
    last: Option<NodeId>,
    next: Option<NodeId>,
    current: Option<NodeId>,
}

impl RangeIterator {
    pub fn new(doc: &Document, range: &Range) -> DomResult<Self> {
        range.assert_valid(doc)?;
        let start = range.start();
        let end = range.end();
        let mut iter = RangeIterator {
            start,
            end,
            first: None,
            last: None,
            next: None,
            current: None,
        };
        if !range.collapsed() {
            let root = range.common_ancestor_container(doc)?;
            if start.node == end.node && doc.is_character_data(start.node) {
                iter.first = Some(start.node);
                iter.last = Some(start.node);
            } else {
                iter.first = if start.node == root && !doc.is_character_data(start.node) {
                    doc.child(start.node, start.offset)
                } else {
                    doc.closest_ancestor_in(start.node, root, true)
                };
                iter.last = if end.node == root && !doc.is_character_data(end.node) {
                    end.offset.checked_sub(1).and_then(|i| doc.child(end.node, i))
                } else {
                    doc.closest_ancestor_in(end.node, root, true)
                };
            }
            iter.next = iter.first;
        }
        Ok(iter)
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.next = self.first;
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Advance and return the next top-level node. The successor is captured
    /// before the caller gets a chance to detach the returned node, so
    /// removal via [`RangeIterator::remove`] does not break iteration.
    pub fn next_node(&mut self, doc: &Document) -> Option<NodeId> {
        let current = self.next?;
        self.current = Some(current);
        self.next = if Some(current) != self.last {
            doc.next_sibling(current)
        } else {
            None
        };
        Some(current)
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// For a boundary character-data node, the char span the range actually
    /// covers. `None` for non-boundary nodes, which are covered whole.
    pub fn clamp(&self, doc: &Document, node: NodeId) -> Option<(usize, usize)> {
        if !doc.is_character_data(node) {
            return None;
        }
        let mut from = 0;
        let mut to = doc.node_length(node);
        let mut clipped = false;
        if node == self.start.node {
            from = self.start.offset;
            clipped = true;
        }
        if node == self.end.node {
            to = self.end.offset;
            clipped = true;
        }
        clipped.then_some((from, to))
    }

    /// Delete the current node's covered content: the selected substring for
    /// a boundary character-data node, the whole node otherwise.
    pub fn remove(&mut self, doc: &mut Document) -> DomResult<()> {
        let current = self
            .current
            .ok_or(DomError::InvalidState("iterator has no current node"))?;
        match self.clamp(doc, current) {
            Some((from, to)) => {
                if from != to {
                    doc.delete_data(current, from, to - from)?;
                }
            }
            None => doc.remove_node(current),
        }
        Ok(())
    }

    /// Whether the current node is a container that holds a range boundary
    /// somewhere inside it, so only part of its subtree is covered.
    pub fn is_partially_selected_subtree(&self, doc: &Document) -> bool {
        match self.current {
            Some(node) => {
                !doc.is_character_data(node)
                    && (doc.is_or_is_ancestor_of(node, self.start.node)
                        || doc.is_or_is_ancestor_of(node, self.end.node))
            }
            None => false,
        }
    }

    /// An iterator over the covered part of the current (partially selected)
    /// node's subtree.
    pub fn subtree_iterator(&self, doc: &Document) -> DomResult<RangeIterator> {
        let current = self
            .current
            .ok_or(DomError::InvalidState("iterator has no current node"))?;
        let mut start = Position::new(current, 0);
        let mut end = Position::new(current, doc.node_length(current));
        if doc.is_or_is_ancestor_of(current, self.start.node) {
            start = self.start;
        }
        if doc.is_or_is_ancestor_of(current, self.end.node) {
            end = self.end;
        }
        RangeIterator::new(doc, &Range::from_boundaries(start, end))
    }
}

fn reparent_children(doc: &mut Document, from: NodeId, to: NodeId) -> DomResult<()> {
    while let Some(child) = doc.first_child(from) {
        doc.append_child(to, child)?;
    }
    Ok(())
}

fn assert_movable_into_fragment(doc: &Document, node: NodeId) -> DomResult<()> {
    if doc.kind(node) == NodeKind::DocumentType {
        return Err(DomError::HierarchyRequest(
            "a document type cannot be moved into a fragment",
        ));
    }
    Ok(())
}

/// Clone the covered content into a new fragment. Boundary character-data
/// nodes are cloned clipped; partially selected containers are cloned
/// shallow and filled recursively.
pub fn clone_subtree(doc: &mut Document, iter: &mut RangeIterator) -> DomResult<NodeId> {
    let frag = doc.create_fragment();
    while let Some(node) = iter.next_node(doc) {
        let clone = if iter.is_partially_selected_subtree(doc) {
            let clone = doc.clone_node(node, false);
            let mut sub = iter.subtree_iterator(doc)?;
            let sub_frag = clone_subtree(doc, &mut sub)?;
            reparent_children(doc, sub_frag, clone)?;
            clone
        } else {
            let clone = doc.clone_node(node, true);
            if let Some((from, to)) = iter.clamp(doc, node) {
                let data = doc.substring_data(node, from, to);
                doc.set_data(clone, &data);
            }
            clone
        };
        assert_movable_into_fragment(doc, clone)?;
        doc.append_child(frag, clone)?;
    }
    Ok(frag)
}

/// Move the covered content into a new fragment, removing it from the tree.
/// Partially selected containers stay in place; a shallow clone of each goes
/// into the fragment to hold the extracted part of its subtree.
pub fn extract_subtree(doc: &mut Document, iter: &mut RangeIterator) -> DomResult<NodeId> {
    let frag = doc.create_fragment();
    while let Some(node) = iter.next_node(doc) {
        let extracted = if iter.is_partially_selected_subtree(doc) {
            let clone = doc.clone_node(node, false);
            let mut sub = iter.subtree_iterator(doc)?;
            let sub_frag = extract_subtree(doc, &mut sub)?;
            reparent_children(doc, sub_frag, clone)?;
            clone
        } else if let Some((from, to)) = iter.clamp(doc, node) {
            let clone = doc.clone_node(node, true);
            let data = doc.substring_data(node, from, to);
            doc.set_data(clone, &data);
            iter.remove(doc)?;
            clone
        } else {
            doc.remove_node(node);
            node
        };
        assert_movable_into_fragment(doc, extracted)?;
        doc.append_child(frag, extracted)?;
    }
    Ok(frag)
}

/// Delete the covered content in place.
pub fn delete_subtree(doc: &mut Document, iter: &mut RangeIterator) -> DomResult<()> {
    while iter.next_node(doc).is_some() {
        if iter.is_partially_selected_subtree(doc) {
            let mut sub = iter.subtree_iterator(doc)?;
            delete_subtree(doc, &mut sub)?;
        } else {
            iter.remove(doc)?;
        }
    }
    Ok(())
}

/// Visit every node the range covers, including partially selected
/// containers (visited before their covered descendants). Boundary
/// character-data nodes are reported with their covered char span.
pub fn iterate_subtree(
    doc: &Document,
    iter: &mut RangeIterator,
    visit: &mut dyn FnMut(NodeId, Option<(usize, usize)>),
) -> DomResult<()> {
    while let Some(node) = iter.next_node(doc) {
        if iter.is_partially_selected_subtree(doc) {
            visit(node, None);
            let mut sub = iter.subtree_iterator(doc)?;
            iterate_subtree(doc, &mut sub, visit)?;
        } else {
            visit(node, iter.clamp(doc, node));
        }
    }
    Ok(())
}

/// Document-order walker over a whole subtree, independent of any range.
pub struct NodeIterator {
    stack: Vec<NodeId>,
}

impl NodeIterator {
    pub fn new(root: NodeId) -> Self {
        Self { stack: vec![root] }
    }

    pub fn next_node(&mut self, doc: &Document) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack.extend(doc.children(node).iter().rev());
        Some(node)
    }

    /// Skip forward to the next text node.
    pub fn next_text(&mut self, doc: &Document) -> Option<NodeId> {
        while let Some(node) = self.next_node(doc) {
            if doc.kind(node) == NodeKind::Text {
                return Some(node);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // <div><b>"one"</b>"two"<i>"three"</i></div>
    struct Fixture {
        doc: Document,
        div: NodeId,
        b: NodeId,
        one: NodeId,
        two: NodeId,
        i: NodeId,
        three: NodeId,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let b = doc.create_element("b");
        let i = doc.create_element("i");
        let one = doc.create_text("one");
        let two = doc.create_text("two");
        let three = doc.create_text("three");
        doc.append_child(doc.root(), div).unwrap();
        doc.append_child(div, b).unwrap();
        doc.append_child(div, two).unwrap();
        doc.append_child(div, i).unwrap();
        doc.append_child(b, one).unwrap();
        doc.append_child(i, three).unwrap();
        Fixture {
            doc,
            div,
            b,
            one,
            two,
            i,
            three,
        }
    }

    #[test]
    fn walks_top_level_run_between_boundaries() {
        let f = fixture();
        let mut range = Range::new(&f.doc);
        range.set_start(&f.doc, f.one, 1).unwrap();
        range.set_end(&f.doc, f.three, 2).unwrap();

        let mut iter = RangeIterator::new(&f.doc, &range).unwrap();
        let mut seen = Vec::new();
        while let Some(node) = iter.next_node(&f.doc) {
            seen.push(node);
        }
        assert_eq!(seen, vec![f.b, f.two, f.i]);
    }

    #[test]
    fn partial_selection_detected_for_boundary_ancestors() {
        let f = fixture();
        let mut range = Range::new(&f.doc);
        range.set_start(&f.doc, f.one, 1).unwrap();
        range.set_end(&f.doc, f.three, 2).unwrap();

        let mut iter = RangeIterator::new(&f.doc, &range).unwrap();
        let mut flags = Vec::new();
        while iter.next_node(&f.doc).is_some() {
            flags.push(iter.is_partially_selected_subtree(&f.doc));
        }
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn single_text_node_iterates_once_with_clamp() {
        let f = fixture();
        let mut range = Range::new(&f.doc);
        range.set_start_and_end(&f.doc, f.two, 1, f.two, 2).unwrap();

        let mut iter = RangeIterator::new(&f.doc, &range).unwrap();
        let node = iter.next_node(&f.doc).unwrap();
        assert_eq!(node, f.two);
        assert_eq!(iter.clamp(&f.doc, node), Some((1, 2)));
        assert!(iter.next_node(&f.doc).is_none());
    }

    #[test]
    fn iterate_subtree_reaches_clipped_boundary_text() {
        let f = fixture();
        let mut range = Range::new(&f.doc);
        range.set_start(&f.doc, f.one, 1).unwrap();
        range.set_end(&f.doc, f.three, 2).unwrap();

        let doc = &f.doc;
        let mut parts = Vec::new();
        let mut iter = RangeIterator::new(doc, &range).unwrap();
        iterate_subtree(doc, &mut iter, &mut |node, clamp| {
            if doc.is_character_data(node) {
                let (from, to) = clamp.unwrap_or((0, doc.node_length(node)));
                parts.push(doc.substring_data(node, from, to));
            }
        })
        .unwrap();
        assert_eq!(parts, vec!["ne", "two", "th"]);
    }

    #[test]
    fn collapsed_range_yields_nothing() {
        let f = fixture();
        let mut range = Range::new(&f.doc);
        range.collapse_to_point(&f.doc, f.two, 1).unwrap();
        let mut iter = RangeIterator::new(&f.doc, &range).unwrap();
        assert!(!iter.has_next());
        assert!(iter.next_node(&f.doc).is_none());
    }

    #[test]
    fn node_iterator_visits_document_order() {
        let f = fixture();
        let mut walker = NodeIterator::new(f.div);
        let mut seen = Vec::new();
        while let Some(node) = walker.next_node(&f.doc) {
            seen.push(node);
        }
        assert_eq!(seen, vec![f.div, f.b, f.one, f.two, f.i, f.three]);

        let mut walker = NodeIterator::new(f.div);
        assert_eq!(walker.next_text(&f.doc), Some(f.one));
        assert_eq!(walker.next_text(&f.doc), Some(f.two));
        assert_eq!(walker.next_text(&f.doc), Some(f.three));
        assert_eq!(walker.next_text(&f.doc), None);
    }
}
