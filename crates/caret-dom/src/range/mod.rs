//! The pure range: a pair of boundary points over a [`Document`].
//!
//! `Range` is a small copyable value; it borrows nothing from the tree, so
//! every operation takes the document explicitly. The struct maintains one
//! invariant through its setters: start never ends up after end — a setter
//! that would cross the opposite boundary (or land in a different root)
//! collapses the range to the new point. Structural operations re-check
//! validity first, because unrelated tree mutation can silently invalidate
//! cached boundaries.
//!
//! Content operations (clone/extract/delete/insert/surround/get_nodes) live
//! in the `contents` submodule.

mod contents;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dom::{markup, Document, NodeId, NodeKind};
use crate::error::{DomError, DomResult};
use crate::iterator::{iterate_subtree, RangeIterator};
use crate::position::{compare_points, Position};

/// Which pair of boundary points [`Range::compare_boundary_points`] compares.
/// `StartToEnd` compares this range's end with the other's start, and
/// `EndToStart` this range's start with the other's end, matching the W3C
/// constant naming (source boundary first).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BoundaryComparison {
    StartToStart,
    StartToEnd,
    EndToEnd,
    EndToStart,
}

/// Where a whole node lies relative to a range.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NodeRangeComparison {
    Before,
    After,
    BeforeAndAfter,
    Inside,
}

/// A character-offset snapshot of a range relative to a container node's
/// visible text. Survives node splits, merges and replacement inside the
/// container, as long as the overall text stays the same.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub start: usize,
    pub end: usize,
    pub container: NodeId,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Range {
    pub(crate) start: Position,
    pub(crate) end: Position,
}

impl Range {
    /// A range collapsed at the very start of the document.
    pub fn new(doc: &Document) -> Self {
        let at = Position::new(doc.root(), 0);
        Self { start: at, end: at }
    }

    pub(crate) fn from_boundaries(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A range collapsed at `at`, validated.
    pub fn collapsed_at(doc: &Document, at: Position) -> DomResult<Self> {
        let mut range = Self::new(doc);
        range.collapse_to_point(doc, at.node, at.offset)?;
        Ok(range)
    }

    /// A range selecting the whole content of `node`.
    pub fn selecting_node_contents(doc: &Document, node: NodeId) -> DomResult<Self> {
        let mut range = Self::new(doc);
        range.select_node_contents(doc, node)?;
        Ok(range)
    }

    // ---- accessors ----

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn start_container(&self) -> NodeId {
        self.start.node
    }

    pub fn start_offset(&self) -> usize {
        self.start.offset
    }

    pub fn end_container(&self) -> NodeId {
        self.end.node
    }

    pub fn end_offset(&self) -> usize {
        self.end.offset
    }

    pub fn collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn common_ancestor_container(&self, doc: &Document) -> DomResult<NodeId> {
        doc.common_ancestor(self.start.node, self.end.node)
            .ok_or(DomError::WrongDocument)
    }

    pub fn root(&self, doc: &Document) -> NodeId {
        doc.root_container(self.start.node)
    }

    // ---- validity ----

    pub fn is_valid(&self, doc: &Document) -> bool {
        doc.root_container(self.start.node) == doc.root_container(self.end.node)
            && self.start.is_valid(doc)
            && self.end.is_valid(doc)
    }

    /// Structural operations call this first; cached boundaries go stale
    /// when the tree is mutated behind the range's back.
    pub fn assert_valid(&self, doc: &Document) -> DomResult<()> {
        if self.is_valid(doc) {
            Ok(())
        } else {
            Err(DomError::InvalidRange(format!(
                "boundaries ({:?}:{}, {:?}:{}) no longer fit the tree",
                self.start.node, self.start.offset, self.end.node, self.end.offset
            )))
        }
    }

    // ---- boundary setters ----

    pub fn set_start(&mut self, doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
        assert_boundary_container(doc, node)?;
        assert_valid_offset(doc, node, offset)?;
        let new = Position::new(node, offset);
        if new != self.start {
            if doc.root_container(node) != doc.root_container(self.end.node)
                || compare_points(doc, new, self.end)? == Ordering::Greater
            {
                self.end = new;
            }
            self.start = new;
        }
        Ok(())
    }

    pub fn set_end(&mut self, doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
        assert_boundary_container(doc, node)?;
        assert_valid_offset(doc, node, offset)?;
        let new = Position::new(node, offset);
        if new != self.end {
            if doc.root_container(node) != doc.root_container(self.start.node)
                || compare_points(doc, new, self.start)? == Ordering::Less
            {
                self.start = new;
            }
            self.end = new;
        }
        Ok(())
    }

    pub fn set_start_before(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let at = boundary_before(doc, node)?;
        self.set_start(doc, at.node, at.offset)
    }

    pub fn set_start_after(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let at = boundary_after(doc, node)?;
        self.set_start(doc, at.node, at.offset)
    }

    pub fn set_end_before(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let at = boundary_before(doc, node)?;
        self.set_end(doc, at.node, at.offset)
    }

    pub fn set_end_after(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let at = boundary_after(doc, node)?;
        self.set_end(doc, at.node, at.offset)
    }

    /// Set both boundaries at once, without the crossing-collapse logic of
    /// the individual setters. Callers are trusted to pass an ordered pair.
    pub fn set_start_and_end(
        &mut self,
        doc: &Document,
        start_node: NodeId,
        start_offset: usize,
        end_node: NodeId,
        end_offset: usize,
    ) -> DomResult<()> {
        assert_boundary_container(doc, start_node)?;
        assert_valid_offset(doc, start_node, start_offset)?;
        assert_boundary_container(doc, end_node)?;
        assert_valid_offset(doc, end_node, end_offset)?;
        self.start = Position::new(start_node, start_offset);
        self.end = Position::new(end_node, end_offset);
        Ok(())
    }

    pub fn collapse(&mut self, to_start: bool) {
        if to_start {
            self.end = self.start;
        } else {
            self.start = self.end;
        }
    }

    pub fn collapse_to_point(&mut self, doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
        self.set_start_and_end(doc, node, offset, node, offset)
    }

    pub fn collapse_before(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_end_before(doc, node)?;
        self.collapse(false);
        Ok(())
    }

    pub fn collapse_after(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_start_after(doc, node)?;
        self.collapse(true);
        Ok(())
    }

    pub fn select_node(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let start = boundary_before(doc, node)?;
        let end = boundary_after(doc, node)?;
        self.set_start_and_end(doc, start.node, start.offset, end.node, end.offset)
    }

    pub fn select_node_contents(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_start_and_end(doc, node, 0, node, doc.node_length(node))
    }

    // ---- comparisons ----

    pub fn compare_boundary_points(
        &self,
        doc: &Document,
        how: BoundaryComparison,
        other: &Range,
    ) -> DomResult<Ordering> {
        self.assert_valid(doc)?;
        other.assert_valid(doc)?;
        if doc.root_container(self.start.node) != doc.root_container(other.start.node) {
            return Err(DomError::WrongDocument);
        }
        let (a, b) = match how {
            BoundaryComparison::StartToStart => (self.start, other.start),
            BoundaryComparison::StartToEnd => (self.end, other.start),
            BoundaryComparison::EndToEnd => (self.end, other.end),
            BoundaryComparison::EndToStart => (self.start, other.end),
        };
        compare_points(doc, a, b)
    }

    /// `Less` if the point lies before the range, `Greater` if after,
    /// `Equal` if within it (boundaries included).
    pub fn compare_point(&self, doc: &Document, at: Position) -> DomResult<Ordering> {
        self.assert_valid(doc)?;
        if doc.root_container(at.node) != doc.root_container(self.start.node) {
            return Err(DomError::WrongDocument);
        }
        if compare_points(doc, at, self.start)? == Ordering::Less {
            Ok(Ordering::Less)
        } else if compare_points(doc, at, self.end)? == Ordering::Greater {
            Ok(Ordering::Greater)
        } else {
            Ok(Ordering::Equal)
        }
    }

    pub fn is_point_in_range(&self, doc: &Document, at: Position) -> DomResult<bool> {
        Ok(self.compare_point(doc, at)? == Ordering::Equal)
    }

    pub fn compare_node(&self, doc: &Document, node: NodeId) -> DomResult<NodeRangeComparison> {
        self.assert_valid(doc)?;
        let parent = doc
            .parent(node)
            .ok_or_else(|| DomError::NotFound("node has no parent".to_string()))?;
        let index = doc
            .node_index(node)
            .ok_or_else(|| DomError::NotFound("node has no parent".to_string()))?;

        let starts_before = self.compare_point(doc, Position::new(parent, index))? == Ordering::Less;
        let ends_after =
            self.compare_point(doc, Position::new(parent, index + 1))? == Ordering::Greater;
        Ok(match (starts_before, ends_after) {
            (true, true) => NodeRangeComparison::BeforeAndAfter,
            (true, false) => NodeRangeComparison::Before,
            (false, true) => NodeRangeComparison::After,
            (false, false) => NodeRangeComparison::Inside,
        })
    }

    /// `touching_is_intersecting` decides whether a node that merely borders
    /// the range counts.
    pub fn intersects_node(
        &self,
        doc: &Document,
        node: NodeId,
        touching_is_intersecting: bool,
    ) -> DomResult<bool> {
        self.assert_valid(doc)?;
        if doc.root_container(node) != self.root(doc) {
            return Ok(false);
        }
        let Some(parent) = doc.parent(node) else {
            return Ok(true);
        };
        let index = doc.node_index(node).unwrap_or(0);

        let start_cmp = compare_points(doc, Position::new(parent, index), self.end)?;
        let end_cmp = compare_points(doc, Position::new(parent, index + 1), self.start)?;
        Ok(if touching_is_intersecting {
            start_cmp != Ordering::Greater && end_cmp != Ordering::Less
        } else {
            start_cmp == Ordering::Less && end_cmp == Ordering::Greater
        })
    }

    /// Sharing only a boundary does not count as intersection.
    pub fn intersects_range(&self, doc: &Document, other: &Range) -> DomResult<bool> {
        ranges_intersect(doc, self, other, false)
    }

    /// Sharing only a boundary does count.
    pub fn intersects_or_touches_range(&self, doc: &Document, other: &Range) -> DomResult<bool> {
        ranges_intersect(doc, self, other, true)
    }

    pub fn intersection(&self, doc: &Document, other: &Range) -> DomResult<Option<Range>> {
        if !self.intersects_range(doc, other)? {
            return Ok(None);
        }
        let mut out = *self;
        if compare_points(doc, self.start, other.start)? == Ordering::Less {
            out.set_start(doc, other.start.node, other.start.offset)?;
        }
        if compare_points(doc, self.end, other.end)? == Ordering::Greater {
            out.set_end(doc, other.end.node, other.end.offset)?;
        }
        Ok(Some(out))
    }

    pub fn union(&self, doc: &Document, other: &Range) -> DomResult<Range> {
        if !self.intersects_or_touches_range(doc, other)? {
            return Err(DomError::InvalidState("ranges neither overlap nor touch"));
        }
        let mut out = *self;
        if compare_points(doc, other.start, self.start)? == Ordering::Less {
            out.set_start(doc, other.start.node, other.start.offset)?;
        }
        if compare_points(doc, other.end, self.end)? == Ordering::Greater {
            out.set_end(doc, other.end.node, other.end.offset)?;
        }
        Ok(out)
    }

    pub fn contains_node(&self, doc: &Document, node: NodeId, allow_partial: bool) -> DomResult<bool> {
        if allow_partial {
            self.intersects_node(doc, node, false)
        } else {
            Ok(self.compare_node(doc, node)? == NodeRangeComparison::Inside)
        }
    }

    pub fn contains_node_contents(&self, doc: &Document, node: NodeId) -> DomResult<bool> {
        Ok(
            self.compare_point(doc, Position::new(node, 0))? != Ordering::Less
                && self.compare_point(doc, Position::new(node, doc.node_length(node)))?
                    != Ordering::Greater,
        )
    }

    pub fn contains_range(&self, doc: &Document, other: &Range) -> DomResult<bool> {
        Ok(self.intersection(doc, other)? == Some(*other))
    }

    /// Whether all of the node's visible text lies inside the range, even if
    /// the node's element boundaries do not.
    pub fn contains_node_text(&self, doc: &Document, node: NodeId) -> DomResult<bool> {
        let mut node_range = *self;
        node_range.select_node(doc, node)?;
        let text_nodes = node_range.get_nodes(doc, Some(&[NodeKind::Text]), |_| true)?;
        match (text_nodes.first(), text_nodes.last()) {
            (Some(&first), Some(&last)) => {
                node_range.set_start(doc, first, 0)?;
                node_range.set_end(doc, last, doc.node_length(last))?;
                self.contains_range(doc, &node_range)
            }
            _ => self.contains_node_contents(doc, node),
        }
    }

    // ---- text views ----

    /// The covered text (text and CDATA content; comments excluded).
    pub fn to_text(&self, doc: &Document) -> DomResult<String> {
        self.assert_valid(doc)?;
        if self.start.node == self.end.node && doc.is_character_data(self.start.node) {
            return Ok(match doc.kind(self.start.node) {
                NodeKind::Text | NodeKind::CData => {
                    doc.substring_data(self.start.node, self.start.offset, self.end.offset)
                }
                _ => String::new(),
            });
        }
        let mut out = String::new();
        let mut iter = RangeIterator::new(doc, self)?;
        iterate_subtree(doc, &mut iter, &mut |node, clamp| {
            if matches!(doc.kind(node), NodeKind::Text | NodeKind::CData) {
                match clamp {
                    Some((from, to)) => out.push_str(&doc.substring_data(node, from, to)),
                    None => out.push_str(doc.data(node).unwrap_or_default()),
                }
            }
        })?;
        Ok(out)
    }

    /// The covered content serialized as markup.
    pub fn to_html(&self, doc: &mut Document) -> DomResult<String> {
        let frag = self.clone_contents(doc)?;
        Ok(markup::serialize_inner(doc, frag))
    }

    // ---- bookmarks ----

    /// Snapshot the range as char offsets into `container`'s text
    /// (defaulting to the document root).
    pub fn get_bookmark(&self, doc: &Document, container: Option<NodeId>) -> DomResult<Bookmark> {
        let container = container.unwrap_or_else(|| doc.root());
        let mut pre_selection = Range::selecting_node_contents(doc, container)?;
        let (start, end) = match self.intersection(doc, &pre_selection)? {
            Some(clamped) => {
                pre_selection.set_end(doc, clamped.start.node, clamped.start.offset)?;
                let start = pre_selection.to_text(doc)?.chars().count();
                (start, start + clamped.to_text(doc)?.chars().count())
            }
            None => (0, 0),
        };
        Ok(Bookmark {
            start,
            end,
            container,
        })
    }

    /// Re-aim the range at the text offsets recorded in `bookmark`, walking
    /// the container's current text nodes.
    pub fn move_to_bookmark(&mut self, doc: &Document, bookmark: &Bookmark) -> DomResult<()> {
        self.collapse_to_point(doc, bookmark.container, 0)?;
        let mut char_index = 0;
        let mut found_start = false;
        let mut stack = vec![bookmark.container];
        while let Some(node) = stack.pop() {
            if matches!(doc.kind(node), NodeKind::Text | NodeKind::CData) {
                let next_char_index = char_index + doc.node_length(node);
                if !found_start && bookmark.start >= char_index && bookmark.start <= next_char_index
                {
                    self.set_start(doc, node, bookmark.start - char_index)?;
                    found_start = true;
                }
                if found_start && bookmark.end >= char_index && bookmark.end <= next_char_index {
                    self.set_end(doc, node, bookmark.end - char_index)?;
                    break;
                }
                char_index = next_char_index;
            } else {
                stack.extend(doc.children(node).iter().rev());
            }
        }
        Ok(())
    }

    // ---- boundary splitting and normalization ----

    /// Split boundary character-data nodes so both boundaries land between
    /// nodes. Afterwards the range covers whole nodes only.
    pub fn split_boundaries(&mut self, doc: &mut Document) -> DomResult<()> {
        self.split_boundaries_preserving_positions(doc, &mut [])
    }

    pub fn split_boundaries_preserving_positions(
        &mut self,
        doc: &mut Document,
        positions: &mut [&mut Position],
    ) -> DomResult<()> {
        self.assert_valid(doc)?;
        let mut start = self.start;
        let mut end = self.end;
        let start_end_same = start.node == end.node;

        if doc.is_character_data(end.node) && end.offset > 0 && end.offset < doc.node_length(end.node)
        {
            doc.split_data_node(end.node, end.offset, positions)?;
        }

        if doc.is_character_data(start.node)
            && start.offset > 0
            && start.offset < doc.node_length(start.node)
        {
            let tail = doc.split_data_node(start.node, start.offset, positions)?;
            if start_end_same {
                end.offset -= start.offset;
                end.node = tail;
            } else if doc.parent(tail) == Some(end.node)
                && end.offset >= doc.node_index(tail).unwrap_or(0)
            {
                end.offset += 1;
            }
            start = Position::new(tail, 0);
        }
        self.start = start;
        self.end = end;
        Ok(())
    }

    /// The inverse of [`Range::split_boundaries`]: merge adjacent same-kind
    /// character-data nodes at the boundaries and re-aim the range so it
    /// covers the same content with canonical boundary positions.
    pub fn normalize_boundaries(&mut self, doc: &mut Document) -> DomResult<()> {
        self.assert_valid(doc)?;
        let mut start = self.start;
        let mut end = self.end;
        let collapsed = self.collapsed();

        let mut normalize_start = true;

        if doc.is_character_data(end.node) {
            if end.offset == doc.node_length(end.node) {
                merge_forward(doc, end.node, &mut end)?;
            } else if end.offset == 0 {
                if let Some(sibling) = doc.prev_sibling(end.node) {
                    if doc.kind(sibling) == doc.kind(end.node) {
                        end.offset = doc.node_length(sibling);
                        if start.node == end.node {
                            normalize_start = false;
                        }
                        doc.merge_character_data(sibling, end.node)?;
                        end.node = sibling;
                    }
                }
            }
        } else {
            if end.offset > 0 {
                if let Some(end_node) = doc.child(end.node, end.offset - 1) {
                    if doc.is_character_data(end_node) {
                        merge_forward(doc, end_node, &mut end)?;
                    }
                }
            }
            normalize_start = !collapsed;
        }

        if normalize_start {
            if doc.is_character_data(start.node) {
                if start.offset == 0 {
                    merge_backward(doc, start.node, &mut start, &mut end)?;
                } else if start.offset == doc.node_length(start.node) {
                    if let Some(sibling) = doc.next_sibling(start.node) {
                        if doc.kind(sibling) == doc.kind(start.node) {
                            if end.node == sibling {
                                end.node = start.node;
                                end.offset += doc.node_length(start.node);
                            }
                            doc.merge_character_data(start.node, sibling)?;
                        }
                    }
                }
            } else if start.offset < doc.node_length(start.node) {
                if let Some(start_node) = doc.child(start.node, start.offset) {
                    if doc.is_character_data(start_node) {
                        merge_backward(doc, start_node, &mut start, &mut end)?;
                    }
                }
            }
        } else {
            start = end;
        }

        self.start = start;
        self.end = end;
        Ok(())
    }
}

/// Merge `node` with its next sibling and aim the end boundary at the seam.
fn merge_forward(doc: &mut Document, node: NodeId, end: &mut Position) -> DomResult<()> {
    if let Some(sibling) = doc.next_sibling(node) {
        if doc.kind(sibling) == doc.kind(node) {
            end.node = node;
            end.offset = doc.node_length(node);
            doc.merge_character_data(node, sibling)?;
        }
    }
    Ok(())
}

/// Merge `node` with its previous sibling, re-aiming the start boundary at
/// the seam and fixing up the end boundary for the removed sibling.
fn merge_backward(
    doc: &mut Document,
    node: NodeId,
    start: &mut Position,
    end: &mut Position,
) -> DomResult<()> {
    if let Some(sibling) = doc.prev_sibling(node) {
        if doc.kind(sibling) == doc.kind(node) {
            start.node = node;
            let node_length = doc.node_length(node);
            start.offset = doc.node_length(sibling);
            let sibling_data = doc.data(sibling).unwrap_or_default().to_string();
            doc.insert_data(node, 0, &sibling_data)?;
            let parent = doc.parent(node);
            doc.remove_node(sibling);
            if end.node == node {
                end.offset += start.offset;
            } else if Some(end.node) == parent {
                let node_index = doc.node_index(node).unwrap_or(0);
                if end.offset == node_index {
                    end.node = node;
                    end.offset = node_length;
                } else if end.offset > node_index {
                    end.offset -= 1;
                }
            }
        }
    }
    Ok(())
}

fn ranges_intersect(
    doc: &Document,
    a: &Range,
    b: &Range,
    touching_is_intersecting: bool,
) -> DomResult<bool> {
    a.assert_valid(doc)?;
    b.assert_valid(doc)?;
    if a.root(doc) != b.root(doc) {
        return Err(DomError::WrongDocument);
    }
    let start_cmp = compare_points(doc, a.start, b.end)?;
    let end_cmp = compare_points(doc, a.end, b.start)?;
    Ok(if touching_is_intersecting {
        start_cmp != Ordering::Greater && end_cmp != Ordering::Less
    } else {
        start_cmp == Ordering::Less && end_cmp == Ordering::Greater
    })
}

/// Boundary containers may not sit inside a document type node.
fn assert_boundary_container(doc: &Document, node: NodeId) -> DomResult<()> {
    if doc.has_readonly_ancestor(node, true) {
        return Err(DomError::InvalidNodeType(
            "document type nodes cannot contain range boundaries",
        ));
    }
    Ok(())
}

fn assert_valid_offset(doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
    let capacity = doc.node_length(node);
    if offset > capacity {
        return Err(DomError::IndexSize { offset, capacity });
    }
    Ok(())
}

fn boundary_before(doc: &Document, node: NodeId) -> DomResult<Position> {
    let parent = doc
        .parent(node)
        .ok_or(DomError::HierarchyRequest("node has no parent"))?;
    let index = doc
        .node_index(node)
        .ok_or(DomError::HierarchyRequest("node has no parent"))?;
    Ok(Position::new(parent, index))
}

fn boundary_after(doc: &Document, node: NodeId) -> DomResult<Position> {
    let before = boundary_before(doc, node)?;
    Ok(Position::new(before.node, before.offset + 1))
}
