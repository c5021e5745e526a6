//! Boundary points and document-order comparison.

use std::cmp::Ordering;

use crate::dom::{Document, NodeId};
use crate::error::{DomError, DomResult};

/// A boundary point: a node plus an offset into it.
///
/// For character-data nodes the offset counts chars; for everything else it
/// counts children, so offset `i` names the gap before child `i` (or after
/// the last child when `i` equals the child count).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    /// Whether the offset fits the node's current capacity.
    pub fn is_valid(&self, doc: &Document) -> bool {
        self.offset <= doc.node_length(self.node)
    }
}

/// Compare two boundary points in document order.
///
/// Four cases: same container; one container an ancestor of the other (two
/// symmetric cases, resolved by comparing the offset against the index of the
/// child on the path down); otherwise siblings under the common ancestor
/// decide. Points in disjoint trees have no order.
pub fn compare_points(doc: &Document, a: Position, b: Position) -> DomResult<Ordering> {
    if a.node == b.node {
        return Ok(a.offset.cmp(&b.offset));
    }

    if doc.is_ancestor_of(a.node, b.node, false) {
        // a's container is above b's: the child of a.node on the path to
        // b.node stands in for b.
        let child = doc
            .closest_ancestor_in(b.node, a.node, true)
            .ok_or(DomError::WrongDocument)?;
        let child_index = doc.node_index(child).ok_or(DomError::WrongDocument)?;
        return Ok(if a.offset <= child_index {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    if doc.is_ancestor_of(b.node, a.node, false) {
        let child = doc
            .closest_ancestor_in(a.node, b.node, true)
            .ok_or(DomError::WrongDocument)?;
        let child_index = doc.node_index(child).ok_or(DomError::WrongDocument)?;
        return Ok(if child_index < b.offset {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    let common = doc
        .common_ancestor(a.node, b.node)
        .ok_or(DomError::WrongDocument)?;
    let child_a = doc
        .closest_ancestor_in(a.node, common, true)
        .ok_or(DomError::WrongDocument)?;
    let child_b = doc
        .closest_ancestor_in(b.node, common, true)
        .ok_or(DomError::WrongDocument)?;
    let index_a = doc.node_index(child_a).ok_or(DomError::WrongDocument)?;
    let index_b = doc.node_index(child_b).ok_or(DomError::WrongDocument)?;
    Ok(index_a.cmp(&index_b))
}
