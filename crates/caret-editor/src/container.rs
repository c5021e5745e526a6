//! The current range state of a host: nothing, a cursor, or a selection.

use caret_dom::{Document, NodeId, Range};

use crate::cursor::Cursor;
use crate::error::EditorResult;
use crate::selection::TextSelection;

#[derive(Clone, Debug, PartialEq, Default)]
pub enum RangeContainer {
    #[default]
    None,
    Cursor(Cursor),
    Selection(TextSelection),
}

impl RangeContainer {
    /// Classify a range: collapsed becomes a cursor, anything else a
    /// selection.
    pub fn from_range(host: NodeId, range: Range) -> Self {
        if range.collapsed() {
            RangeContainer::Cursor(Cursor::new(host, range))
        } else {
            RangeContainer::Selection(TextSelection::new(host, range))
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RangeContainer::None)
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self, RangeContainer::Cursor(_))
    }

    pub fn is_selection(&self) -> bool {
        matches!(self, RangeContainer::Selection(_))
    }

    pub fn host(&self) -> Option<NodeId> {
        match self {
            RangeContainer::None => None,
            RangeContainer::Cursor(cursor) => Some(cursor.host()),
            RangeContainer::Selection(selection) => Some(selection.host()),
        }
    }

    pub fn as_cursor(&self) -> Option<&Cursor> {
        match self {
            RangeContainer::Cursor(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn as_selection(&self) -> Option<&TextSelection> {
        match self {
            RangeContainer::Selection(selection) => Some(selection),
            _ => None,
        }
    }

    /// Reduce to a cursor: a selection deletes its content first.
    pub fn force_cursor(self, doc: &mut Document) -> EditorResult<Option<Cursor>> {
        match self {
            RangeContainer::None => Ok(None),
            RangeContainer::Cursor(cursor) => Ok(Some(cursor)),
            RangeContainer::Selection(selection) => Ok(Some(selection.delete_content(doc)?)),
        }
    }

    /// Whether this represents a different user-visible state than
    /// `other`: a different variant, or the same variant at a different
    /// position.
    pub fn is_different_from(&self, other: &RangeContainer) -> bool {
        match (self, other) {
            (RangeContainer::None, RangeContainer::None) => false,
            (RangeContainer::Cursor(a), RangeContainer::Cursor(b)) => !a.equals(b),
            (RangeContainer::Selection(a), RangeContainer::Selection(b)) => !a.equals(b),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caret_dom::dom::markup::parse_fragment;
    use pretty_assertions::assert_eq;

    fn host_from(markup: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let host = doc.create_element("div");
        doc.set_attribute(host, "data-editable-host", "true");
        doc.append_child(doc.root(), host).unwrap();
        let frag = parse_fragment(&mut doc, markup).unwrap();
        let children: Vec<_> = doc.children(frag).to_vec();
        for child in children {
            doc.append_child(host, child).unwrap();
        }
        (doc, host)
    }

    fn range_between(doc: &Document, node: NodeId, from: usize, to: usize) -> Range {
        let mut range = Range::new(doc);
        range.set_start_and_end(doc, node, from, node, to).unwrap();
        range
    }

    #[test]
    fn classifies_by_collapsedness() {
        let (doc, host) = host_from("abc");
        let text = doc.first_child(host).unwrap();
        assert!(RangeContainer::from_range(host, range_between(&doc, text, 1, 1)).is_cursor());
        assert!(RangeContainer::from_range(host, range_between(&doc, text, 0, 2)).is_selection());
        assert!(RangeContainer::None.is_none());
    }

    #[test]
    fn force_cursor_deletes_selected_content() {
        let (mut doc, host) = host_from("abc");
        let text = doc.first_child(host).unwrap();
        let container = RangeContainer::from_range(host, range_between(&doc, text, 1, 3));
        let cursor = container.force_cursor(&mut doc).unwrap().unwrap();
        assert_eq!(doc.text_content(host), "a");
        assert!(cursor.range().collapsed());
    }

    #[test]
    fn difference_compares_variant_and_position() {
        let (doc, host) = host_from("abc");
        let text = doc.first_child(host).unwrap();
        let at_one = RangeContainer::from_range(host, range_between(&doc, text, 1, 1));
        let at_two = RangeContainer::from_range(host, range_between(&doc, text, 2, 2));
        let spanning = RangeContainer::from_range(host, range_between(&doc, text, 1, 2));

        assert!(!at_one.is_different_from(&at_one.clone()));
        assert!(at_one.is_different_from(&at_two));
        assert!(at_one.is_different_from(&spanning));
        assert!(RangeContainer::None.is_different_from(&at_one));
    }
}
