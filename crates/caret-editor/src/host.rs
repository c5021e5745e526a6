//! Host-block lookup and boundary predicates.
//!
//! A "host" is the element carrying the editable attribute; cursors and
//! selections live inside exactly one host. The predicates here answer
//! whether a boundary point sits at the visible start or end of its host,
//! walking up one level at a time and simulating the position as a child
//! index in the parent.

use caret_dom::{Document, NodeId, NodeKind};

/// Closest ancestor (or the node itself) carrying the editable attribute.
pub fn find_host(doc: &Document, attribute: &str, node: NodeId) -> Option<NodeId> {
    let mut current = Some(node);
    while let Some(id) = current {
        if doc.kind(id) == NodeKind::Element && doc.attribute(id, attribute).is_some() {
            return Some(id);
        }
        current = doc.parent(id);
    }
    None
}

pub fn is_linebreak(doc: &Document, node: NodeId) -> bool {
    doc.tag_name(node).is_some_and(|tag| tag == "br")
}

/// Text node that is completely empty.
pub fn is_void_text_node(doc: &Document, node: NodeId) -> bool {
    doc.kind(node) == NodeKind::Text && doc.node_length(node) == 0
}

/// Element with no child elements and no non-empty text.
pub fn is_void(doc: &Document, node: NodeId) -> bool {
    doc.children(node).iter().all(|&child| match doc.kind(child) {
        NodeKind::Text => is_void_text_node(doc, child),
        NodeKind::Element => false,
        _ => true,
    })
}

/// Text node containing nothing but whitespace.
pub fn is_whitespace_only(doc: &Document, node: NodeId) -> bool {
    doc.kind(node) == NodeKind::Text && last_offset_with_content(doc, node) == 0
}

/// The last offset at which a cursor is still at the visible end of the
/// node: trailing whitespace, empty text nodes and trailing linebreaks do
/// not count as content.
pub fn last_offset_with_content(doc: &Document, node: NodeId) -> usize {
    if doc.kind(node) == NodeKind::Text {
        return doc
            .data(node)
            .map(|data| data.trim_end().chars().count())
            .unwrap_or(0);
    }
    let children = doc.children(node);
    for (index, &child) in children.iter().enumerate().rev() {
        if is_whitespace_only(doc, child) || is_linebreak(doc, child) {
            continue;
        }
        return index + 1;
    }
    0
}

pub fn is_start_offset(doc: &Document, container: NodeId, offset: usize) -> bool {
    if doc.is_character_data(container) {
        offset == 0
    } else {
        doc.children(container).is_empty() || offset == 0
    }
}

pub fn is_end_offset(doc: &Document, container: NodeId, offset: usize) -> bool {
    if doc.is_character_data(container) {
        offset == doc.node_length(container)
    } else {
        let children = doc.children(container);
        children.is_empty() || offset == children.len()
    }
}

pub fn is_text_end_offset(doc: &Document, container: NodeId, offset: usize) -> bool {
    if doc.is_character_data(container) {
        let visible = doc
            .data(container)
            .map(|data| data.trim_end().chars().count())
            .unwrap_or(0);
        offset >= visible
    } else if doc.children(container).is_empty() {
        true
    } else {
        offset >= last_offset_with_content(doc, container)
    }
}

fn climbs_to_host(
    doc: &Document,
    host: NodeId,
    container: NodeId,
    offset: usize,
    at_offset: fn(&Document, NodeId, usize) -> bool,
    bump: usize,
) -> bool {
    if container == host {
        return at_offset(doc, container, offset);
    }
    if !at_offset(doc, container, offset) {
        return false;
    }
    match (doc.parent(container), doc.node_index(container)) {
        (Some(parent), Some(index)) => {
            // The child index (plus one for end checks) simulates a range
            // offset right next to the element.
            climbs_to_host(doc, host, parent, index + bump, at_offset, bump)
        }
        _ => false,
    }
}

pub fn is_beginning_of_host(doc: &Document, host: NodeId, container: NodeId, offset: usize) -> bool {
    climbs_to_host(doc, host, container, offset, is_start_offset, 0)
}

pub fn is_end_of_host(doc: &Document, host: NodeId, container: NodeId, offset: usize) -> bool {
    climbs_to_host(doc, host, container, offset, is_end_offset, 1)
}

pub fn is_text_end_of_host(doc: &Document, host: NodeId, container: NodeId, offset: usize) -> bool {
    climbs_to_host(doc, host, container, offset, is_text_end_offset, 1)
}

/// The deepest last child of `container`, or the container itself.
pub fn latest_child(doc: &Document, container: NodeId) -> NodeId {
    let mut current = container;
    while let Some(last) = doc.last_child(current) {
        current = last;
    }
    current
}

/// Same tag and the exact same attribute set.
pub fn is_same_element(doc: &Document, a: NodeId, b: NodeId) -> bool {
    if doc.kind(a) != doc.kind(b) || doc.tag_name(a) != doc.tag_name(b) {
        return false;
    }
    let attrs_a = doc.attributes(a);
    let attrs_b = doc.attributes(b);
    attrs_a.len() == attrs_b.len()
        && attrs_a
            .iter()
            .all(|(name, value)| doc.attribute(b, name) == Some(value.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use caret_dom::dom::markup::parse_fragment;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

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

    #[test]
    fn find_host_walks_up_from_nested_text() {
        let (doc, host) = host_from("<p><b>deep</b></p>");
        let p = doc.first_child(host).unwrap();
        let b = doc.first_child(p).unwrap();
        let text = doc.first_child(b).unwrap();
        assert_eq!(find_host(&doc, "data-editable-host", text), Some(host));
        assert_eq!(find_host(&doc, "data-editable-host", doc.root()), None);
    }

    #[rstest]
    #[case(0, true)]
    #[case(1, false)]
    #[case(3, false)]
    fn beginning_of_host_from_nested_text(#[case] offset: usize, #[case] expected: bool) {
        let (doc, host) = host_from("<b>foo</b>bar");
        let b = doc.first_child(host).unwrap();
        let text = doc.first_child(b).unwrap();
        assert_eq!(is_beginning_of_host(&doc, host, text, offset), expected);
    }

    #[test]
    fn end_of_host_requires_last_position_at_every_level() {
        let (doc, host) = host_from("foo<b>bar</b>");
        let b = doc.child(host, 1).unwrap();
        let bar = doc.first_child(b).unwrap();
        assert!(is_end_of_host(&doc, host, bar, 3));
        assert!(!is_end_of_host(&doc, host, bar, 2));

        let foo = doc.child(host, 0).unwrap();
        // End of "foo" is not the end of the host; <b> follows.
        assert!(!is_end_of_host(&doc, host, foo, 3));
    }

    #[test]
    fn text_end_ignores_trailing_whitespace_and_breaks() {
        let (doc, host) = host_from("word  <br>");
        let text = doc.first_child(host).unwrap();
        assert!(is_text_end_of_host(&doc, host, text, 4));
        assert!(!is_text_end_of_host(&doc, host, text, 3));
        assert!(!is_end_of_host(&doc, host, text, 4));
        assert_eq!(last_offset_with_content(&doc, host), 1);
    }

    #[test]
    fn latest_child_dives_to_the_deepest_node() {
        let (doc, host) = host_from("a<p>b<i>c</i></p>");
        let p = doc.child(host, 1).unwrap();
        let i = doc.child(p, 1).unwrap();
        let c = doc.first_child(i).unwrap();
        assert_eq!(latest_child(&doc, host), c);
    }

    #[test]
    fn same_element_compares_tag_and_attributes() {
        let mut doc = Document::new();
        let a = doc.create_element("em");
        let b = doc.create_element("em");
        assert!(is_same_element(&doc, a, b));
        doc.set_attribute(a, "class", "x");
        assert!(!is_same_element(&doc, a, b));
        doc.set_attribute(b, "class", "x");
        assert!(is_same_element(&doc, a, b));
    }
}
