//! End-to-end range behavior over parsed markup.

use caret_dom::dom::markup::{parse_fragment, serialize_inner};
use caret_dom::save_restore::{restore_range, save_range};
use caret_dom::selection::ReferenceSelectionBackend;
use caret_dom::{compare_points, Document, NodeId, Position, Range, Selection};
use pretty_assertions::assert_eq;

fn host_from(markup: &str) -> (Document, NodeId) {
    let mut doc = Document::new();
    let host = doc.create_element("div");
    doc.append_child(doc.root(), host).unwrap();
    let frag = parse_fragment(&mut doc, markup).unwrap();
    let children: Vec<_> = doc.children(frag).to_vec();
    for child in children {
        doc.append_child(host, child).unwrap();
    }
    (doc, host)
}

/// Boundary points between every pair of text runs form a total order
/// consistent with document order.
#[test]
fn compare_points_orders_a_real_tree() {
    let (doc, host) = host_from("<p>alpha <b>beta</b></p><p><i>gamma</i> delta</p>");

    let mut points = Vec::new();
    let mut stack = vec![host];
    while let Some(node) = stack.pop() {
        if doc.is_character_data(node) {
            points.push(Position::new(node, 0));
            points.push(Position::new(node, doc.node_length(node)));
        }
        for &child in doc.children(node).iter().rev() {
            stack.push(child);
        }
    }

    for window in points.windows(2) {
        let cmp = compare_points(&doc, window[0], window[1]).unwrap();
        assert_ne!(cmp, std::cmp::Ordering::Greater, "{:?}", window);
    }
}

#[test]
fn extract_and_reinsert_round_trips() {
    let (mut doc, host) = host_from("one <b>two</b> three");

    let mut range = Range::new(&doc);
    range.select_node_contents(&doc, host).unwrap();
    let frag = range.extract_contents(&mut doc).unwrap();
    assert_eq!(serialize_inner(&doc, host), "");

    let mut insert_point = Range::new(&doc);
    insert_point.collapse_to_point(&doc, host, 0).unwrap();
    insert_point.insert_node(&mut doc, frag).unwrap();
    assert_eq!(serialize_inner(&doc, host), "one <b>two</b> three");
}

#[test]
fn surround_selected_words_with_emphasis() {
    let (mut doc, host) = host_from("plain text here");
    let text = doc.first_child(host).unwrap();

    let mut range = Range::new(&doc);
    range.set_start_and_end(&doc, text, 6, text, 10).unwrap();
    let em = doc.create_element("em");
    range.surround_contents(&mut doc, em).unwrap();

    assert_eq!(serialize_inner(&doc, host), "plain <em>text</em> here");
    assert_eq!(range.to_text(&doc).unwrap(), "text");
}

#[test]
fn saved_range_survives_surrounding_edits() {
    let (mut doc, host) = host_from("<p>start</p><p>middle</p><p>finish</p>");
    let middle = doc.child(host, 1).unwrap();
    let middle_text = doc.first_child(middle).unwrap();

    let mut range = Range::new(&doc);
    range
        .set_start_and_end(&doc, middle_text, 0, middle_text, 6)
        .unwrap();
    let saved = save_range(&mut doc, &mut range, false).unwrap();

    // Mutate both neighbors while the range is parked.
    let first = doc.child(host, 0).unwrap();
    doc.remove_node(first);
    let extra = parse_fragment(&mut doc, "<p>inserted</p>").unwrap();
    let new_para = doc.first_child(extra).unwrap();
    doc.append_child(host, new_para).unwrap();

    let restored = restore_range(&mut doc, &saved, true).unwrap();
    assert_eq!(restored.to_text(&doc).unwrap(), "middle");
}

#[test]
fn selection_spanning_elements_reads_and_collapses() {
    let (mut doc, host) = host_from("ab<b>cd</b>ef");
    let first = doc.child(host, 0).unwrap();
    let last = doc.child(host, 2).unwrap();

    let mut sel = Selection::new(&mut doc, Box::new(ReferenceSelectionBackend::new())).unwrap();
    let mut range = Range::new(&doc);
    range.set_start_and_end(&doc, first, 1, last, 1).unwrap();
    sel.add_range(&doc, range).unwrap();
    assert_eq!(sel.to_text(&doc).unwrap(), "bcde");

    sel.collapse_to_end(&doc).unwrap();
    assert!(sel.is_collapsed());
    assert_eq!(sel.focus(), Some(Position::new(last, 1)));
}

#[test]
fn normalize_boundaries_after_manual_splits() {
    let (mut doc, host) = host_from("hello world");
    let text = doc.first_child(host).unwrap();
    doc.split_data_node(text, 5, &mut []).unwrap();

    // Start at the seam between the two halves.
    let tail = doc.child(host, 1).unwrap();
    let mut range = Range::new(&doc);
    range.set_start_and_end(&doc, text, 5, tail, 4).unwrap();
    range.normalize_boundaries(&mut doc).unwrap();

    // The split heals and the range covers the same characters.
    assert_eq!(doc.children(host).len(), 1);
    assert_eq!(range.to_text(&doc).unwrap(), " wor");
    assert_eq!(doc.text_content(host), "hello world");
}
