//! Content transformation: tag normalization, wrapping and unwrapping
//! formatting, character insertion and removal, and extraction of clean
//! markup.
//!
//! Mutating operations that need a live range park it with the marker
//! scheme first and restore it afterwards, so the returned range is valid
//! against the mutated tree.

use caret_dom::dom::markup::{parse_fragment, serialize_inner};
use caret_dom::save_restore::{restore_range, save_range, INTERNAL_ATTRIBUTE};
use caret_dom::{Document, NodeId, NodeKind, Range};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::EditorResult;
use crate::host;

/// All whitespace except a plain space becomes a space.
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_EXCEPT_SPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE_EXCEPT_SPACE.get_or_init(|| Regex::new(r"[^\S ]").unwrap());
    re.replace_all(text, " ").into_owned()
}

/// Remove empty tags and merge consecutive same-tag, same-attribute
/// siblings, recursively.
pub fn normalize_tags(doc: &mut Document, element: NodeId) -> EditorResult<()> {
    let mut index = 0;
    while index < doc.children(element).len() {
        let node = doc.children(element)[index];
        let linebreak = host::is_linebreak(doc, node);

        if !linebreak && doc.text_content(node).is_empty() {
            doc.remove_node(node);
            continue;
        }

        if doc.kind(node) == NodeKind::Element && !linebreak {
            while let Some(sibling) = doc.next_sibling(node) {
                if !host::is_same_element(doc, node, sibling) {
                    break;
                }
                let grandchildren: Vec<_> = doc.children(sibling).to_vec();
                for grandchild in grandchildren {
                    doc.append_child(node, grandchild)?;
                }
                doc.remove_node(sibling);
            }
            normalize_tags(doc, node)?;
        }
        index += 1;
    }
    Ok(())
}

/// Parse markup into a fresh fragment.
pub fn create_fragment_from_string(doc: &mut Document, markup: &str) -> EditorResult<NodeId> {
    Ok(parse_fragment(doc, markup)?)
}

pub fn fragment_to_html(doc: &Document, fragment: NodeId) -> String {
    serialize_inner(doc, fragment)
}

/// Replace an element with its own children.
pub fn unwrap_element(doc: &mut Document, element: NodeId) -> EditorResult<()> {
    let children: Vec<_> = doc.children(element).to_vec();
    for child in children {
        doc.insert_before(child, element)?;
    }
    doc.remove_node(element);
    Ok(())
}

/// The cleaned markup of an element or fragment: zero-width characters
/// stripped, zero-width spaces turned into line breaks, and internal
/// helper elements removed or unwrapped. The source is left untouched.
pub fn extract_content(
    doc: &mut Document,
    element: NodeId,
    keep_ui_elements: bool,
) -> EditorResult<String> {
    let markup = serialize_inner(doc, element)
        .replace('\u{feff}', "")
        .replace('\u{200b}', "<br>");

    let scratch = parse_fragment(doc, &markup)?;
    strip_internal_nodes(doc, scratch, keep_ui_elements)?;
    let cleaned = serialize_inner(doc, scratch);
    doc.remove_node(scratch);
    Ok(cleaned)
}

fn strip_internal_nodes(
    doc: &mut Document,
    node: NodeId,
    keep_ui_elements: bool,
) -> EditorResult<()> {
    let mut index = 0;
    while index < doc.children(node).len() {
        let child = doc.children(node)[index];
        if doc.kind(child) == NodeKind::Element {
            strip_internal_nodes(doc, child, keep_ui_elements)?;
            let marker = doc
                .attribute(child, INTERNAL_ATTRIBUTE)
                .map(str::to_string);
            match marker.as_deref() {
                Some("remove") => {
                    doc.remove_node(child);
                    continue;
                }
                Some("unwrap") => {
                    unwrap_element(doc, child)?;
                    continue;
                }
                Some("ui-remove") if !keep_ui_elements => {
                    doc.remove_node(child);
                    continue;
                }
                Some("ui-unwrap") if !keep_ui_elements => {
                    unwrap_element(doc, child)?;
                    continue;
                }
                _ => {}
            }
        }
        index += 1;
    }
    Ok(())
}

/// Clone the range's contents without the shared ancestor element the
/// clone would otherwise be wrapped in.
pub fn clone_contents_without_ancestor(
    doc: &mut Document,
    range: &Range,
) -> EditorResult<NodeId> {
    let clone = range.clone_contents(doc)?;
    let Some(&wrapper) = doc.children(clone).first() else {
        return Ok(clone);
    };
    let fragment = doc.create_fragment();
    let children: Vec<_> = doc.children(wrapper).to_vec();
    for child in children {
        doc.append_child(fragment, child)?;
    }
    doc.remove_node(clone);
    Ok(fragment)
}

/// Elements that start or end inside the range, without the ancestors
/// wrapping it.
pub fn get_inner_tags(
    doc: &Document,
    range: &Range,
    mut filter: impl FnMut(&Document, NodeId) -> bool,
) -> EditorResult<Vec<NodeId>> {
    Ok(range.get_nodes(doc, Some(&[NodeKind::Element]), |node| filter(doc, node))?)
}

/// Elements that start or end inside the range, plus the ancestors
/// wrapping the whole range up to (excluding) the host.
pub fn get_tags(
    doc: &Document,
    host: NodeId,
    range: &Range,
    mut filter: impl FnMut(&Document, NodeId) -> bool,
) -> EditorResult<Vec<NodeId>> {
    let mut tags = get_inner_tags(doc, range, &mut filter)?;

    let mut node = range.common_ancestor_container(doc)?;
    while node != host {
        if doc.kind(node) == NodeKind::Element && filter(doc, node) {
            tags.push(node);
        }
        node = match doc.parent(node) {
            Some(parent) => parent,
            None => break,
        };
    }
    Ok(tags)
}

pub fn get_tags_by_name(
    doc: &Document,
    host: NodeId,
    range: &Range,
    tag_name: &str,
) -> EditorResult<Vec<NodeId>> {
    get_tags(doc, host, range, |doc, node| {
        doc.tag_name(node) == Some(tag_name)
    })
}

/// Whether the range selects exactly the element's contents, no less and
/// no more. With `visible_only`, surrounding whitespace is ignored.
pub fn is_exact_selection(
    doc: &Document,
    range: &Range,
    element: NodeId,
    visible_only: bool,
) -> EditorResult<bool> {
    let element_range = Range::selecting_node_contents(doc, element)?;
    if !range.intersects_range(doc, &element_range)? {
        return Ok(false);
    }
    let mut range_text = range.to_text(doc)?;
    let mut element_text = doc.text_content(element);
    if visible_only {
        range_text = range_text.trim().to_string();
        element_text = element_text.trim().to_string();
    }
    Ok(!range_text.is_empty() && range_text == element_text)
}

pub fn contains_string(doc: &Document, range: &Range, needle: &str) -> EditorResult<bool> {
    Ok(range.to_text(doc)?.contains(needle))
}

pub fn expand_to(doc: &Document, range: &mut Range, element: NodeId) -> EditorResult<()> {
    range.select_node_contents(doc, element)?;
    Ok(())
}

/// Park the range behind markers, run the mutation, bring it back. The
/// closure receives the marker-adjusted range, which excludes the markers
/// themselves and stays valid while the tree changes around it.
fn with_preserved_range(
    doc: &mut Document,
    range: &mut Range,
    mutate: impl FnOnce(&mut Document, &Range) -> EditorResult<()>,
) -> EditorResult<()> {
    let saved = save_range(doc, range, false)?;
    let parked = *range;
    mutate(doc, &parked)?;
    *range = restore_range(doc, &saved, true)?;
    Ok(())
}

/// Unwrap every tag affecting the range; with a tag name, only those.
/// The affected elements can reach outside the range.
pub fn nuke(
    doc: &mut Document,
    host: NodeId,
    range: &Range,
    tag_name: Option<&str>,
) -> EditorResult<()> {
    let tags = get_tags(doc, host, range, |doc, node| match tag_name {
        Some(name) => doc.tag_name(node) == Some(name),
        None => !host::is_linebreak(doc, node),
    })?;
    for element in tags {
        unwrap_element(doc, element)?;
    }
    Ok(())
}

pub fn remove_formatting(
    doc: &mut Document,
    host: NodeId,
    mut range: Range,
    tag_name: &str,
) -> EditorResult<Range> {
    with_preserved_range(doc, &mut range, |doc, parked| {
        nuke(doc, host, parked, Some(tag_name))
    })?;
    Ok(range)
}

/// Wrap the range in a fresh element, stripping competing same-name tags
/// first and falling back to stripping everything if the range still
/// cannot be cleanly surrounded.
pub fn force_wrap(
    doc: &mut Document,
    host: NodeId,
    mut range: Range,
    tag_name: &str,
    attributes: &[(&str, &str)],
) -> EditorResult<Range> {
    with_preserved_range(doc, &mut range, |doc, parked| {
        nuke(doc, host, parked, Some(tag_name))
    })?;

    if !range.can_surround_contents(doc)? {
        with_preserved_range(doc, &mut range, |doc, parked| nuke(doc, host, parked, None))?;
    }

    wrap(doc, &mut range, tag_name, attributes)?;
    Ok(range)
}

/// Surround the range with a new element, when structurally possible.
pub fn wrap(
    doc: &mut Document,
    range: &mut Range,
    tag_name: &str,
    attributes: &[(&str, &str)],
) -> EditorResult<()> {
    if !range.can_surround_contents(doc)? {
        tracing::warn!(tag_name, "cannot surround range, partial element selection");
        return Ok(());
    }
    let element = doc.create_element(tag_name);
    for (name, value) in attributes {
        doc.set_attribute(element, name, value);
    }
    range.surround_contents(doc, element)?;
    Ok(())
}

/// Wrap unless the range already selects exactly one such tag, in which
/// case the formatting is removed instead.
pub fn toggle_tag(
    doc: &mut Document,
    host: NodeId,
    range: Range,
    tag_name: &str,
    attributes: &[(&str, &str)],
) -> EditorResult<Range> {
    let existing = get_tags_by_name(doc, host, &range, tag_name)?;
    if existing.len() == 1 && is_exact_selection(doc, &range, existing[0], true)? {
        return remove_formatting(doc, host, range, tag_name);
    }
    force_wrap(doc, host, range, tag_name, attributes)
}

/// Insert text right outside one boundary of the range, keeping the range
/// selecting its original content plus the insertion.
pub fn insert_character(
    doc: &mut Document,
    range: &mut Range,
    text: &str,
    at_start: bool,
) -> EditorResult<()> {
    let node = doc.create_text(text);
    let mut boundary = *range;
    boundary.collapse(at_start);
    boundary.insert_node(doc, node)?;

    // Anchor the boundary inside the inserted node itself so later
    // insertions near the same container cannot shift it.
    if at_start {
        range.set_start(doc, node, 0)?;
    } else {
        range.set_end(doc, node, doc.node_length(node))?;
    }
    range.normalize_boundaries(doc)?;
    Ok(())
}

/// Put characters like quotes around the range.
pub fn surround(
    doc: &mut Document,
    mut range: Range,
    start_text: &str,
    end_text: &str,
) -> EditorResult<Range> {
    insert_character(doc, &mut range, end_text, false)?;
    insert_character(doc, &mut range, start_text, true)?;
    Ok(range)
}

/// Delete every occurrence of `needle` from the text within the range.
pub fn delete_character(doc: &mut Document, range: Range, needle: &str) -> EditorResult<Range> {
    if !contains_string(doc, &range, needle)? {
        return Ok(range);
    }
    let mut range = range;
    range.split_boundaries(doc)?;
    let nodes = range.get_nodes(doc, Some(&[NodeKind::Text]), |node| {
        doc.data(node).is_some_and(|data| data.contains(needle))
    })?;
    with_preserved_range(doc, &mut range, |doc, _parked| {
        for node in nodes {
            if let Some(data) = doc.data(node) {
                let replaced = data.replace(needle, "");
                doc.set_data(node, &replaced);
            }
        }
        Ok(())
    })?;
    Ok(range)
}
