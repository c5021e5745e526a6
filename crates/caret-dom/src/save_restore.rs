//! Persisting ranges and selections across tree mutation.
//!
//! Boundary positions are node-plus-offset pairs, so any edit near a
//! boundary invalidates them. The marker scheme survives this: each
//! boundary gets an invisible span inserted into the tree, and restoring
//! finds the spans again by id. Markers carry a data attribute so content
//! extraction can strip any that leak.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dom::{Document, NodeId, NodeKind};
use crate::error::DomResult;
use crate::range::Range;
use crate::selection::Selection;

/// Zero-width no-break space, the marker spans' only content.
pub const MARKER_TEXT: &str = "\u{feff}";

/// Attribute identifying internal helper elements. Content extraction
/// removes any element carrying it.
pub const INTERNAL_ATTRIBUTE: &str = "data-editable";
pub const INTERNAL_ATTRIBUTE_VALUE: &str = "remove";

/// A saved range: marker ids instead of live positions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SavedRange {
    Collapsed {
        marker_id: String,
    },
    Spanning {
        start_marker_id: String,
        end_marker_id: String,
        backward: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedSelection {
    pub range_infos: Vec<SavedRange>,
    pub restored: bool,
}

fn new_marker_id() -> String {
    format!("caret-boundary-{}", Uuid::new_v4())
}

/// Insert a marker span at one boundary of `range`. The range itself is not
/// moved; a collapsed copy does the insertion.
fn insert_boundary_marker(
    doc: &mut Document,
    range: &Range,
    at_start: bool,
) -> DomResult<(NodeId, String)> {
    let marker_id = new_marker_id();

    let mut boundary = *range;
    boundary.collapse(at_start);

    let marker = doc.create_element("span");
    doc.set_attribute(marker, "id", &marker_id);
    doc.set_attribute(marker, INTERNAL_ATTRIBUTE, INTERNAL_ATTRIBUTE_VALUE);
    let text = doc.create_text(MARKER_TEXT);
    doc.append_child(marker, text)?;

    boundary.insert_node(doc, marker)?;
    Ok((marker, marker_id))
}

/// Move one boundary of `range` to just before the marker, consuming the
/// marker. A missing marker is logged and skipped.
fn set_range_boundary(
    doc: &mut Document,
    range: &mut Range,
    marker_id: &str,
    at_start: bool,
) -> DomResult<()> {
    match doc.get_element_by_id(marker_id) {
        Some(marker) => {
            if at_start {
                range.set_start_before(doc, marker)?;
            } else {
                range.set_end_before(doc, marker)?;
            }
            doc.remove_node(marker);
        }
        None => {
            tracing::warn!(marker_id, "marker element has been removed, cannot restore boundary");
        }
    }
    Ok(())
}

/// Save one range by planting markers, then re-anchor the range between
/// them so the caller's range stays live through the insertion.
pub fn save_range(doc: &mut Document, range: &mut Range, backward: bool) -> DomResult<SavedRange> {
    range.assert_valid(doc)?;
    if range.collapsed() {
        let (marker, marker_id) = insert_boundary_marker(doc, range, false)?;
        range.collapse_before(doc, marker)?;
        Ok(SavedRange::Collapsed { marker_id })
    } else {
        // End marker first so the start insertion cannot shift it.
        let (end_marker, end_marker_id) = insert_boundary_marker(doc, range, false)?;
        let (start_marker, start_marker_id) = insert_boundary_marker(doc, range, true)?;
        range.set_end_before(doc, end_marker)?;
        range.set_start_after(doc, start_marker)?;
        Ok(SavedRange::Spanning {
            start_marker_id,
            end_marker_id,
            backward,
        })
    }
}

/// Rebuild a range from its markers, consuming them. Best-effort: a stale
/// marker leaves that boundary at the document start and logs a warning.
pub fn restore_range(doc: &mut Document, saved: &SavedRange, normalize: bool) -> DomResult<Range> {
    let mut range = Range::new(doc);
    match saved {
        SavedRange::Collapsed { marker_id } => match doc.get_element_by_id(marker_id) {
            Some(marker) => {
                // A restored caret should land at the end of adjacent text
                // rather than between the text and where the marker stood.
                let previous = doc.prev_sibling(marker);
                match previous.filter(|&p| doc.kind(p) == NodeKind::Text) {
                    Some(text) => {
                        doc.remove_node(marker);
                        range.collapse_to_point(doc, text, doc.node_length(text))?;
                    }
                    None => {
                        range.collapse_before(doc, marker)?;
                        doc.remove_node(marker);
                    }
                }
            }
            None => {
                tracing::warn!(marker_id, "marker element has been removed, cannot restore range");
            }
        },
        SavedRange::Spanning {
            start_marker_id,
            end_marker_id,
            ..
        } => {
            set_range_boundary(doc, &mut range, start_marker_id, true)?;
            set_range_boundary(doc, &mut range, end_marker_id, false)?;
        }
    }
    if normalize {
        range.normalize_boundaries(doc)?;
    }
    Ok(range)
}

/// Save several ranges at once. Markers go in latest-in-document first so
/// insertions cannot disturb ranges still waiting for theirs; only then is
/// each range re-anchored to its markers.
pub fn save_ranges(
    doc: &mut Document,
    ranges: &mut [Range],
    backward: bool,
) -> DomResult<Vec<SavedRange>> {
    let mut order: Vec<usize> = (0..ranges.len()).collect();
    // Latest first. Boundary comparison on a live document cannot fail for
    // ranges that share it, so equal-ordering is a safe fallback.
    order.sort_by(|&x, &y| {
        crate::position::compare_points(doc, ranges[y].start(), ranges[x].start())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut planted: Vec<(usize, SavedRange, Vec<NodeId>)> = Vec::with_capacity(ranges.len());
    for &index in &order {
        let range = &ranges[index];
        if range.collapsed() {
            let (marker, marker_id) = insert_boundary_marker(doc, range, false)?;
            planted.push((index, SavedRange::Collapsed { marker_id }, vec![marker]));
        } else {
            let (end_marker, end_marker_id) = insert_boundary_marker(doc, range, false)?;
            let (start_marker, start_marker_id) = insert_boundary_marker(doc, range, true)?;
            planted.push((
                index,
                SavedRange::Spanning {
                    start_marker_id,
                    end_marker_id,
                    backward,
                },
                vec![start_marker, end_marker],
            ));
        }
    }

    let mut infos = vec![None; ranges.len()];
    for (index, saved, markers) in planted {
        let range = &mut ranges[index];
        match (&saved, markers.as_slice()) {
            (SavedRange::Collapsed { .. }, [marker]) => {
                range.collapse_before(doc, *marker)?;
            }
            (SavedRange::Spanning { .. }, [start_marker, end_marker]) => {
                range.set_end_before(doc, *end_marker)?;
                range.set_start_after(doc, *start_marker)?;
            }
            _ => unreachable!(),
        }
        infos[index] = Some(saved);
    }
    Ok(infos.into_iter().flatten().collect())
}

/// Restore every saved range. Markers are looked up by id, so text-node
/// merges from normalizing one range cannot strand another.
pub fn restore_ranges(doc: &mut Document, infos: &[SavedRange]) -> DomResult<Vec<Range>> {
    let mut ranges = vec![Range::new(doc); infos.len()];
    for (index, saved) in infos.iter().enumerate().rev() {
        ranges[index] = restore_range(doc, saved, true)?;
    }
    Ok(ranges)
}

/// Save the selection's ranges, leaving the selection itself in place.
pub fn save_selection(doc: &mut Document, selection: &mut Selection) -> DomResult<SavedSelection> {
    let mut ranges = selection.get_all_ranges();
    let backward = ranges.len() == 1 && selection.is_backward(doc);
    let range_infos = save_ranges(doc, &mut ranges, backward)?;

    // Marker insertion went through the document, not the backend; put the
    // adjusted ranges back so the visible selection is unaffected.
    if backward {
        selection.set_single_range(doc, ranges[0], true)?;
    } else {
        selection.set_ranges(doc, &ranges)?;
    }

    Ok(SavedSelection {
        range_infos,
        restored: false,
    })
}

pub fn restore_selection(
    doc: &mut Document,
    selection: &mut Selection,
    saved: &mut SavedSelection,
    preserve_direction: bool,
) -> DomResult<()> {
    if saved.restored {
        return Ok(());
    }
    let ranges = restore_ranges(doc, &saved.range_infos)?;
    let single_backward = matches!(
        saved.range_infos.as_slice(),
        [SavedRange::Spanning { backward: true, .. }]
    );
    if preserve_direction && single_backward && selection.features().has_extend {
        selection.remove_all_ranges()?;
        selection.add_range_with_direction(doc, ranges[0], true)?;
    } else {
        selection.set_ranges(doc, &ranges)?;
    }
    saved.restored = true;
    Ok(())
}

/// Drop any markers a saved selection left behind without restoring it.
pub fn remove_markers(doc: &mut Document, saved: &SavedSelection) {
    for info in &saved.range_infos {
        match info {
            SavedRange::Collapsed { marker_id } => remove_marker_element(doc, marker_id),
            SavedRange::Spanning {
                start_marker_id,
                end_marker_id,
                ..
            } => {
                remove_marker_element(doc, start_marker_id);
                remove_marker_element(doc, end_marker_id);
            }
        }
    }
}

pub fn remove_marker_element(doc: &mut Document, marker_id: &str) {
    if let Some(marker) = doc.get_element_by_id(marker_id) {
        doc.remove_node(marker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::ReferenceSelectionBackend;
    use pretty_assertions::assert_eq;

    fn doc_with_text(content: &str) -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let text = doc.create_text(content);
        doc.append_child(doc.root(), div).unwrap();
        doc.append_child(div, text).unwrap();
        (doc, div, text)
    }

    fn char_range(doc: &Document, node: NodeId, from: usize, to: usize) -> Range {
        let mut range = Range::new(doc);
        range.set_start_and_end(doc, node, from, node, to).unwrap();
        range
    }

    #[test]
    fn spanning_range_survives_text_replacement() {
        let (mut doc, div, text) = doc_with_text("hello brave world");
        let mut range = char_range(&doc, text, 6, 11);
        assert_eq!(range.to_text(&doc).unwrap(), "brave");

        let saved = save_range(&mut doc, &mut range, false).unwrap();
        // The live range still selects the same text around the markers.
        assert_eq!(range.to_text(&doc).unwrap(), "brave");

        // Splitting "hello" in two would have invalidated raw offsets.
        let first = doc.first_child(div).unwrap();
        doc.split_data_node(first, 3, &mut []).unwrap();

        let restored = restore_range(&mut doc, &saved, true).unwrap();
        assert_eq!(restored.to_text(&doc).unwrap(), "brave");
        // Markers are consumed on restore.
        assert!(!doc.text_content(div).contains('\u{feff}'));
    }

    #[test]
    fn collapsed_range_snaps_to_preceding_text_end() {
        let (mut doc, div, text) = doc_with_text("hello");
        let mut range = char_range(&doc, text, 3, 3);
        let saved = save_range(&mut doc, &mut range, false).unwrap();

        let restored = restore_range(&mut doc, &saved, true).unwrap();
        assert!(restored.collapsed());
        // The marker split "hello" into "hel" + "lo"; restore snaps to the
        // end of "hel" and normalization stitches the text back together.
        let first = doc.first_child(div).unwrap();
        assert_eq!(restored.start_container(), first);
        assert_eq!(restored.start_offset(), 3);
        assert_eq!(doc.text_content(div), "hello");
    }

    #[test]
    fn stale_marker_warns_and_returns_default_range() {
        let (mut doc, _div, text) = doc_with_text("hello");
        let mut range = char_range(&doc, text, 1, 4);
        let saved = save_range(&mut doc, &mut range, false).unwrap();

        if let SavedRange::Spanning { end_marker_id, .. } = &saved {
            remove_marker_element(&mut doc, end_marker_id);
        }
        // Start boundary restores, end boundary stays at the default.
        let restored = restore_range(&mut doc, &saved, false).unwrap();
        assert_eq!(restored.end_container(), doc.root());
        assert_eq!(restored.end_offset(), 0);
    }

    #[test]
    fn multiple_ranges_round_trip_in_order() {
        let (mut doc, _div, text) = doc_with_text("one two three");
        let mut ranges = vec![
            char_range(&doc, text, 0, 3),
            char_range(&doc, text, 8, 13),
        ];
        let infos = save_ranges(&mut doc, &mut ranges, false).unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(ranges[0].to_text(&doc).unwrap(), "one");
        assert_eq!(ranges[1].to_text(&doc).unwrap(), "three");

        let restored = restore_ranges(&mut doc, &infos).unwrap();
        assert_eq!(restored[0].to_text(&doc).unwrap(), "one");
        assert_eq!(restored[1].to_text(&doc).unwrap(), "three");
    }

    #[test]
    fn selection_save_restore_preserves_direction() {
        let (mut doc, _div, text) = doc_with_text("hello world");
        let mut sel = Selection::new(&mut doc, Box::new(ReferenceSelectionBackend::new())).unwrap();
        sel.add_range_with_direction(&doc, char_range(&doc, text, 0, 5), true)
            .unwrap();
        assert!(sel.is_backward(&doc));

        let mut saved = save_selection(&mut doc, &mut sel).unwrap();
        assert!(sel.is_backward(&doc));
        assert_eq!(sel.to_text(&doc).unwrap(), "hello");

        sel.remove_all_ranges().unwrap();
        restore_selection(&mut doc, &mut sel, &mut saved, true).unwrap();
        assert!(sel.is_backward(&doc));
        assert_eq!(sel.to_text(&doc).unwrap(), "hello");

        // Restoring twice is a no-op.
        restore_selection(&mut doc, &mut sel, &mut saved, true).unwrap();
        assert!(saved.restored);
    }

    #[test]
    fn remove_markers_discards_without_restoring() {
        let (mut doc, div, text) = doc_with_text("hello");
        let mut sel = Selection::new(&mut doc, Box::new(ReferenceSelectionBackend::new())).unwrap();
        sel.add_range(&doc, char_range(&doc, text, 1, 4)).unwrap();
        let saved = save_selection(&mut doc, &mut sel).unwrap();

        remove_markers(&mut doc, &saved);
        assert!(!doc.text_content(div).contains('\u{feff}'));
    }
}
