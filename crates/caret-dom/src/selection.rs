//! Selection over a backend, with cached ranges and direction tracking.
//!
//! Host selection engines differ in what they expose: some report
//! anchor/focus points, some a range list, some only a single current
//! range, and not all of them can represent a backward (focus-before-anchor)
//! selection or hold more than one range. As with ranges, the backend is
//! probed once at construction; the probe picks a refresh strategy and
//! records the capabilities, and every later call compensates accordingly:
//!
//! - a backward range is added as collapse-to-end plus `extend` when the
//!   backend supports extending, forwards otherwise;
//! - on a single-range backend, adding a second range replaces the
//!   selection instead of failing;
//! - ranges handed to the backend are copies, so callers mutating a range
//!   afterwards do not mutate the selection.

use std::cmp::Ordering;

use crate::dom::{Document, NodeId};
use crate::error::{DomError, DomResult};
use crate::position::{compare_points, Position};
use crate::range::Range;

/// The contract a host selection engine exposes. Methods a given engine
/// does not implement return [`DomError::Unsupported`]; the probes sort out
/// which ones work.
pub trait SelectionBackend {
    fn range_count(&self) -> DomResult<usize>;
    fn range_at(&self, index: usize) -> DomResult<(Position, Position)>;
    fn anchor(&self) -> DomResult<Option<Position>>;
    fn focus(&self) -> DomResult<Option<Position>>;
    /// Legacy engines that expose exactly one current range (or none).
    fn selected_range(&self) -> DomResult<Option<(Position, Position)>>;

    fn add_range(&mut self, doc: &Document, start: Position, end: Position) -> DomResult<()>;
    fn remove_all_ranges(&mut self) -> DomResult<()>;
    fn collapse_at(&mut self, doc: &Document, at: Position) -> DomResult<()>;
    /// Move the focus, leaving the anchor in place. Not every engine has it.
    fn extend_to(&mut self, doc: &Document, to: Position) -> DomResult<()>;
}

/// How [`Selection::refresh`] reads the backend's state back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Range list via `range_count` / `range_at`.
    RangeList,
    /// Anchor and focus points only; at most one range.
    AnchorFocus,
    /// Legacy single current range.
    SingleRange,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SelectionFeatures {
    pub refresh: RefreshStrategy,
    pub has_extend: bool,
    pub supports_multiple_ranges: bool,
}

/// Decide the refresh strategy and capabilities for `backend`. Fails with
/// [`DomError::Unsupported`] when the backend offers no way to read a
/// selection at all — callers are expected to fail fast at startup rather
/// than limp along.
pub fn probe_selection_features(
    doc: &mut Document,
    backend: &mut dyn SelectionBackend,
) -> DomResult<SelectionFeatures> {
    let refresh = if backend.range_count().is_ok() {
        RefreshStrategy::RangeList
    } else if backend.anchor().is_ok() && backend.focus().is_ok() {
        RefreshStrategy::AnchorFocus
    } else if backend.selected_range().is_ok() {
        RefreshStrategy::SingleRange
    } else {
        return Err(DomError::Unsupported(
            "selection backend exposes no way to read the selection".to_string(),
        ));
    };

    let probe_node = doc.create_text("\u{a0}\u{a0}\u{a0}");
    doc.append_child(doc.root(), probe_node)?;

    let has_extend = {
        let collapsed = backend.collapse_at(doc, Position::new(probe_node, 1)).is_ok();
        collapsed && backend.extend_to(doc, Position::new(probe_node, 2)).is_ok()
    };

    // Multiple-range support is probed behaviorally: add two disjoint
    // ranges and see whether both survive.
    backend.remove_all_ranges()?;
    backend.add_range(doc, Position::new(probe_node, 0), Position::new(probe_node, 1))?;
    backend.add_range(doc, Position::new(probe_node, 2), Position::new(probe_node, 3))?;
    let supports_multiple_ranges = match refresh {
        RefreshStrategy::RangeList => backend.range_count()? == 2,
        _ => false,
    };

    backend.remove_all_ranges()?;
    doc.remove_node(probe_node);

    Ok(SelectionFeatures {
        refresh,
        has_extend,
        supports_multiple_ranges,
    })
}

/// A selection wrapper mirroring the backend's state into plain [`Range`]s.
pub struct Selection {
    backend: Box<dyn SelectionBackend>,
    features: SelectionFeatures,
    ranges: Vec<Range>,
    anchor: Option<Position>,
    focus: Option<Position>,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("features", &self.features)
            .field("ranges", &self.ranges)
            .field("anchor", &self.anchor)
            .field("focus", &self.focus)
            .finish_non_exhaustive()
    }
}

impl Selection {
    /// Probe the backend once and wrap it. The probe mutates the document
    /// briefly (a scratch node) and clears the backend's selection.
    pub fn new(doc: &mut Document, mut backend: Box<dyn SelectionBackend>) -> DomResult<Self> {
        let features = probe_selection_features(doc, backend.as_mut())?;
        Ok(Self {
            backend,
            features,
            ranges: Vec::new(),
            anchor: None,
            focus: None,
        })
    }

    pub fn features(&self) -> SelectionFeatures {
        self.features
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn anchor(&self) -> Option<Position> {
        self.anchor
    }

    pub fn focus(&self) -> Option<Position> {
        self.focus
    }

    pub fn is_collapsed(&self) -> bool {
        match self.ranges.as_slice() {
            [] => true,
            [single] => single.collapsed(),
            _ => false,
        }
    }

    /// Backward means the focus lies before the anchor in document order.
    pub fn is_backward(&self, doc: &Document) -> bool {
        match (self.anchor, self.focus) {
            (Some(anchor), Some(focus)) => {
                compare_points(doc, anchor, focus) == Ok(Ordering::Greater)
            }
            _ => false,
        }
    }

    /// A copy of the range at `index`. Mutating it does not affect the
    /// selection.
    pub fn get_range_at(&self, index: usize) -> DomResult<Range> {
        self.ranges.get(index).copied().ok_or(DomError::IndexSize {
            offset: index,
            capacity: self.ranges.len(),
        })
    }

    pub fn get_all_ranges(&self) -> Vec<Range> {
        self.ranges.clone()
    }

    /// Add a forward range.
    pub fn add_range(&mut self, doc: &Document, range: Range) -> DomResult<()> {
        self.add_range_with_direction(doc, range, false)
    }

    pub fn add_range_with_direction(
        &mut self,
        doc: &Document,
        range: Range,
        backward: bool,
    ) -> DomResult<()> {
        range.assert_valid(doc)?;
        if backward && self.features.has_extend {
            // Synthesize a backward selection: collapse at the end, then
            // extend back to the start.
            self.backend.collapse_at(doc, range.end())?;
            self.backend.extend_to(doc, range.start())?;
            return self.refresh(doc);
        }
        if !self.features.supports_multiple_ranges && !self.ranges.is_empty() {
            // Single-range fallback: replace instead of failing.
            self.remove_all_ranges()?;
        }
        self.backend.add_range(doc, range.start(), range.end())?;
        self.ranges.push(range);
        self.anchor = Some(range.start());
        self.focus = Some(range.end());
        Ok(())
    }

    pub fn set_single_range(
        &mut self,
        doc: &Document,
        range: Range,
        backward: bool,
    ) -> DomResult<()> {
        self.remove_all_ranges()?;
        self.add_range_with_direction(doc, range, backward)
    }

    pub fn set_ranges(&mut self, doc: &Document, ranges: &[Range]) -> DomResult<()> {
        self.remove_all_ranges()?;
        for range in ranges {
            self.add_range(doc, *range)?;
        }
        Ok(())
    }

    /// Remove one range, identified by boundary equality. The backend gets
    /// rebuilt from the survivors.
    pub fn remove_range(&mut self, doc: &Document, range: &Range) -> DomResult<()> {
        let index = self
            .ranges
            .iter()
            .position(|held| held == range)
            .ok_or_else(|| DomError::NotFound("range is not part of the selection".to_string()))?;
        self.ranges.remove(index);
        let rest = std::mem::take(&mut self.ranges);
        self.remove_all_ranges()?;
        for held in rest {
            self.add_range(doc, held)?;
        }
        Ok(())
    }

    pub fn remove_all_ranges(&mut self) -> DomResult<()> {
        self.backend.remove_all_ranges()?;
        self.ranges.clear();
        self.anchor = None;
        self.focus = None;
        Ok(())
    }

    /// Re-read the backend's state using the strategy fixed at init.
    pub fn refresh(&mut self, doc: &Document) -> DomResult<()> {
        self.ranges.clear();
        match self.features.refresh {
            RefreshStrategy::RangeList => {
                let count = self.backend.range_count()?;
                for index in 0..count {
                    let (start, end) = self.backend.range_at(index)?;
                    self.ranges.push(Range::from_boundaries(start, end));
                }
                self.anchor = self.backend.anchor().unwrap_or(None);
                self.focus = self.backend.focus().unwrap_or(None);
                if self.anchor.is_none() {
                    if let Some(last) = self.ranges.last() {
                        self.anchor = Some(last.start());
                        self.focus = Some(last.end());
                    }
                }
            }
            RefreshStrategy::AnchorFocus => {
                self.anchor = self.backend.anchor()?;
                self.focus = self.backend.focus()?;
                if let (Some(anchor), Some(focus)) = (self.anchor, self.focus) {
                    let (start, end) =
                        if compare_points(doc, anchor, focus)? == Ordering::Greater {
                            (focus, anchor)
                        } else {
                            (anchor, focus)
                        };
                    self.ranges.push(Range::from_boundaries(start, end));
                }
            }
            RefreshStrategy::SingleRange => {
                if let Some((start, end)) = self.backend.selected_range()? {
                    self.ranges.push(Range::from_boundaries(start, end));
                    self.anchor = Some(start);
                    self.focus = Some(end);
                } else {
                    self.anchor = None;
                    self.focus = None;
                }
            }
        }
        Ok(())
    }

    /// Refresh and report whether the selection actually changed.
    pub fn refresh_and_check_changed(&mut self, doc: &Document) -> DomResult<bool> {
        let old_ranges = self.ranges.clone();
        let old_anchor = self.anchor;
        self.refresh(doc)?;
        Ok(old_ranges != self.ranges || old_anchor != self.anchor)
    }

    pub fn collapse(&mut self, doc: &Document, node: NodeId, offset: usize) -> DomResult<()> {
        let at = Position::new(node, offset);
        let range = Range::collapsed_at(doc, at)?;
        self.backend.collapse_at(doc, at)?;
        self.ranges = vec![range];
        self.anchor = Some(at);
        self.focus = Some(at);
        Ok(())
    }

    pub fn collapse_to_start(&mut self, doc: &Document) -> DomResult<()> {
        let first = self
            .ranges
            .first()
            .copied()
            .ok_or(DomError::InvalidState("selection has no ranges"))?;
        self.collapse(doc, first.start_container(), first.start_offset())
    }

    pub fn collapse_to_end(&mut self, doc: &Document) -> DomResult<()> {
        let last = self
            .ranges
            .last()
            .copied()
            .ok_or(DomError::InvalidState("selection has no ranges"))?;
        self.collapse(doc, last.end_container(), last.end_offset())
    }

    pub fn select_all_children(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        let range = Range::selecting_node_contents(doc, node)?;
        self.set_single_range(doc, range, false)
    }

    /// Concatenated text of all selected ranges.
    pub fn to_text(&self, doc: &Document) -> DomResult<String> {
        let mut out = String::new();
        for range in &self.ranges {
            out.push_str(&range.to_text(doc)?);
        }
        Ok(out)
    }

    pub fn contains_node(
        &self,
        doc: &Document,
        node: NodeId,
        allow_partial: bool,
    ) -> DomResult<bool> {
        for range in &self.ranges {
            if range.contains_node(doc, node, allow_partial)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Faithful in-memory selection engine: multi-range, anchor/focus,
/// `extend`, the works.
#[derive(Default)]
pub struct ReferenceSelectionBackend {
    ranges: Vec<(Position, Position)>,
    anchor: Option<Position>,
    focus: Option<Position>,
}

impl ReferenceSelectionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionBackend for ReferenceSelectionBackend {
    fn range_count(&self) -> DomResult<usize> {
        Ok(self.ranges.len())
    }

    fn range_at(&self, index: usize) -> DomResult<(Position, Position)> {
        self.ranges.get(index).copied().ok_or(DomError::IndexSize {
            offset: index,
            capacity: self.ranges.len(),
        })
    }

    fn anchor(&self) -> DomResult<Option<Position>> {
        Ok(self.anchor)
    }

    fn focus(&self) -> DomResult<Option<Position>> {
        Ok(self.focus)
    }

    fn selected_range(&self) -> DomResult<Option<(Position, Position)>> {
        Ok(self.ranges.last().copied())
    }

    fn add_range(&mut self, _doc: &Document, start: Position, end: Position) -> DomResult<()> {
        self.ranges.push((start, end));
        self.anchor = Some(start);
        self.focus = Some(end);
        Ok(())
    }

    fn remove_all_ranges(&mut self) -> DomResult<()> {
        self.ranges.clear();
        self.anchor = None;
        self.focus = None;
        Ok(())
    }

    fn collapse_at(&mut self, _doc: &Document, at: Position) -> DomResult<()> {
        self.ranges = vec![(at, at)];
        self.anchor = Some(at);
        self.focus = Some(at);
        Ok(())
    }

    fn extend_to(&mut self, doc: &Document, to: Position) -> DomResult<()> {
        let anchor = self
            .anchor
            .ok_or(DomError::InvalidState("nothing to extend"))?;
        self.focus = Some(to);
        let (start, end) = if compare_points(doc, anchor, to)? == Ordering::Greater {
            (to, anchor)
        } else {
            (anchor, to)
        };
        match self.ranges.last_mut() {
            Some(last) => *last = (start, end),
            None => self.ranges.push((start, end)),
        }
        Ok(())
    }
}
