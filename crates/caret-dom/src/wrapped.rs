//! Backend abstraction for host-provided range implementations.
//!
//! A [`RangeBackend`] is a range engine the library does not control and
//! does not trust: historical implementations disagreed on boundary-setter
//! tolerance and on two of the boundary-comparison constants. Instead of
//! special-casing callers, the backend is probed ONCE against a scratch text
//! node, the findings are recorded in [`RangeFeatures`], and
//! [`WrappedRange`] applies the matching compensation on every call. Probes
//! never run per-operation.
//!
//! The crate ships [`ReferenceRangeBackend`], a faithful implementation over
//! the arena tree, which takes the unpatched path through every probe.

use std::cmp::Ordering;

use crate::dom::{Document, NodeId};
use crate::error::{DomError, DomResult};
use crate::position::{compare_points, Position};
use crate::range::{BoundaryComparison, Range};

/// The contract a host range engine exposes. Boundary positions use the same
/// conventions as [`Range`].
pub trait RangeBackend {
    fn start(&self) -> Position;
    fn end(&self) -> Position;

    /// May fail on engines that refuse a start after the current end.
    fn set_start(&mut self, doc: &Document, at: Position) -> DomResult<()>;
    /// May fail on engines that refuse an end before the current start.
    fn set_end(&mut self, doc: &Document, at: Position) -> DomResult<()>;

    /// Compare one of this range's boundaries against one of `other`'s.
    /// Engines with the inversion bug mix up `StartToEnd` and `EndToStart`.
    fn compare_boundary_points(
        &self,
        doc: &Document,
        how: BoundaryComparison,
        other: &dyn RangeBackend,
    ) -> DomResult<Ordering>;
}

/// Creates fresh backend ranges; used by the probes and by selection code
/// that needs scratch ranges.
pub trait RangeBackendFactory {
    fn create_range(&self, doc: &Document) -> Box<dyn RangeBackend>;
}

/// What the one-time probes found out about a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RangeFeatures {
    /// Setters tolerate a new start after the current end (and vice versa).
    /// When false, every setter call gets the set-opposite-boundary-first
    /// retry treatment.
    pub tolerant_boundary_setters: bool,
    /// The backend swaps the meaning of `StartToEnd` and `EndToStart`.
    pub inverted_comparison_constants: bool,
}

/// Run the feature probes against a scratch text node. The node is inserted
/// under the document root for the duration of the probe and removed again.
pub fn probe_range_features(
    doc: &mut Document,
    factory: &dyn RangeBackendFactory,
) -> DomResult<RangeFeatures> {
    let test_node = doc.create_text("test");
    doc.append_child(doc.root(), test_node)?;

    let result = run_range_probes(doc, factory, test_node);
    doc.remove_node(test_node);
    result
}

fn run_range_probes(
    doc: &Document,
    factory: &dyn RangeBackendFactory,
    test_node: NodeId,
) -> DomResult<RangeFeatures> {
    // Setter tolerance: collapse at offset 0, then move the start past the
    // end. End is set first so even an intolerant backend reaches the
    // collapsed state.
    let mut range = factory.create_range(doc);
    range.set_end(doc, Position::new(test_node, 0))?;
    range.set_start(doc, Position::new(test_node, 0))?;
    let tolerant_boundary_setters = range.set_start(doc, Position::new(test_node, 1)).is_ok();

    // Comparison constants: with a at [0,3) and b at [2,4), a.end vs b.start
    // must be Greater and a.start vs b.end Less. An engine that reports the
    // opposite pair has the constants swapped.
    let mut a = factory.create_range(doc);
    a.set_end(doc, Position::new(test_node, 3))?;
    a.set_start(doc, Position::new(test_node, 0))?;
    let mut b = factory.create_range(doc);
    b.set_end(doc, Position::new(test_node, 4))?;
    b.set_start(doc, Position::new(test_node, 2))?;

    let start_to_end = a.compare_boundary_points(doc, BoundaryComparison::StartToEnd, b.as_ref())?;
    let end_to_start = a.compare_boundary_points(doc, BoundaryComparison::EndToStart, b.as_ref())?;
    let inverted_comparison_constants =
        start_to_end == Ordering::Less && end_to_start == Ordering::Greater;

    Ok(RangeFeatures {
        tolerant_boundary_setters,
        inverted_comparison_constants,
    })
}

/// A backend range plus the compensation the probes decided it needs.
pub struct WrappedRange {
    backend: Box<dyn RangeBackend>,
    features: RangeFeatures,
}

impl WrappedRange {
    pub fn new(backend: Box<dyn RangeBackend>, features: RangeFeatures) -> Self {
        Self { backend, features }
    }

    pub fn features(&self) -> RangeFeatures {
        self.features
    }

    pub fn start(&self) -> Position {
        self.backend.start()
    }

    pub fn end(&self) -> Position {
        self.backend.end()
    }

    pub fn collapsed(&self) -> bool {
        self.backend.start() == self.backend.end()
    }

    /// The backend's boundaries as a pure [`Range`].
    pub fn to_range(&self) -> Range {
        Range::from_boundaries(self.backend.start(), self.backend.end())
    }

    /// Aim the backend at `range`'s boundaries. End first, so intolerant
    /// setters never see a transiently inverted pair.
    pub fn set_from_range(&mut self, doc: &Document, range: &Range) -> DomResult<()> {
        self.set_end(doc, range.end())?;
        self.set_start(doc, range.start())
    }

    pub fn set_start(&mut self, doc: &Document, at: Position) -> DomResult<()> {
        if self.features.tolerant_boundary_setters {
            self.backend.set_start(doc, at)
        } else if self.backend.set_start(doc, at).is_err() {
            // Collapse to the new point first, then retry.
            self.backend.set_end(doc, at)?;
            self.backend.set_start(doc, at)
        } else {
            Ok(())
        }
    }

    pub fn set_end(&mut self, doc: &Document, at: Position) -> DomResult<()> {
        if self.features.tolerant_boundary_setters {
            self.backend.set_end(doc, at)
        } else if self.backend.set_end(doc, at).is_err() {
            self.backend.set_start(doc, at)?;
            self.backend.set_end(doc, at)
        } else {
            Ok(())
        }
    }

    pub fn set_start_before(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_start(doc, position_before(doc, node)?)
    }

    pub fn set_start_after(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_start(doc, position_after(doc, node)?)
    }

    pub fn set_end_before(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_end(doc, position_before(doc, node)?)
    }

    pub fn set_end_after(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_end(doc, position_after(doc, node)?)
    }

    pub fn select_node_contents(&mut self, doc: &Document, node: NodeId) -> DomResult<()> {
        self.set_end(doc, Position::new(node, doc.node_length(node)))?;
        self.set_start(doc, Position::new(node, 0))
    }

    pub fn collapse(&mut self, doc: &Document, to_start: bool) -> DomResult<()> {
        if to_start {
            self.set_end(doc, self.backend.start())
        } else {
            self.set_start(doc, self.backend.end())
        }
    }

    pub fn compare_boundary_points(
        &self,
        doc: &Document,
        how: BoundaryComparison,
        other: &WrappedRange,
    ) -> DomResult<Ordering> {
        let how = if self.features.inverted_comparison_constants {
            match how {
                BoundaryComparison::StartToEnd => BoundaryComparison::EndToStart,
                BoundaryComparison::EndToStart => BoundaryComparison::StartToEnd,
                other => other,
            }
        } else {
            how
        };
        self.backend
            .compare_boundary_points(doc, how, other.backend.as_ref())
    }
}

fn position_before(doc: &Document, node: NodeId) -> DomResult<Position> {
    let parent = doc
        .parent(node)
        .ok_or(DomError::HierarchyRequest("node has no parent"))?;
    let index = doc
        .node_index(node)
        .ok_or(DomError::HierarchyRequest("node has no parent"))?;
    Ok(Position::new(parent, index))
}

fn position_after(doc: &Document, node: NodeId) -> DomResult<Position> {
    let before = position_before(doc, node)?;
    Ok(Position::new(before.node, before.offset + 1))
}

/// Contract-faithful backend over the arena tree. Setters collapse the
/// opposite boundary on crossing instead of failing, and the comparison
/// constants mean what their names say.
#[derive(Clone, Debug)]
pub struct ReferenceRangeBackend {
    start: Position,
    end: Position,
}

impl ReferenceRangeBackend {
    pub fn new(doc: &Document) -> Self {
        let at = Position::new(doc.root(), 0);
        Self { start: at, end: at }
    }
}

impl RangeBackend for ReferenceRangeBackend {
    fn start(&self) -> Position {
        self.start
    }

    fn end(&self) -> Position {
        self.end
    }

    fn set_start(&mut self, doc: &Document, at: Position) -> DomResult<()> {
        if !at.is_valid(doc) {
            return Err(DomError::IndexSize {
                offset: at.offset,
                capacity: doc.node_length(at.node),
            });
        }
        if doc.root_container(at.node) != doc.root_container(self.end.node)
            || compare_points(doc, at, self.end)? == Ordering::Greater
        {
            self.end = at;
        }
        self.start = at;
        Ok(())
    }

    fn set_end(&mut self, doc: &Document, at: Position) -> DomResult<()> {
        if !at.is_valid(doc) {
            return Err(DomError::IndexSize {
                offset: at.offset,
                capacity: doc.node_length(at.node),
            });
        }
        if doc.root_container(at.node) != doc.root_container(self.start.node)
            || compare_points(doc, at, self.start)? == Ordering::Less
        {
            self.start = at;
        }
        self.end = at;
        Ok(())
    }

    fn compare_boundary_points(
        &self,
        doc: &Document,
        how: BoundaryComparison,
        other: &dyn RangeBackend,
    ) -> DomResult<Ordering> {
        let (a, b) = match how {
            BoundaryComparison::StartToStart => (self.start, other.start()),
            BoundaryComparison::StartToEnd => (self.end, other.start()),
            BoundaryComparison::EndToEnd => (self.end, other.end()),
            BoundaryComparison::EndToStart => (self.start, other.end()),
        };
        compare_points(doc, a, b)
    }
}

/// Factory for the reference backend.
pub struct ReferenceRangeFactory;

impl RangeBackendFactory for ReferenceRangeFactory {
    fn create_range(&self, doc: &Document) -> Box<dyn RangeBackend> {
        Box::new(ReferenceRangeBackend::new(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Refuses boundary crossings, like the engines the retry patch was
    /// written for.
    #[derive(Clone, Debug)]
    struct StrictOrderBackend {
        inner: ReferenceRangeBackend,
    }

    impl RangeBackend for StrictOrderBackend {
        fn start(&self) -> Position {
            self.inner.start()
        }

        fn end(&self) -> Position {
            self.inner.end()
        }

        fn set_start(&mut self, doc: &Document, at: Position) -> DomResult<()> {
            if at.is_valid(doc)
                && doc.root_container(at.node) == doc.root_container(self.inner.end.node)
                && compare_points(doc, at, self.inner.end)? == Ordering::Greater
            {
                return Err(DomError::InvalidState("start would pass end"));
            }
            self.inner.set_start(doc, at)
        }

        fn set_end(&mut self, doc: &Document, at: Position) -> DomResult<()> {
            if at.is_valid(doc)
                && doc.root_container(at.node) == doc.root_container(self.inner.start.node)
                && compare_points(doc, at, self.inner.start)? == Ordering::Less
            {
                return Err(DomError::InvalidState("end would pass start"));
            }
            self.inner.set_end(doc, at)
        }

        fn compare_boundary_points(
            &self,
            doc: &Document,
            how: BoundaryComparison,
            other: &dyn RangeBackend,
        ) -> DomResult<Ordering> {
            self.inner.compare_boundary_points(doc, how, other)
        }
    }

    struct StrictOrderFactory;

    impl RangeBackendFactory for StrictOrderFactory {
        fn create_range(&self, doc: &Document) -> Box<dyn RangeBackend> {
            Box::new(StrictOrderBackend {
                inner: ReferenceRangeBackend::new(doc),
            })
        }
    }

    /// Swaps StartToEnd and EndToStart, like the comparison-constant bug.
    struct InvertedComparisonBackend {
        inner: ReferenceRangeBackend,
    }

    impl RangeBackend for InvertedComparisonBackend {
        fn start(&self) -> Position {
            self.inner.start()
        }

        fn end(&self) -> Position {
            self.inner.end()
        }

        fn set_start(&mut self, doc: &Document, at: Position) -> DomResult<()> {
            self.inner.set_start(doc, at)
        }

        fn set_end(&mut self, doc: &Document, at: Position) -> DomResult<()> {
            self.inner.set_end(doc, at)
        }

        fn compare_boundary_points(
            &self,
            doc: &Document,
            how: BoundaryComparison,
            other: &dyn RangeBackend,
        ) -> DomResult<Ordering> {
            let how = match how {
                BoundaryComparison::StartToEnd => BoundaryComparison::EndToStart,
                BoundaryComparison::EndToStart => BoundaryComparison::StartToEnd,
                other => other,
            };
            self.inner.compare_boundary_points(doc, how, other)
        }
    }

    struct InvertedComparisonFactory;

    impl RangeBackendFactory for InvertedComparisonFactory {
        fn create_range(&self, doc: &Document) -> Box<dyn RangeBackend> {
            Box::new(InvertedComparisonBackend {
                inner: ReferenceRangeBackend::new(doc),
            })
        }
    }

    #[test]
    fn reference_backend_probes_clean() {
        let mut doc = Document::new();
        let features = probe_range_features(&mut doc, &ReferenceRangeFactory).unwrap();
        assert_eq!(
            features,
            RangeFeatures {
                tolerant_boundary_setters: true,
                inverted_comparison_constants: false,
            }
        );
        // The scratch node is cleaned up.
        assert_eq!(doc.children(doc.root()), &[]);
    }

    #[test]
    fn strict_setter_backend_is_detected_and_patched() {
        let mut doc = Document::new();
        let text = doc.create_text("hello");
        doc.append_child(doc.root(), text).unwrap();

        let features = probe_range_features(&mut doc, &StrictOrderFactory).unwrap();
        assert!(!features.tolerant_boundary_setters);

        let mut wrapped = WrappedRange::new(StrictOrderFactory.create_range(&doc), features);
        wrapped.set_start(&doc, Position::new(text, 0)).unwrap();
        wrapped.set_end(&doc, Position::new(text, 0)).unwrap();
        // Raw backend refuses this; the wrapper retries via the opposite
        // boundary.
        wrapped.set_start(&doc, Position::new(text, 3)).unwrap();
        assert_eq!(wrapped.start(), Position::new(text, 3));
        assert!(wrapped.collapsed());
    }

    #[test]
    fn inverted_comparison_backend_is_detected_and_patched() {
        let mut doc = Document::new();
        let text = doc.create_text("hello");
        doc.append_child(doc.root(), text).unwrap();

        let features = probe_range_features(&mut doc, &InvertedComparisonFactory).unwrap();
        assert!(features.inverted_comparison_constants);

        let make = |from: usize, to: usize| {
            let mut backend = InvertedComparisonFactory.create_range(&doc);
            backend.set_end(&doc, Position::new(text, to)).unwrap();
            backend.set_start(&doc, Position::new(text, from)).unwrap();
            WrappedRange::new(backend, features)
        };
        let a = make(0, 3);
        let b = make(2, 4);
        // Through the wrapper the answers come out the right way round.
        assert_eq!(
            a.compare_boundary_points(&doc, BoundaryComparison::StartToEnd, &b)
                .unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            a.compare_boundary_points(&doc, BoundaryComparison::EndToStart, &b)
                .unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn wrapped_range_converts_to_pure_range() {
        let mut doc = Document::new();
        let text = doc.create_text("hello");
        doc.append_child(doc.root(), text).unwrap();
        let features = probe_range_features(&mut doc, &ReferenceRangeFactory).unwrap();

        let mut wrapped = WrappedRange::new(ReferenceRangeFactory.create_range(&doc), features);
        wrapped.select_node_contents(&doc, text).unwrap();
        let range = wrapped.to_range();
        assert_eq!(range.to_text(&doc).unwrap(), "hello");
    }
}
