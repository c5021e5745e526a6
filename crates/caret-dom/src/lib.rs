//! In-memory document tree with range and selection normalization.
//!
//! The `dom` arena holds the tree; `position` and `range` give boundary
//! points and ranges over it with consistent semantics regardless of which
//! backend ultimately renders the tree. `wrapped` and `selection` adapt
//! quirky host engines behind capability probes, `save_restore` persists
//! boundaries across mutation with marker elements, and `registry` wires
//! the optional units together.

pub mod dom;
pub mod error;
pub mod iterator;
pub mod position;
pub mod range;
pub mod registry;
pub mod save_restore;
pub mod selection;
pub mod wrapped;

// Re-export key types for easier usage
pub use dom::{Document, NodeId, NodeKind};
pub use error::{DomError, DomResult};
pub use iterator::{NodeIterator, RangeIterator};
pub use position::{compare_points, Position};
pub use range::{Bookmark, BoundaryComparison, NodeRangeComparison, Range};
pub use registry::Registry;
pub use save_restore::{SavedRange, SavedSelection};
pub use selection::{
    RefreshStrategy, Selection, SelectionBackend, SelectionFeatures,
};
pub use wrapped::{
    RangeBackend, RangeBackendFactory, RangeFeatures, WrappedRange,
};
