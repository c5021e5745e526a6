use thiserror::Error;

/// Failure kinds raised by range and selection operations.
///
/// The first six mirror the W3C DOM exception vocabulary because callers
/// ported from a DOM environment expect exactly this taxonomy. `InvalidRange`
/// is different in nature: it is self-detected staleness (the range's cached
/// boundaries no longer satisfy the structural invariants, usually after an
/// unrelated tree mutation), not a bad parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("offset {offset} is out of bounds (node capacity {capacity})")]
    IndexSize { offset: usize, capacity: usize },

    #[error("operation would violate the document hierarchy: {0}")]
    HierarchyRequest(&'static str),

    #[error("boundary points belong to different documents or roots")]
    WrongDocument,

    #[error("cannot modify content inside a read-only subtree")]
    NoModificationAllowed,

    #[error("node type is not allowed here: {0}")]
    InvalidNodeType(&'static str),

    #[error("operation precondition not met: {0}")]
    InvalidState(&'static str),

    #[error("range is no longer valid: {0}")]
    InvalidRange(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported environment: {0}")]
    Unsupported(String),
}

pub type DomResult<T> = Result<T, DomError>;
