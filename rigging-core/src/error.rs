use thiserror::Error;

use crate::record::RecordId;

/// Everything a lifecycle-mutating operation can fail with.
///
/// Configuration errors (`MissingChildView`, `InvalidChildView`) and
/// identity errors (`DuplicateChild`) indicate caller bugs and are never
/// recovered from internally; absent-child removals are no-ops rather
/// than errors and so have no variant here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("the view is already destroyed")]
    AlreadyDestroyed,

    #[error("no child view is configured for record {0:?}")]
    MissingChildView(RecordId),

    #[error("the child view built for record {0:?} is not usable")]
    InvalidChildView(RecordId),

    #[error("a live child view already exists for record {0:?}")]
    DuplicateChild(RecordId),

    #[error("no template is registered under {0:?}")]
    TemplateNotFound(String),

    #[error("the region was given no target element")]
    NoElement,
}
