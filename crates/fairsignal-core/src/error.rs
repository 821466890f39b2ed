//! Core error type for the FairSignal engine.
//!
//! `CoreError` is used throughout the core domain (run engine, stores,
//! remote executor). Provider/network failures inside the text client are
//! *not* represented here — the client degrades instead of failing (see
//! `client`); only caller mistakes (`NotFound`, `BadRequest`) and storage
//! faults surface as hard errors.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl CoreError {
    /// Whether this error is a missing-resource lookup (distinct from a
    /// failed run, which is a regular `RunStatus::Failed` outcome).
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
}
