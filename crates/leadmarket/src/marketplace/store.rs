use thiserror::Error;

/// Error surface shared by the marketplace storage traits.
///
/// `VersionConflict` is only produced by stores that guard writes with an
/// optimistic version check (currently the wallet store); the remaining
/// variants are common to every repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("concurrent write detected: expected version {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True for failures worth retrying after a short backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict { .. } | StoreError::Unavailable(_)
        )
    }
}
