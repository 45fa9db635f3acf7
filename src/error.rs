use serde::Serialize;

use crate::store::StoreError;

/// FallbackReason records why the coordinator degraded to a lower tier or to a default.
///
/// None of these ever surface from a read; they appear in logs and in
/// [crate::CoordinatorEvent]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    /// No remote credential was configured.
    MissingCredential,
    /// The local source was forced by configuration.
    ForcedLocal,
    /// The remote provider did not deliver flags within the connect bound.
    ConnectTimeout,
    /// Writing a seeded record to the flag store failed.
    SeedWriteFailure,
    /// Reading records from the flag store failed.
    StoreReadFailure,
    /// A value was found but of a different case than the caller asked for.
    TypeMismatch,
}

#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    #[error("the local store is not the authoritative source")]
    NotLocal,

    #[error("the coordinator worker is not running")]
    WorkerGone,

    #[error("flag store error: {0}")]
    Store(#[from] StoreError),
}
