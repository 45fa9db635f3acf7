use async_trait::async_trait;

use crate::record::FlagRecord;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("flag store is unavailable: {0}")]
    Unavailable(String),

    #[error("failed to write flag document {document_id}: {message}")]
    Write {
        document_id: String,
        message: String,
    },

    #[error("failed to decode flag document: {0}")]
    Decode(#[from] serde_json::Error),
}

/// FlagStore is an interface for the locally cached, sync-capable document store that holds
/// [FlagRecord]s between sessions.
///
/// Implementations wrap an embedded database SDK; the coordinator treats them as thread-safe and
/// performs no locking around calls.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Insert or replace the record identified by `(record.key, record.tenant_id)`.
    async fn upsert_flag(&self, record: &FlagRecord) -> Result<(), StoreError>;

    /// Return every record stored for `tenant_id`. The result is fully materialized.
    async fn query_flags(&self, tenant_id: &str) -> Result<Vec<FlagRecord>, StoreError>;
}
