use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flag::FlagKey;
use crate::flag_value::{FlagValue, ValueType};

/// Where a persisted flag value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Copied from the remote provider during a seed pass.
    Remote,
    /// Written from a compiled-in default.
    Default,
}

/// FlagRecord is the unit persisted in a [crate::FlagStore].
///
/// A store holds at most one record per `(key, tenant_id)` pair; writes are upserts keyed on
/// [FlagRecord::document_id].
///
/// Deserialization decodes `value` according to `valueType`, so a whole number stored under a
/// `float` tag loads as [FlagValue::Float]. A value that does not fit its tag is a decode error.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", try_from = "StoredFlagRecord")]
pub struct FlagRecord {
    pub key: FlagKey,
    pub value: FlagValue,
    pub value_type: ValueType,
    pub updated_at: DateTime<Utc>,
    pub provenance: Provenance,
    pub tenant_id: String,
}

// A FlagRecord as it sits in the store, before its value is decoded against the tag.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFlagRecord {
    key: FlagKey,
    value: serde_json::Value,
    value_type: ValueType,
    updated_at: DateTime<Utc>,
    provenance: Provenance,
    tenant_id: String,
}

impl TryFrom<StoredFlagRecord> for FlagRecord {
    type Error = String;

    fn try_from(stored: StoredFlagRecord) -> Result<Self, Self::Error> {
        let value = FlagValue::from_tagged(stored.value_type, &stored.value).ok_or_else(|| {
            format!(
                "value {} of flag {} is not a {}",
                stored.value, stored.key, stored.value_type
            )
        })?;
        Ok(FlagRecord {
            key: stored.key,
            value,
            value_type: stored.value_type,
            updated_at: stored.updated_at,
            provenance: stored.provenance,
            tenant_id: stored.tenant_id,
        })
    }
}

impl FlagRecord {
    pub fn new(
        key: FlagKey,
        value: FlagValue,
        provenance: Provenance,
        tenant_id: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        FlagRecord {
            key,
            value_type: value.value_type(),
            value,
            updated_at,
            provenance,
            tenant_id: tenant_id.into(),
        }
    }

    /// Shorthand for a record seeded from the remote provider, stamped with the current time.
    pub fn remote(key: FlagKey, value: FlagValue, tenant_id: impl Into<String>) -> Self {
        Self::new(key, value, Provenance::Remote, tenant_id, Utc::now())
    }

    /// The identity a store upserts on.
    pub fn document_id(&self) -> String {
        format!("{}:{}", self.tenant_id, self.key)
    }

    /// Whether the persisted type tag agrees with the stored value.
    pub fn is_consistent(&self) -> bool {
        self.value.value_type() == self.value_type
    }
}
