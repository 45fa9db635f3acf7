use serde::Serialize;

use crate::context::DeviceType;
use crate::error::FallbackReason;

/// AuthoritativeSource names the backing store trusted to answer flag reads for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthoritativeSource {
    RemoteProvider,
    LocalStore,
}

/// Notifications the coordinator emits on state transitions. Subscribe with
/// [crate::FlagCoordinator::subscribe].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum CoordinatorEvent {
    /// Initialization decided which source serves reads. `reason` is set when the local store was
    /// chosen.
    #[serde(rename_all = "camelCase")]
    SourceResolved {
        source: AuthoritativeSource,
        reason: Option<FallbackReason>,
    },
    /// The in-memory snapshot was replaced from the flag store.
    #[serde(rename_all = "camelCase")]
    SnapshotLoaded { tenant_id: String, flags: usize },
    /// A bulk load failed; the previous snapshot is still in place.
    #[serde(rename_all = "camelCase")]
    SnapshotLoadFailed { tenant_id: String },
    /// A seed pass finished. `failed` counts records the store refused.
    #[serde(rename_all = "camelCase")]
    SeedCompleted {
        tenant_id: String,
        written: usize,
        failed: usize,
    },
    /// The seed policy found an earlier seed for the tenant and did nothing.
    #[serde(rename_all = "camelCase")]
    SeedSkipped { tenant_id: String },
    /// The remote provider could not enumerate its flags, so nothing was seeded.
    #[serde(rename_all = "camelCase")]
    SeedFailed { tenant_id: String },
    #[serde(rename_all = "camelCase")]
    ContextUpdated {
        tenant_id: String,
        device_type: DeviceType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn events_serialize_for_diagnostics() {
        let resolved = CoordinatorEvent::SourceResolved {
            source: AuthoritativeSource::LocalStore,
            reason: Some(FallbackReason::ConnectTimeout),
        };
        assert_json_eq!(
            serde_json::to_value(&resolved).unwrap(),
            json!({"kind": "SourceResolved", "source": "localStore", "reason": "CONNECT_TIMEOUT"})
        );

        let seeded = CoordinatorEvent::SeedCompleted {
            tenant_id: "store-1".into(),
            written: 4,
            failed: 0,
        };
        assert_json_eq!(
            serde_json::to_value(&seeded).unwrap(),
            json!({"kind": "SeedCompleted", "tenantId": "store-1", "written": 4, "failed": 0})
        );
    }
}
