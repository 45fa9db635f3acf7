use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind assigned to every context this crate builds: flags are targeted per store location.
pub const LOCATION_KIND: &str = "location";

/// Classification of the device the point-of-sale app runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Phone,
    Tablet,
    Desktop,
    #[default]
    Unknown,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Phone => "phone",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
            DeviceType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// EvaluationContext describes who flags are evaluated for: one tenant (store location) on one
/// class of device.
///
/// Use [ContextBuilder] to construct one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    kind: String,
    key: String,
    device_type: DeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl EvaluationContext {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The tenant (store) identifier this context targets.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Contains methods for building an [EvaluationContext] for a tenant.
///
/// If you do not change any values, the context's kind is [LOCATION_KIND], its key is whatever
/// was passed to [ContextBuilder::new], and its device type is [DeviceType::Unknown].
pub struct ContextBuilder {
    key: String,
    device_type: DeviceType,
    name: Option<String>,
}

impl ContextBuilder {
    /// Create a new context builder keyed on the provided tenant identifier.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            key: tenant_id.into(),
            device_type: DeviceType::Unknown,
            name: None,
        }
    }

    /// Sets the tenant identifier. It cannot be empty.
    pub fn key(&mut self, tenant_id: impl Into<String>) -> &mut Self {
        self.key = tenant_id.into();
        self
    }

    pub fn device_type(&mut self, device_type: DeviceType) -> &mut Self {
        self.device_type = device_type;
        self
    }

    /// Sets a human readable name for the location, shown in the remote provider's dashboard.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Creates a context from the current builder's properties.
    ///
    /// The context is immutable and will not be affected by any subsequent actions on the builder.
    /// An error is returned if the key is empty or only whitespace.
    pub fn build(&self) -> Result<EvaluationContext, String> {
        if self.key.trim().is_empty() {
            return Err("context key must not be empty".to_owned());
        }

        Ok(EvaluationContext {
            kind: LOCATION_KIND.to_owned(),
            key: self.key.clone(),
            device_type: self.device_type,
            name: self.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;
    use spectral::prelude::*;

    #[test]
    fn builder_defaults() {
        let context = ContextBuilder::new("store-1").build().unwrap();
        assert_that!(context.kind()).is_equal_to(LOCATION_KIND);
        assert_that!(context.key()).is_equal_to("store-1");
        assert_that!(context.device_type()).is_equal_to(DeviceType::Unknown);
        assert_that!(context.name()).is_none();
    }

    #[test]
    fn builder_rejects_blank_key() {
        assert_that!(ContextBuilder::new("").build()).is_err();
        assert_that!(ContextBuilder::new("   ").build()).is_err();
    }

    #[test]
    fn builder_is_reusable() {
        let mut builder = ContextBuilder::new("store-1");
        let first = builder.device_type(DeviceType::Tablet).build().unwrap();
        let second = builder.key("store-2").build().unwrap();

        assert_that!(first.key()).is_equal_to("store-1");
        assert_that!(second.key()).is_equal_to("store-2");
        assert_that!(second.device_type()).is_equal_to(DeviceType::Tablet);
    }

    #[test]
    fn serializes_for_the_provider() {
        let context = ContextBuilder::new("store-9")
            .device_type(DeviceType::Phone)
            .name("Main St")
            .build()
            .unwrap();

        assert_json_eq!(
            serde_json::to_value(&context).unwrap(),
            json!({"kind": "location", "key": "store-9", "deviceType": "phone", "name": "Main St"})
        );
    }
}
