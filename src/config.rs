use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

use crate::context::{ContextBuilder, DeviceType, EvaluationContext};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// When the coordinator copies remote flags into the flag store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeedPolicy {
    /// Seed after every successful connect.
    #[default]
    EveryConnect,
    /// Seed only if the store holds no remote-provenance record for the tenant yet.
    FirstConnectPerTenant,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    /// Remote provider credential (mobile key). Blank is treated as absent.
    #[serde(default)]
    pub credential: Option<String>,

    /// Skip the remote provider entirely and serve from the flag store.
    #[serde(default)]
    pub force_local_source: bool,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "connectTimeoutSecs", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    #[serde(default)]
    pub seed_policy: SeedPolicy,

    pub tenant_id: String,

    #[serde(default)]
    pub device_type: DeviceType,

    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_command_queue_capacity() -> usize {
    DEFAULT_COMMAND_QUEUE_CAPACITY
}

impl CoordinatorConfig {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        CoordinatorConfig {
            credential: None,
            force_local_source: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            seed_policy: SeedPolicy::default(),
            tenant_id: tenant_id.into(),
            device_type: DeviceType::default(),
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed_policy = policy;
        self
    }

    pub fn with_force_local_source(mut self, force: bool) -> Self {
        self.force_local_source = force;
        self
    }

    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Parses YAML (and therefore JSON) config text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: CoordinatorConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// The credential, unless it is missing or blank.
    pub fn effective_credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "commandQueueCapacity must be at least 1".into(),
            ));
        }
        self.initial_context().map(|_| ())
    }

    pub(crate) fn initial_context(&self) -> Result<EvaluationContext, ConfigError> {
        ContextBuilder::new(self.tenant_id.clone())
            .device_type(self.device_type)
            .build()
            .map_err(ConfigError::Invalid)
    }
}
