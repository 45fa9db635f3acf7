use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::EvaluationContext;
use crate::flag::FlagKey;
use crate::flag_value::FlagValue;

/// The two observable results of a bounded connect attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The provider connected and holds a fresh set of flag values.
    Connected,
    /// No fresh flags arrived within the bound.
    TimedOut,
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("remote provider request failed: {0}")]
    Request(String),
}

/// RemoteProvider is an interface over a feature flag evaluation SDK.
///
/// Evaluation is synchronous against the SDK's live cache and must never fail: on any internal
/// error the implementation returns the default it was given.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Connect with `credential`, waiting at most `timeout` for the first set of flags.
    async fn connect(
        &self,
        credential: &str,
        context: &EvaluationContext,
        timeout: Duration,
    ) -> ConnectOutcome;

    /// Evaluate `key`, expecting a value of the same case as `default`.
    fn evaluate(&self, key: &FlagKey, default: FlagValue) -> FlagValue;

    /// Every flag known for `context`, as raw JSON values. Used only for seeding.
    async fn enumerate_all(
        &self,
        context: &EvaluationContext,
    ) -> Result<HashMap<FlagKey, serde_json::Value>, ProviderError>;

    /// Switch the evaluation context.
    async fn reidentify(&self, context: &EvaluationContext);

    /// Send any buffered analytics events.
    fn flush(&self);
}
