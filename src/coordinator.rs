use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::config::{ConfigError, CoordinatorConfig, SeedPolicy};
use crate::context::{ContextBuilder, DeviceType, EvaluationContext};
use crate::defaults::default_bool;
use crate::error::{CoordinatorError, FallbackReason};
use crate::events::{AuthoritativeSource, CoordinatorEvent};
use crate::flag::FlagKey;
use crate::flag_value::FlagValue;
use crate::provider::{ConnectOutcome, RemoteProvider};
use crate::record::{FlagRecord, Provenance};
use crate::store::{FlagStore, StoreError};

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug)]
enum Command {
    UpdateContext {
        tenant_id: String,
        device_type: DeviceType,
    },
    // Re-run the bulk load from the flag store. The worker replies with the number of flags loaded.
    Reload(oneshot::Sender<Result<usize, CoordinatorError>>),
    Shutdown,
}

struct State {
    source: Option<AuthoritativeSource>,
    snapshot: HashMap<FlagKey, FlagValue>,
    context: EvaluationContext,
}

struct Inner {
    config: CoordinatorConfig,
    store: Arc<dyn FlagStore>,
    provider: Arc<dyn RemoteProvider>,
    // Written only by the worker task. Readers take the read lock and never await while holding it.
    state: RwLock<State>,
    connected: watch::Sender<bool>,
    events: broadcast::Sender<CoordinatorEvent>,
    pending_commands: Mutex<Option<mpsc::Receiver<Command>>>,
}

/// FlagCoordinator answers feature flag reads from whichever source is authoritative for the
/// session: the remote provider when it connects in time, or the locally cached flag store
/// otherwise. When the remote provider connects, its flags are copied into the store so they
/// survive a later outage.
///
/// The coordinator is a cheaply cloneable handle. Construct one at the application's composition
/// root and pass it to whatever needs flag reads.
#[derive(Clone)]
pub struct FlagCoordinator {
    inner: Arc<Inner>,
    commands: mpsc::Sender<Command>,
}

impl FlagCoordinator {
    /// Build a coordinator. No I/O happens until [FlagCoordinator::start] is called, so callers
    /// can [subscribe](FlagCoordinator::subscribe) first.
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn FlagStore>,
        provider: Arc<dyn RemoteProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let context = config.initial_context()?;

        let (tx, rx) = mpsc::channel::<Command>(config.command_queue_capacity);
        let (connected, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(FlagCoordinator {
            inner: Arc::new(Inner {
                config,
                store,
                provider,
                state: RwLock::new(State {
                    source: None,
                    snapshot: HashMap::new(),
                    context,
                }),
                connected,
                events,
                pending_commands: Mutex::new(Some(rx)),
            }),
            commands: tx,
        })
    }

    /// Spawn the worker that resolves the authoritative source and then serves commands.
    ///
    /// Returns immediately; must be called from within a Tokio runtime. Only the first successful
    /// call has any effect.
    ///
    /// Without a current runtime this logs a warning and leaves the coordinator unstarted, so a
    /// later call from inside a runtime still works.
    pub fn start(&self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("cannot start flag coordinator outside a Tokio runtime: {}", e);
                return;
            }
        };
        let Some(rx) = self.inner.pending_commands.lock().take() else {
            warn!("flag coordinator already started; ignoring");
            return;
        };

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            inner.run(rx).await;
        });
    }

    /// Evaluate `key`, returning `default` when no authoritative value of the same case exists.
    ///
    /// Never blocks on I/O and never fails.
    pub fn variation(&self, key: &FlagKey, default: FlagValue) -> FlagValue {
        let state = self.inner.state.read();
        if state.source == Some(AuthoritativeSource::RemoteProvider) {
            drop(state);
            let value = self.inner.provider.evaluate(key, default.clone());
            if value.same_type(&default) {
                return value;
            }
            debug!(
                "{:?}: remote provider returned {} for {}, wanted {}",
                FallbackReason::TypeMismatch,
                value.value_type(),
                key,
                default.value_type()
            );
            return default;
        }

        match state.snapshot.get(key) {
            Some(value) if value.same_type(&default) => value.clone(),
            Some(value) => {
                debug!(
                    "{:?}: cached {} is {}, wanted {}",
                    FallbackReason::TypeMismatch,
                    key,
                    value.value_type(),
                    default.value_type()
                );
                default
            }
            None => default,
        }
    }

    /// Whether the boolean flag `key` is on. Falls back to the compiled-in default for the key.
    pub fn is_enabled(&self, key: &FlagKey) -> bool {
        let default = default_bool(key);
        self.variation(key, FlagValue::Bool(default))
            .as_bool()
            .unwrap_or(default)
    }

    pub fn get_string(&self, key: &FlagKey, default: &str) -> String {
        self.variation(key, FlagValue::from(default))
            .as_string()
            .unwrap_or_else(|| default.to_owned())
    }

    pub fn get_int(&self, key: &FlagKey, default: i64) -> i64 {
        self.variation(key, FlagValue::Int(default))
            .as_int()
            .unwrap_or(default)
    }

    pub fn get_double(&self, key: &FlagKey, default: f64) -> f64 {
        self.variation(key, FlagValue::Float(default))
            .as_float()
            .unwrap_or(default)
    }

    /// Switch to a new tenant or device class. The change is applied by the worker; this call
    /// does not wait for it and leaves the cached snapshot alone.
    pub fn update_context(&self, tenant_id: impl Into<String>, device_type: DeviceType) {
        let command = Command::UpdateContext {
            tenant_id: tenant_id.into(),
            device_type,
        };
        if let Err(e) = self.commands.try_send(command) {
            warn!("dropping context update: {}", e);
        }
    }

    /// Reload the snapshot from the flag store. Only valid while the local store is
    /// authoritative.
    ///
    /// The returned receiver resolves once the worker has processed the request.
    pub fn reload_from_store(&self) -> oneshot::Receiver<Result<usize, CoordinatorError>> {
        let (reply, rx) = oneshot::channel();
        if let Err(e) = self.commands.try_send(Command::Reload(reply)) {
            warn!("dropping reload request: {}", e);
            let (reply, rx) = oneshot::channel();
            let _ = reply.send(Err(CoordinatorError::WorkerGone));
            return rx;
        }
        rx
    }

    /// Ask the remote provider to send buffered analytics events. No-op under local authority.
    pub fn flush(&self) {
        if self.authoritative_source() == Some(AuthoritativeSource::RemoteProvider) {
            self.inner.provider.flush();
        }
    }

    /// Stop the worker's command loop. Reads keep working against the last resolved state.
    pub fn shutdown(&self) {
        if let Err(e) = self.commands.try_send(Command::Shutdown) {
            warn!("could not deliver shutdown: {}", e);
        }
    }

    /// `None` until initialization has decided.
    pub fn authoritative_source(&self) -> Option<AuthoritativeSource> {
        self.inner.state.read().source
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.inner.events.subscribe()
    }

    pub fn context(&self) -> EvaluationContext {
        self.inner.state.read().context.clone()
    }

    pub fn snapshot(&self) -> HashMap<FlagKey, FlagValue> {
        self.inner.state.read().snapshot.clone()
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Command>) {
        self.initialize().await;

        while let Some(command) = rx.recv().await {
            match command {
                Command::UpdateContext {
                    tenant_id,
                    device_type,
                } => self.apply_context(tenant_id, device_type).await,
                Command::Reload(reply) => {
                    let result = self.reload().await;
                    let _ = reply.send(result);
                }
                Command::Shutdown => {
                    info!("flag coordinator worker shutting down");
                    break;
                }
            }
        }
    }

    async fn initialize(self: &Arc<Self>) {
        if self.config.force_local_source {
            self.fall_back(FallbackReason::ForcedLocal).await;
            return;
        }
        let Some(credential) = self.config.effective_credential() else {
            self.fall_back(FallbackReason::MissingCredential).await;
            return;
        };

        let context = self.state.read().context.clone();
        let bound = self.config.connect_timeout;
        let outcome = tokio::time::timeout(bound, self.provider.connect(credential, &context, bound))
            .await
            .unwrap_or(ConnectOutcome::TimedOut);

        match outcome {
            ConnectOutcome::Connected => {
                self.state.write().source = Some(AuthoritativeSource::RemoteProvider);
                self.connected.send_replace(true);
                info!("remote provider connected; serving flags from it");
                self.emit(CoordinatorEvent::SourceResolved {
                    source: AuthoritativeSource::RemoteProvider,
                    reason: None,
                });

                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    inner.seed(context).await;
                });
            }
            ConnectOutcome::TimedOut => {
                warn!("remote provider did not connect within {:?}", bound);
                self.fall_back(FallbackReason::ConnectTimeout).await;
            }
        }
    }

    async fn fall_back(&self, reason: FallbackReason) {
        self.state.write().source = Some(AuthoritativeSource::LocalStore);
        info!("serving flags from the local store ({:?})", reason);
        self.emit(CoordinatorEvent::SourceResolved {
            source: AuthoritativeSource::LocalStore,
            reason: Some(reason),
        });

        // A failed load leaves reads on compiled-in defaults.
        let _ = self.bulk_load().await;
    }

    async fn reload(&self) -> Result<usize, CoordinatorError> {
        let source = self.state.read().source;
        if source == Some(AuthoritativeSource::RemoteProvider) {
            return Err(CoordinatorError::NotLocal);
        }
        Ok(self.bulk_load().await?)
    }

    /// Replace the snapshot with every record the store holds for the current tenant.
    async fn bulk_load(&self) -> Result<usize, StoreError> {
        let tenant_id = self.state.read().context.key().to_owned();

        let records = match self.store.query_flags(&tenant_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "{:?}: could not load flags for {}: {}",
                    FallbackReason::StoreReadFailure,
                    tenant_id,
                    e
                );
                self.emit(CoordinatorEvent::SnapshotLoadFailed {
                    tenant_id: tenant_id.clone(),
                });
                return Err(e);
            }
        };

        let snapshot = snapshot_from_records(&tenant_id, records);
        let flags = snapshot.len();
        self.state.write().snapshot = snapshot;
        info!("loaded {} cached flags for {}", flags, tenant_id);
        self.emit(CoordinatorEvent::SnapshotLoaded { tenant_id, flags });
        Ok(flags)
    }

    /// Copy every remote flag into the store. Runs off the worker and never touches `state`.
    async fn seed(&self, context: EvaluationContext) {
        let tenant_id = context.key().to_owned();

        if self.config.seed_policy == SeedPolicy::FirstConnectPerTenant {
            match self.store.query_flags(&tenant_id).await {
                Ok(records) if records.iter().any(|r| r.provenance == Provenance::Remote) => {
                    debug!("{} already seeded; skipping", tenant_id);
                    self.emit(CoordinatorEvent::SeedSkipped {
                        tenant_id: tenant_id.clone(),
                    });
                    return;
                }
                Ok(_) => (),
                Err(e) => warn!(
                    "could not check earlier seed for {}, seeding anyway: {}",
                    tenant_id, e
                ),
            }
        }

        let flags = match self.provider.enumerate_all(&context).await {
            Ok(flags) => flags,
            Err(e) => {
                warn!("could not enumerate remote flags for seeding: {}", e);
                self.emit(CoordinatorEvent::SeedFailed { tenant_id });
                return;
            }
        };

        let mut written = 0;
        let mut failed = 0;
        for (key, raw) in flags.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            let Some(value) = FlagValue::from_json(&raw) else {
                debug!("not seeding {}: unsupported value {}", key, raw);
                continue;
            };
            let record = FlagRecord::remote(key, value, tenant_id.clone());
            match self.store.upsert_flag(&record).await {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(
                        "{:?}: {}: {}",
                        FallbackReason::SeedWriteFailure,
                        record.document_id(),
                        e
                    );
                    failed += 1;
                }
            }
        }

        info!("seeded {} flags for {} ({} failed)", written, tenant_id, failed);
        self.emit(CoordinatorEvent::SeedCompleted {
            tenant_id,
            written,
            failed,
        });
    }

    /// Replace the evaluation context and re-identify the provider with it.
    ///
    /// Re-identification is awaited here so the provider applies contexts in the order they
    /// were requested. Callers of `update_context` only queue the command and never wait.
    async fn apply_context(&self, tenant_id: String, device_type: DeviceType) {
        let context = match ContextBuilder::new(tenant_id)
            .device_type(device_type)
            .build()
        {
            Ok(context) => context,
            Err(e) => {
                warn!("ignoring context update: {}", e);
                return;
            }
        };

        self.state.write().context = context.clone();
        if self.remote_enabled() {
            self.provider.reidentify(&context).await;
        }

        self.emit(CoordinatorEvent::ContextUpdated {
            tenant_id: context.key().to_owned(),
            device_type,
        });
    }

    // Whether the provider was started at all this session.
    fn remote_enabled(&self) -> bool {
        !self.config.force_local_source && self.config.effective_credential().is_some()
    }

    fn emit(&self, event: CoordinatorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Build a snapshot from store records. When a store returns more than one record for a key, the
/// most recently updated wins. Records for other tenants or with a mismatched type tag are
/// dropped.
fn snapshot_from_records(tenant_id: &str, records: Vec<FlagRecord>) -> HashMap<FlagKey, FlagValue> {
    records
        .into_iter()
        .filter(|r| r.tenant_id == tenant_id)
        .filter(|r| {
            if !r.is_consistent() {
                warn!(
                    "skipping {}: tagged {} but holds {}",
                    r.document_id(),
                    r.value_type,
                    r.value.value_type()
                );
            }
            r.is_consistent()
        })
        .sorted_by_key(|r| r.updated_at)
        .map(|r| (r.key, r.value))
        .collect()
}
