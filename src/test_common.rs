#![cfg(test)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};

use crate::context::EvaluationContext;
use crate::events::CoordinatorEvent;
use crate::flag::FlagKey;
use crate::flag_value::FlagValue;
use crate::provider::{ConnectOutcome, ProviderError, RemoteProvider};
use crate::record::FlagRecord;
use crate::store::{FlagStore, StoreError};

/// A flag store holding JSON documents in memory, keyed on [FlagRecord::document_id]. Documents
/// are decoded on every query, as an embedded document database would.
pub struct MemoryFlagStore {
    documents: Mutex<HashMap<String, serde_json::Value>>,
    fail_reads: AtomicBool,
    failing_writes: Mutex<HashSet<String>>,
    upserts: AtomicUsize,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            fail_reads: AtomicBool::new(false),
            failing_writes: Mutex::new(HashSet::new()),
            upserts: AtomicUsize::new(0),
        }
    }

    pub fn with_records(records: Vec<FlagRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert_document(
                &record.document_id(),
                serde_json::to_value(&record).expect("record serializes"),
            );
        }
        store
    }

    /// Store a raw document as another writer syncing into the database might.
    pub fn insert_document(&self, document_id: &str, document: serde_json::Value) {
        self.documents.lock().insert(document_id.to_owned(), document);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes_for(&self, key: &str) {
        self.failing_writes.lock().insert(key.to_owned());
    }

    pub fn clear(&self) {
        self.documents.lock().clear();
    }

    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Records for `tenant_id`, ordered by key.
    pub fn records_for(&self, tenant_id: &str) -> Vec<FlagRecord> {
        self.decode_tenant(tenant_id).expect("stored documents decode")
    }

    pub fn value_of(&self, tenant_id: &str, key: &str) -> Option<FlagValue> {
        self.records_for(tenant_id)
            .into_iter()
            .find(|r| r.key.as_str() == key)
            .map(|r| r.value)
    }

    fn decode_tenant(&self, tenant_id: &str) -> Result<Vec<FlagRecord>, StoreError> {
        let documents: Vec<serde_json::Value> = self
            .documents
            .lock()
            .values()
            .filter(|d| d.get("tenantId").and_then(|t| t.as_str()) == Some(tenant_id))
            .cloned()
            .collect();
        let mut records = documents
            .into_iter()
            .map(serde_json::from_value::<FlagRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn upsert_flag(&self, record: &FlagRecord) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.failing_writes.lock().contains(record.key.as_str()) {
            return Err(StoreError::Write {
                document_id: record.document_id(),
                message: "write rejected".into(),
            });
        }
        let document = serde_json::to_value(record)?;
        self.insert_document(&record.document_id(), document);
        Ok(())
    }

    async fn query_flags(&self, tenant_id: &str) -> Result<Vec<FlagRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store closed".into()));
        }
        self.decode_tenant(tenant_id)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ConnectBehavior {
    Connect,
    TimeOut,
    // Never answer; only the coordinator's own bound ends the attempt.
    Hang,
}

pub struct FakeProvider {
    behavior: ConnectBehavior,
    flags: HashMap<FlagKey, serde_json::Value>,
    fail_enumeration: bool,
    connects: AtomicUsize,
    evaluations: AtomicUsize,
    flushes: AtomicUsize,
    reidentified: Mutex<Vec<EvaluationContext>>,
    reidentify_seen: Notify,
    first_reidentify_delay: Option<Duration>,
    reidentify_started: AtomicBool,
}

impl FakeProvider {
    pub fn new(behavior: ConnectBehavior) -> Self {
        Self {
            behavior,
            flags: HashMap::new(),
            fail_enumeration: false,
            connects: AtomicUsize::new(0),
            evaluations: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
            reidentified: Mutex::new(Vec::new()),
            reidentify_seen: Notify::new(),
            first_reidentify_delay: None,
            reidentify_started: AtomicBool::new(false),
        }
    }

    pub fn with_flags(mut self, flags: HashMap<FlagKey, serde_json::Value>) -> Self {
        self.flags = flags;
        self
    }

    pub fn failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    /// Make the first reidentify call take `delay` before it records its context.
    pub fn slow_first_reidentify(mut self, delay: Duration) -> Self {
        self.first_reidentify_delay = Some(delay);
        self
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn evaluate_calls(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn reidentified(&self) -> Vec<EvaluationContext> {
        self.reidentified.lock().clone()
    }

    pub async fn wait_for_reidentify(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.reidentify_seen.notified())
            .await
            .expect("provider was never reidentified");
    }
}

#[async_trait]
impl RemoteProvider for FakeProvider {
    async fn connect(
        &self,
        _credential: &str,
        _context: &EvaluationContext,
        _timeout: Duration,
    ) -> ConnectOutcome {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            ConnectBehavior::Connect => ConnectOutcome::Connected,
            ConnectBehavior::TimeOut => ConnectOutcome::TimedOut,
            ConnectBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                ConnectOutcome::TimedOut
            }
        }
    }

    fn evaluate(&self, key: &FlagKey, default: FlagValue) -> FlagValue {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        self.flags
            .get(key)
            .and_then(FlagValue::from_json)
            .filter(|v| v.same_type(&default))
            .unwrap_or(default)
    }

    async fn enumerate_all(
        &self,
        _context: &EvaluationContext,
    ) -> Result<HashMap<FlagKey, serde_json::Value>, ProviderError> {
        if self.fail_enumeration {
            return Err(ProviderError::Request("enumeration unavailable".into()));
        }
        Ok(self.flags.clone())
    }

    async fn reidentify(&self, context: &EvaluationContext) {
        let first = !self.reidentify_started.swap(true, Ordering::SeqCst);
        if let (true, Some(delay)) = (first, self.first_reidentify_delay) {
            tokio::time::sleep(delay).await;
        }
        self.reidentified.lock().push(context.clone());
        self.reidentify_seen.notify_one();
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Receive events until one matches `predicate`, failing the test if none arrives in time.
pub async fn wait_for<F>(
    events: &mut broadcast::Receiver<CoordinatorEvent>,
    mut predicate: F,
) -> CoordinatorEvent
where
    F: FnMut(&CoordinatorEvent) -> bool,
{
    let matching = async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event channel failed: {}", e),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), matching)
        .await
        .expect("timed out waiting for coordinator event")
}
