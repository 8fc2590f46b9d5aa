//! Core store type, handle, and builder.

use crate::collection::CollectionState;
use crate::error::Result;
use crate::flush::{AsyncFlushWorker, FlushPolicy};
use crate::record::Record;
use crate::registry::{Collection, CollectionRegistry};
use crate::schema::CollectionSchema;
use crate::serializer::JsonSerializer;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

/// Named collections of JSON records, each backed by one JSON file.
///
/// Every operation takes the target collection's guard for its full
/// duration, so concurrent writers to one collection never lose updates while
/// different collections proceed in parallel. Use [`open`](Self::open) for a
/// quick start or [`builder`](Self::builder) for full control over flush
/// policy, pretty-printing, etc.
pub struct RecordStore {
    registry: Arc<CollectionRegistry>,
    serializer: JsonSerializer,
    policy: FlushPolicy,
    trigger: Mutex<Option<SyncSender<()>>>,
}

impl RecordStore {
    /// Register `schemas` with manual flush and compact JSON.
    pub fn open<I>(schemas: I) -> Result<RecordStoreHandle>
    where
        I: IntoIterator<Item = CollectionSchema>,
    {
        Self::builder().collections(schemas).build()
    }

    /// Start configuring a new store. Call [`.build()`](RecordStoreBuilder::build)
    /// when ready.
    pub fn builder() -> RecordStoreBuilder {
        RecordStoreBuilder::new()
    }

    // ---- reads ----

    /// Every record in `collection`. Order is unspecified.
    pub fn list_all(&self, collection: &str) -> Result<Vec<Record>> {
        self.read(collection, |state| state.records())
    }

    /// The record whose internal id is `id`.
    pub fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        self.read(collection, |state| state.find_by_id(id).cloned())
    }

    /// The record stored under identity key `key`.
    pub fn find_by_key(&self, collection: &str, key: &str) -> Result<Option<Record>> {
        self.read(collection, |state| state.get(key).cloned())
    }

    /// Records whose `field` equals `value` exactly. No match is an empty
    /// list, not an error.
    pub fn filter_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>> {
        self.read(collection, |state| state.filter_by_field(field, value))
    }

    /// Number of records in `collection`.
    pub fn len(&self, collection: &str) -> Result<usize> {
        self.read(collection, CollectionState::len)
    }

    /// Names of all registered collections.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Schema of `collection`, or `None` if it isn't registered.
    #[must_use]
    pub fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.registry.resolve(collection)
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    // ---- writes ----

    /// Insert or replace a record addressed by the collection's identity
    /// field. See [`CollectionState::upsert`] for the identity rules.
    pub fn upsert(&self, collection: &str, incoming: Record) -> Result<Record> {
        self.write(collection, |state, schema| {
            let result = state.upsert(&schema.identity_field, incoming);
            log_rejection(&schema.name, &result);
            let changed = result.is_ok();
            (result, changed)
        })?
    }

    /// Upsert each record independently, in order. One element failing does
    /// not stop the rest. The outer error is only for an unknown collection.
    ///
    /// Only triggers one flush at the end, not one per record.
    pub fn batch_upsert<I>(&self, collection: &str, incoming: I) -> Result<Vec<Result<Record>>>
    where
        I: IntoIterator<Item = Record>,
    {
        self.batch_upsert_parsed(collection, incoming.into_iter().map(Ok))
    }

    /// Like [`batch_upsert`](Self::batch_upsert), but elements that already
    /// failed to parse pass through to the results in their position.
    pub(crate) fn batch_upsert_parsed<I>(
        &self,
        collection: &str,
        incoming: I,
    ) -> Result<Vec<Result<Record>>>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        self.write(collection, |state, schema| {
            let results: Vec<Result<Record>> = incoming
                .into_iter()
                .map(|parsed| {
                    let result = parsed.and_then(|rec| state.upsert(&schema.identity_field, rec));
                    log_rejection(&schema.name, &result);
                    result
                })
                .collect();
            let changed = results.iter().any(|r| r.is_ok());
            (results, changed)
        })
    }

    /// Replace the content of the record with internal id `id`, keeping its
    /// internal id and its identity key.
    pub fn update_by_id(&self, collection: &str, id: &str, incoming: Record) -> Result<Record> {
        self.write(collection, |state, _| {
            let result = state.update_by_id(id, incoming);
            let changed = result.is_ok();
            (result, changed)
        })?
    }

    /// Remove the record with internal id `id`, returning it.
    pub fn delete_by_id(&self, collection: &str, id: &str) -> Result<Record> {
        self.write(collection, |state, _| {
            let result = state.delete_by_id(id);
            let changed = result.is_ok();
            (result, changed)
        })?
    }

    // ---- persistence ----

    /// Write every collection with unsaved changes (atomic temp-file + rename).
    pub fn flush(&self) -> Result<()> {
        self.registry.flush_dirty(&self.serializer)
    }

    /// Write one collection, dirty or not.
    pub fn flush_collection(&self, collection: &str) -> Result<()> {
        self.registry
            .require(collection)?
            .flush(&self.serializer, true)
    }

    // ---- internal ----

    fn read<T>(&self, collection: &str, op: impl FnOnce(&CollectionState) -> T) -> Result<T> {
        let entry = self.registry.require(collection)?;
        let state = entry.lock();
        Ok(op(&*state))
    }

    fn write<T>(
        &self,
        collection: &str,
        op: impl FnOnce(&mut CollectionState, &CollectionSchema) -> (T, bool),
    ) -> Result<T> {
        let entry = self.registry.require(collection)?;
        let mut state = entry.lock();
        let (out, changed) = op(&mut *state, entry.schema());
        if changed {
            self.notify_mutation(&entry, &*state);
        }
        Ok(out)
    }

    // Runs with the collection guard held.
    fn notify_mutation(&self, entry: &Collection, state: &CollectionState) {
        entry.mark_dirty();
        match &self.policy {
            FlushPolicy::Immediate => {
                // Failure is logged and the collection stays dirty for the next flush.
                let _ = entry.save_locked(state, &self.serializer);
            }
            FlushPolicy::Async(_) => {
                if let Some(t) = self.trigger.lock().as_ref() {
                    let _ = t.try_send(());
                }
            }
            FlushPolicy::Manual => {}
        }
    }

    fn close(&self) -> Result<()> {
        self.trigger.lock().take();
        self.registry.shutdown(&self.serializer)
    }
}

fn log_rejection(collection: &str, result: &Result<Record>) {
    if let Err(e) = result {
        tracing::debug!("rejected write to '{}': {}", collection, e);
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("collections", &self.registry.names())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and opens a [`RecordStore`].
///
/// ```rust,no_run
/// use json_collections::{CollectionSchema, FlushPolicy, RecordStore};
///
/// let store = RecordStore::builder()
///     .collection(CollectionSchema::new("users", "email", "data/users.json"))
///     .policy(FlushPolicy::Immediate)
///     .pretty(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct RecordStoreBuilder {
    schemas: Vec<CollectionSchema>,
    policy: FlushPolicy,
    pretty: bool,
}

impl RecordStoreBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Add one collection.
    pub fn collection(mut self, schema: CollectionSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Add several collections, e.g. from
    /// [`parse_schema_list`](crate::schema::parse_schema_list).
    pub fn collections<I>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = CollectionSchema>,
    {
        self.schemas.extend(schemas);
        self
    }

    /// Set the flush policy (default: [`FlushPolicy::Manual`]).
    pub fn policy(mut self, policy: FlushPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write human-readable JSON with indentation (default: compact).
    pub fn pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    /// Load (or create) every collection file and return a handle.
    pub fn build(self) -> Result<RecordStoreHandle> {
        let serializer = if self.pretty {
            JsonSerializer::pretty()
        } else {
            JsonSerializer::new()
        };

        let registry = Arc::new(CollectionRegistry::new());
        registry.register(self.schemas, &serializer)?;

        let (worker, trigger) = match &self.policy {
            FlushPolicy::Async(interval) => {
                let (tx, rx) = std::sync::mpsc::sync_channel(0);
                let registry_ref = Arc::clone(&registry);
                let ser = serializer.clone();
                let w = AsyncFlushWorker::start(
                    *interval,
                    move || {
                        let _ = registry_ref.flush_dirty(&ser);
                    },
                    rx,
                );
                (Some(w), Some(tx))
            }
            _ => (None, None),
        };

        let store = RecordStore {
            registry,
            serializer,
            policy: self.policy,
            trigger: Mutex::new(trigger),
        };

        Ok(RecordStoreHandle {
            inner: Arc::new(store),
            worker,
            closed: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owns the store and (for async policy) the background flush thread.
///
/// Derefs to [`RecordStore`] so you can call store methods directly on it.
/// Hand [`store`](Self::store) to request handlers. Call
/// [`shutdown`](Self::shutdown) once after the last request; dropping the
/// handle without it does the same flush but can only log failures.
pub struct RecordStoreHandle {
    inner: Arc<RecordStore>,
    worker: Option<AsyncFlushWorker>,
    closed: bool,
}

impl RecordStoreHandle {
    /// Shared reference to the store for request-handling layers.
    #[must_use]
    pub fn store(&self) -> Arc<RecordStore> {
        Arc::clone(&self.inner)
    }

    /// Stop the flush worker and write every collection to disk.
    pub fn shutdown(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        let result = self.inner.close();
        if let Some(mut w) = self.worker.take() {
            w.stop();
        }
        result
    }
}

impl std::ops::Deref for RecordStoreHandle {
    type Target = RecordStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Drop for RecordStoreHandle {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                tracing::error!("flush on drop failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for RecordStoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.inner, f)
    }
}
