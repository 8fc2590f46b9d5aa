//! Process-wide table of collections, each with its own guard.

use crate::collection::CollectionState;
use crate::error::{Error, Result};
use crate::persist;
use crate::schema::CollectionSchema;
use crate::serializer::Serializer;
use parking_lot::{Mutex, MutexGuard};
use shardmap::ShardMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One registered collection: its schema, its records, and the guard around
/// them.
pub struct Collection {
    schema: CollectionSchema,
    state: Mutex<CollectionState>,
    dirty: AtomicBool,
}

impl Collection {
    fn new(schema: CollectionSchema, state: CollectionState, dirty: bool) -> Self {
        Self {
            schema,
            state: Mutex::new(state),
            dirty: AtomicBool::new(dirty),
        }
    }

    /// The collection's descriptor.
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Acquire the collection guard. Hold it for the whole
    /// read-decide-write of an operation.
    pub fn lock(&self) -> MutexGuard<'_, CollectionState> {
        self.state.lock()
    }

    /// `true` when memory has changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Write `state` (the caller's locked view of this collection) to disk.
    /// The collection stays dirty if the write fails.
    pub(crate) fn save_locked<S: Serializer>(
        &self,
        state: &CollectionState,
        serializer: &S,
    ) -> Result<()> {
        self.dirty.store(false, Ordering::Release);
        match persist::save(&self.schema.path, state, serializer) {
            Ok(()) => {
                tracing::debug!(
                    "flushed collection '{}' ({} records)",
                    self.schema.name,
                    state.len()
                );
                Ok(())
            }
            Err(e) => {
                self.mark_dirty();
                tracing::error!("failed to flush collection '{}': {}", self.schema.name, e);
                Err(e)
            }
        }
    }

    /// Lock and write to disk. Clean collections are skipped unless `force`.
    pub(crate) fn flush<S: Serializer>(&self, serializer: &S, force: bool) -> Result<()> {
        let state = self.lock();
        if !force && !self.is_dirty() {
            return Ok(());
        }
        self.save_locked(&state, serializer)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("schema", &self.schema)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

/// Name → [`Collection`] table, built at startup from a schema list.
#[derive(Default)]
pub struct CollectionRegistry {
    collections: ShardMap<String, Collection>,
}

impl CollectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and register every schema. All schemas are validated before any
    /// file is touched. Registering a name again replaces the previous entry
    /// with a freshly loaded one.
    ///
    /// Must not run concurrently with requests.
    pub fn register<I, S>(&self, schemas: I, serializer: &S) -> Result<()>
    where
        I: IntoIterator<Item = CollectionSchema>,
        S: Serializer,
    {
        let schemas: Vec<CollectionSchema> = schemas.into_iter().collect();
        for schema in &schemas {
            schema.validate()?;
        }
        for schema in schemas {
            let mut state = persist::load(&schema.path, serializer);
            let backfilled = state.backfill_internal_ids();
            if backfilled > 0 {
                tracing::debug!(
                    "assigned internal ids to {} records of '{}'",
                    backfilled,
                    schema.name
                );
            }
            tracing::info!(
                "registered collection '{}' ({} records from {})",
                schema.name,
                state.len(),
                schema.path.display()
            );
            let name = schema.name.clone();
            self.collections
                .insert(name, Collection::new(schema, state, backfilled > 0));
        }
        Ok(())
    }

    /// Schema of a registered collection.
    pub fn resolve(&self, name: &str) -> Option<CollectionSchema> {
        self.collection(name).map(|c| c.schema().clone())
    }

    /// The registered collection called `name`.
    pub fn collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.get(&name.to_string())
    }

    /// Same as [`collection`](Self::collection) but unknown names are
    /// [`Error::NotFound`].
    pub fn require(&self, name: &str) -> Result<Arc<Collection>> {
        self.collection(name)
            .ok_or_else(|| Error::NotFound(format!("unknown collection '{name}'")))
    }

    /// Names of all registered collections.
    pub fn names(&self) -> Vec<String> {
        self.collections.iter_snapshot().map(|(k, _)| k).collect()
    }

    /// Number of registered collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every dirty collection. Every collection is attempted; the first
    /// error is returned.
    pub fn flush_dirty<S: Serializer>(&self, serializer: &S) -> Result<()> {
        self.flush_all(serializer, false)
    }

    /// Write every collection, dirty or not. Call once when the process is
    /// going down, after the last request.
    pub fn shutdown<S: Serializer>(&self, serializer: &S) -> Result<()> {
        let result = self.flush_all(serializer, true);
        tracing::info!("flushed {} collections on shutdown", self.len());
        result
    }

    fn flush_all<S: Serializer>(&self, serializer: &S, force: bool) -> Result<()> {
        let mut first_err = None;
        for (_, collection) in self.collections.iter_snapshot() {
            if let Err(e) = collection.flush(serializer, force) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRegistry")
            .field("collections", &self.names())
            .finish()
    }
}
