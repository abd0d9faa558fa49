//! StateStore — redb-backed persistence for the autoscaler public API.
//!
//! Provides typed CRUD operations over policies, service instances,
//! bindings and credentials. All values are JSON-serialized into redb's
//! `&[u8]` value columns. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use autoscaler_core::ScalingPolicy;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Run a redb call on the blocking pool so async callers never stall
    /// a runtime worker on disk I/O.
    pub(crate) async fn blocking<T, F>(&self, op: F) -> StateResult<T>
    where
        F: FnOnce(&StateStore) -> StateResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(map_err!(Blocking))?
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(POLICIES).map_err(map_err!(Table))?;
        txn.open_table(SERVICE_INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(BINDINGS).map_err(map_err!(Table))?;
        txn.open_table(CREDENTIALS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn put<T: Serialize>(&self, table: JsonTable, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Returns true if the key existed.
    fn remove(&self, table: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Policies ───────────────────────────────────────────────────

    /// Insert or replace the active policy of an app.
    pub fn put_policy(&self, app_id: &str, policy: &ScalingPolicy, guid: &str) -> StateResult<()> {
        let record = PolicyRecord {
            app_id: app_id.to_string(),
            guid: guid.to_string(),
            policy: policy.clone(),
            updated_at: epoch_secs(),
        };
        self.put(POLICIES, app_id, &record)?;
        debug!(%app_id, %guid, "policy stored");
        Ok(())
    }

    pub fn get_policy(&self, app_id: &str) -> StateResult<Option<PolicyRecord>> {
        self.get(POLICIES, app_id)
    }

    /// Delete the policy of an app. Returns true if it existed.
    pub fn remove_policy(&self, app_id: &str) -> StateResult<bool> {
        let existed = self.remove(POLICIES, app_id)?;
        debug!(%app_id, existed, "policy deleted");
        Ok(existed)
    }

    // ── Service instances & bindings ───────────────────────────────

    /// Insert or update a service instance.
    pub fn put_service_instance(&self, instance: &ServiceInstance) -> StateResult<()> {
        self.put(SERVICE_INSTANCES, &instance.instance_id, instance)
    }

    pub fn get_service_instance(&self, instance_id: &str) -> StateResult<Option<ServiceInstance>> {
        self.get(SERVICE_INSTANCES, instance_id)
    }

    /// Delete a service instance. Returns true if it existed.
    pub fn delete_service_instance(&self, instance_id: &str) -> StateResult<bool> {
        self.remove(SERVICE_INSTANCES, instance_id)
    }

    /// Bind an app to a service instance, replacing any previous binding.
    pub fn bind_app(&self, app_id: &str, instance_id: &str) -> StateResult<()> {
        let binding = Binding {
            app_id: app_id.to_string(),
            instance_id: instance_id.to_string(),
        };
        self.put(BINDINGS, app_id, &binding)?;
        debug!(%app_id, %instance_id, "app bound");
        Ok(())
    }

    /// Remove an app's binding. Returns true if it existed.
    pub fn unbind_app(&self, app_id: &str) -> StateResult<bool> {
        self.remove(BINDINGS, app_id)
    }

    pub fn get_binding(&self, app_id: &str) -> StateResult<Option<Binding>> {
        self.get(BINDINGS, app_id)
    }

    /// Resolve an app to the service instance it is bound to.
    ///
    /// A binding that points at a missing instance is a `DanglingBinding`
    /// error rather than "not bound".
    pub fn service_instance_for_app(&self, app_id: &str) -> StateResult<Option<ServiceInstance>> {
        let Some(binding) = self.get_binding(app_id)? else {
            return Ok(None);
        };
        match self.get_service_instance(&binding.instance_id)? {
            Some(instance) => Ok(Some(instance)),
            None => Err(StateError::DanglingBinding {
                app_id: app_id.to_string(),
                instance_id: binding.instance_id,
            }),
        }
    }

    // ── Credentials ────────────────────────────────────────────────

    pub fn put_credential(&self, record: &CredentialRecord) -> StateResult<()> {
        self.put(CREDENTIALS, &record.app_id, record)
    }

    pub fn get_credential(&self, app_id: &str) -> StateResult<Option<CredentialRecord>> {
        self.get(CREDENTIALS, app_id)
    }

    /// Delete an app's credential. Returns true if it existed.
    pub fn delete_credential(&self, app_id: &str) -> StateResult<bool> {
        self.remove(CREDENTIALS, app_id)
    }
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
