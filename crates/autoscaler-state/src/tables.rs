//! redb table definitions for the autoscaler state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Active scaling policy keyed by `{app_id}`.
pub const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("policies");

/// Brokered service instances keyed by `{instance_id}`.
pub const SERVICE_INSTANCES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("service_instances");

/// App-to-instance bindings keyed by `{app_id}`.
pub const BINDINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("bindings");

/// Metrics-ingestion credentials keyed by `{app_id}`.
pub const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");
