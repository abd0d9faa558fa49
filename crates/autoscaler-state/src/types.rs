//! Domain types for the autoscaler state store.
//!
//! All types are serializable to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};

use autoscaler_core::ScalingPolicy;

/// Identifier of the application a policy or credential belongs to.
pub type AppId = String;

/// Identifier of a brokered service instance.
pub type InstanceId = String;

// ── Policies ───────────────────────────────────────────────────────

/// The active policy of one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyRecord {
    pub app_id: AppId,
    /// Version token; changes on every attach.
    pub guid: String,
    pub policy: ScalingPolicy,
    /// Unix timestamp (seconds) of the last write.
    pub updated_at: u64,
}

// ── Service instances ──────────────────────────────────────────────

/// A brokered service instance, optionally carrying a default policy that
/// applies to every bound app without an explicit one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServiceInstance {
    pub instance_id: InstanceId,
    /// Raw policy document, stored as received by the broker.
    #[serde(default)]
    pub default_policy: Option<String>,
    #[serde(default)]
    pub default_policy_guid: Option<String>,
}

impl ServiceInstance {
    /// The default policy document, if one is set and non-blank.
    pub fn default_policy(&self) -> Option<&str> {
        self.default_policy
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Binding {
    pub app_id: AppId,
    pub instance_id: InstanceId,
}

// ── Credentials ────────────────────────────────────────────────────

/// A username/password pair for the metrics-ingestion endpoint.
///
/// Missing fields decode as empty strings so callers can report which half
/// of a user-supplied pair is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Credential {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credential {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Persisted form of a credential. The password is only kept as a salted hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialRecord {
    pub app_id: AppId,
    pub username: String,
    pub salt: String,
    pub password_hash: String,
    pub updated_at: u64,
}
