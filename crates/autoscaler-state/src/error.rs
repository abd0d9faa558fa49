//! Failures surfaced by the policy, binding and credential store.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open state store: {0}")]
    Open(String),

    #[error("state store transaction failed: {0}")]
    Transaction(String),

    #[error("state store table unavailable: {0}")]
    Table(String),

    #[error("state store read failed: {0}")]
    Read(String),

    #[error("state store write failed: {0}")]
    Write(String),

    #[error("record could not be encoded: {0}")]
    Serialize(String),

    #[error("stored record is corrupt: {0}")]
    Deserialize(String),

    /// The app is bound to a service instance the store no longer holds.
    #[error("app {app_id} is bound to unknown service instance {instance_id}")]
    DanglingBinding { app_id: String, instance_id: String },

    #[error("state store task aborted: {0}")]
    Blocking(String),
}
