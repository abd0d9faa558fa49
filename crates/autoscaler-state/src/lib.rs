//! autoscaler-state — embedded state store for the autoscaler public API.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for scaling policies, service-instance bindings (with their
//! default policies), and metrics-ingestion credentials.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns,
//! keyed by application or service-instance id.
//!
//! Request handlers never see `StateStore` directly: they depend on the
//! [`PolicyStore`], [`BindingStore`] and [`CredentialManager`] traits, which
//! `StateStore` (and [`StoredCredentials`]) implement. The `StateStore` is
//! `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod credentials;
pub mod error;
pub mod store;
pub mod tables;
pub mod traits;
pub mod types;

pub use credentials::{CredentialError, CredentialManager, StoredCredentials};
pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use traits::{BindingStore, PolicyStore};
pub use types::*;
