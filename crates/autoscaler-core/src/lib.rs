//! autoscaler-core — configuration and scaling policy documents.
//!
//! The public API server consumes a validated, immutable [`Config`] and
//! validates inbound policy documents with a [`PolicyValidator`] before
//! anything is persisted or forwarded to the scheduler.

pub mod config;
pub mod policy;
pub mod validator;

pub use config::{Config, ConfigError};
pub use policy::*;
pub use validator::{PolicyValidationError, PolicyValidator};
