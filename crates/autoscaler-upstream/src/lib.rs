//! autoscaler-upstream — calls from the public API to internal services.
//!
//! - [`UpstreamClient`]: pooled HTTP/1 client with a per-request timeout,
//!   used both for scheduler writes and for proxied history reads.
//! - [`ScheduleClient`]: the scheduler capability the policy handlers depend
//!   on, with [`HttpScheduleClient`] as the production implementation.
//!
//! No call is retried here; a failed call is reported to the caller.

pub mod client;
pub mod error;
pub mod scheduler;

pub use client::{UpstreamClient, UpstreamResponse, path_segment};
pub use error::{ScheduleError, UpstreamError};
pub use scheduler::{HttpScheduleClient, ScheduleClient};
