//! Observability for the token cache.
//!
//! Provides metrics definitions. The raw token never appears in a log field
//! or a metric label; log correlation uses [`crate::key::log_fragment`].

pub mod metrics;
