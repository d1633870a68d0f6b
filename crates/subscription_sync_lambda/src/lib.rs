//! AWS-oriented adapters, engine, and handlers for log subscription sync.
//!
//! This crate owns runtime integration details (the Lambda entrypoint, the
//! CloudWatch Logs and Secrets Manager collaborators, concurrent fan-out) and
//! re-exports the domain primitives through a single `runtime` module boundary.

pub mod adapters;
pub mod engine;
pub mod handlers;
pub mod runtime;
pub mod telemetry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_support;
