//! Shared log-subscription domain primitives.
//!
//! This crate owns selector parsing, delta computation, resource and tag
//! classification, and inbound event classification. It intentionally excludes
//! AWS SDK and Lambda runtime concerns; those live in `subscription_sync_lambda`.

pub mod arn;
pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod selector;
pub mod services;
pub mod tags;
