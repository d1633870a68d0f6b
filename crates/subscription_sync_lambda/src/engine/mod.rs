pub mod batch;
pub mod reconciler;
pub mod resolver;
pub mod retry;
pub mod secret_versions;
