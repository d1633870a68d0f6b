use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::runtime::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVersion {
    pub version_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `version_id = None` reads the current version.
    async fn get_secret_string(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<Option<String>, ApiError>;

    /// Every retained version, across all pages.
    async fn list_secret_versions(&self, secret_id: &str) -> Result<Vec<SecretVersion>, ApiError>;
}
