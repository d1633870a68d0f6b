use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::secret_store::{SecretStore, SecretVersion};
use crate::runtime::diff::{diff, Delta};
use crate::runtime::error::SecretError;
use crate::runtime::selector::{extract_custom_groups, split_values};

/// Compares the custom group list in a secret's current version against
/// the version created just before it.
#[derive(Clone)]
pub struct SecretVersionDiffer {
    secrets: Arc<dyn SecretStore>,
}

impl SecretVersionDiffer {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    /// Token-level delta between the previous and current group lists.
    /// Wildcard tokens come back unexpanded.
    pub async fn diff_secret_versions(&self, secret_id: &str) -> Result<Delta, SecretError> {
        let previous = self.previous_version(secret_id).await?;
        debug!(secret = %secret_id, version = %previous.version_id, "comparing against previous secret version");

        let current_tokens = self.tokens(secret_id, None).await?;
        let previous_tokens = self
            .tokens(secret_id, Some(previous.version_id.as_str()))
            .await?;

        let delta = diff(&previous_tokens, &current_tokens);
        info!(
            secret = %secret_id,
            to_add = delta.to_add.len(),
            to_remove = delta.to_remove.len(),
            "secret versions compared"
        );
        Ok(delta)
    }

    async fn previous_version(&self, secret_id: &str) -> Result<SecretVersion, SecretError> {
        let mut versions = self.secrets.list_secret_versions(secret_id).await?;
        // Newest first; versions without a creation date sort last.
        versions.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        versions
            .into_iter()
            .nth(1)
            .ok_or_else(|| SecretError::NoPreviousVersion(secret_id.to_string()))
    }

    async fn tokens(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<Vec<String>, SecretError> {
        let value = self
            .secrets
            .get_secret_string(secret_id, version_id)
            .await?
            .ok_or_else(|| SecretError::MissingSecretString(secret_id.to_string()))?;
        Ok(split_values(&extract_custom_groups(secret_id, &value)?))
    }
}
