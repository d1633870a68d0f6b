use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::adapters::log_groups::LogGroupApi;
use crate::adapters::secret_store::SecretStore;
use crate::engine::batch::fan_out;
use crate::engine::retry::with_retry;
use crate::runtime::config::RetryPolicy;
use crate::runtime::error::{AggregatedError, ItemError, SecretError};
use crate::runtime::selector::{extract_custom_groups, split_values, Selector};
use crate::runtime::services::service_prefix;

/// Concrete groups a selector list expanded to, plus every per-selector
/// failure. Partial results are usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub groups: Vec<String>,
    pub errors: AggregatedError,
    /// Prefixes whose enumeration failed. Groups under them are unknown.
    pub failed_prefixes: Vec<String>,
    /// Set when a secret-held list could not be read at all.
    pub secret_unreadable: bool,
}

impl Resolution {
    /// Whether `log_group` is resolved, or could have been if every
    /// selector had resolved.
    pub fn may_cover(&self, log_group: &str) -> bool {
        self.secret_unreadable
            || self.groups.iter().any(|group| group == log_group)
            || self
                .failed_prefixes
                .iter()
                .any(|prefix| log_group.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Group(String),
    Prefix(String),
}

impl Target {
    fn from_custom_token(token: &str) -> Self {
        match Selector::custom(token) {
            Selector::WildcardGroup(prefix) => Self::Prefix(prefix),
            _ => Self::Group(token.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct Resolver {
    logs: Arc<dyn LogGroupApi>,
    secrets: Arc<dyn SecretStore>,
    own_log_group: Option<String>,
    retry: RetryPolicy,
}

impl Resolver {
    pub fn new(
        logs: Arc<dyn LogGroupApi>,
        secrets: Arc<dyn SecretStore>,
        own_log_group: Option<String>,
    ) -> Self {
        Self {
            logs,
            secrets,
            own_log_group,
            retry: RetryPolicy::default(),
        }
    }

    /// Policy applied to throttled enumeration pages.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Expands selectors into de-duplicated log group names, ordered by
    /// selector position. Prefix enumerations run concurrently.
    pub async fn resolve(&self, selectors: &[Selector]) -> Resolution {
        let mut errors = AggregatedError::new();
        let targets = self.targets(selectors, &mut errors).await;
        let secret_unreadable = !errors.is_empty();

        let results = fan_out(targets, |target| {
            let resolver = self.clone();
            async move {
                match target {
                    Target::Group(name) => Ok(vec![name]),
                    Target::Prefix(prefix) => resolver.enumerate(&prefix).await,
                }
            }
        })
        .await;

        let mut seen = HashSet::new();
        let mut groups = Vec::new();
        let mut failed_prefixes = Vec::new();
        for (target, result) in results {
            match result {
                Ok(names) => {
                    for name in names {
                        if seen.insert(name.clone()) {
                            groups.push(name);
                        }
                    }
                }
                Err(error) => {
                    let Target::Prefix(prefix) = target else {
                        continue;
                    };
                    warn!(prefix = %prefix, error = %error, "log group enumeration failed");
                    failed_prefixes.push(prefix.clone());
                    errors.push(prefix, error);
                }
            }
        }

        debug!(
            selectors = selectors.len(),
            groups = groups.len(),
            failures = errors.len(),
            "selectors resolved"
        );
        Resolution {
            groups,
            errors,
            failed_prefixes,
            secret_unreadable,
        }
    }

    /// Raw custom-group tokens held in a secret's current version.
    pub async fn secret_tokens(&self, secret_id: &str) -> Result<Vec<String>, SecretError> {
        let value = self
            .secrets
            .get_secret_string(secret_id, None)
            .await?
            .ok_or_else(|| SecretError::MissingSecretString(secret_id.to_string()))?;
        let groups = extract_custom_groups(secret_id, &value)?;
        Ok(split_values(&groups))
    }

    /// Whether a single, newly created group is covered by any selector.
    /// Secret-held lists are fetched; a failed fetch counts as no match.
    pub async fn covers(&self, selectors: &[Selector], log_group: &str) -> bool {
        for selector in selectors {
            let matched = match selector {
                Selector::SecretRef(secret_id) => match self.secret_tokens(secret_id).await {
                    Ok(tokens) => tokens
                        .iter()
                        .any(|token| Selector::custom(token).matches_group(log_group)),
                    Err(error) => {
                        warn!(secret = %secret_id, error = %error, "could not read custom log groups from secret");
                        false
                    }
                },
                other => other.matches_group(log_group),
            };
            if matched {
                return true;
            }
        }
        false
    }

    async fn targets(&self, selectors: &[Selector], errors: &mut AggregatedError) -> Vec<Target> {
        let mut targets = Vec::with_capacity(selectors.len());
        for selector in selectors {
            match selector {
                Selector::NamedService(name) => match service_prefix(name) {
                    Some(prefix) => targets.push(Target::Prefix(prefix.to_string())),
                    None => warn!(service = %name, "unsupported service name, skipping"),
                },
                Selector::LiteralGroup(name) => targets.push(Target::Group(name.clone())),
                Selector::WildcardGroup(prefix) => targets.push(Target::Prefix(prefix.clone())),
                Selector::SecretRef(secret_id) => match self.secret_tokens(secret_id).await {
                    Ok(tokens) => {
                        info!(secret = %secret_id, tokens = tokens.len(), "read custom log groups from secret");
                        targets.extend(tokens.iter().map(|token| Target::from_custom_token(token)));
                    }
                    Err(error) => {
                        warn!(secret = %secret_id, error = %error, "could not read custom log groups from secret");
                        errors.push(secret_id.clone(), error);
                    }
                },
            }
        }
        targets
    }

    async fn enumerate(&self, prefix: &str) -> Result<Vec<String>, ItemError> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = with_retry(self.retry, prefix, || {
                self.logs.describe_log_groups(prefix, next_token.clone())
            })
            .await?;
            names.extend(
                page.names
                    .into_iter()
                    .filter(|name| self.own_log_group.as_deref() != Some(name.as_str())),
            );
            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }
        debug!(prefix = %prefix, groups = names.len(), "enumerated log groups");
        Ok(names)
    }
}
