use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::adapters::log_groups::{LogGroupApi, PutFilterRequest};
use crate::engine::batch::fan_out;
use crate::engine::resolver::{Resolution, Resolver};
use crate::engine::retry::with_retry;
use crate::runtime::config::{Config, FilterSettings, RetryPolicy, FILTER_PATTERN_SAMPLE_MESSAGE};
use crate::runtime::error::{AggregatedError, ApiError, ConfigError};
use crate::runtime::selector::Selector;

/// What one add or remove batch achieved. `succeeded` has no defined order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub succeeded: Vec<String>,
    pub failed: AggregatedError,
}

/// Selector quadruple applied by `update_subscription_filters`.
///
/// `keep` names the full desired configuration. A group a removal expands
/// onto is left alone while `keep`, or the add half, still covers it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionChanges {
    pub services_to_add: Vec<Selector>,
    pub services_to_remove: Vec<Selector>,
    pub custom_to_add: Vec<Selector>,
    pub custom_to_remove: Vec<Selector>,
    pub keep: Vec<Selector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub added: ReconciliationResult,
    pub removed: ReconciliationResult,
}

impl UpdateReport {
    pub fn failures(&self) -> AggregatedError {
        let mut failures = self.added.failed.clone();
        failures.merge(self.removed.failed.clone());
        failures
    }
}

#[derive(Clone)]
pub struct Reconciler {
    logs: Arc<dyn LogGroupApi>,
    filter: FilterSettings,
    own_log_group: Option<String>,
    retry: RetryPolicy,
}

impl Reconciler {
    pub fn new(logs: Arc<dyn LogGroupApi>, config: &Config) -> Self {
        Self {
            logs,
            filter: config.filter.clone(),
            own_log_group: config.own_log_group.clone(),
            retry: config.retry,
        }
    }

    /// Checks a configured filter pattern once against the log API.
    pub async fn validate_filter_pattern(&self) -> Result<(), ConfigError> {
        let Some(pattern) = self.filter.filter_pattern.as_deref() else {
            return Ok(());
        };
        self.logs
            .test_filter_pattern(pattern, FILTER_PATTERN_SAMPLE_MESSAGE)
            .await
            .map_err(|error| ConfigError::InvalidFilterPattern {
                pattern: pattern.to_string(),
                reason: error.message,
            })
    }

    /// Puts the subscription filter on every group. The own log group is
    /// dropped before any call is made.
    pub async fn add(&self, groups: &[String]) -> ReconciliationResult {
        let targets: Vec<String> = unique(groups)
            .into_iter()
            .filter(|group| {
                let own = self.own_log_group.as_deref() == Some(group.as_str());
                if own {
                    debug!(log_group = %group, "skipping own log group");
                }
                !own
            })
            .collect();

        let result = self
            .run_batch(targets, |reconciler, log_group| async move {
                let request = reconciler.put_request(&log_group);
                with_retry(reconciler.retry, &log_group, || {
                    reconciler.logs.put_subscription_filter(request.clone())
                })
                .await
            })
            .await;
        info!(
            added = result.succeeded.len(),
            failed = result.failed.len(),
            "subscription filters added"
        );
        result
    }

    pub async fn remove(&self, groups: &[String]) -> ReconciliationResult {
        let result = self
            .run_batch(unique(groups), |reconciler, log_group| async move {
                with_retry(reconciler.retry, &log_group, || {
                    reconciler
                        .logs
                        .delete_subscription_filter(&log_group, &reconciler.filter.filter_name)
                })
                .await
            })
            .await;
        info!(
            removed = result.succeeded.len(),
            failed = result.failed.len(),
            "subscription filters removed"
        );
        result
    }

    /// True only when a filter on `log_group` already points at the
    /// configured destination. A missing group has no filter.
    pub async fn has_filter(&self, log_group: &str) -> Result<bool, ApiError> {
        match self.logs.describe_subscription_filters(log_group).await {
            Ok(filters) => Ok(filters
                .iter()
                .any(|filter| filter.destination_arn == self.filter.destination_arn)),
            Err(error) if error.is_not_found() => {
                debug!(log_group = %log_group, "log group not found while checking filters");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// Resolves both halves first, then adds, then removes whatever the
    /// desired selectors no longer cover. Neither phase short-circuits the
    /// other, and a group under a prefix that failed to resolve is never
    /// removed.
    pub async fn update_subscription_filters(
        &self,
        resolver: &Resolver,
        changes: &SubscriptionChanges,
    ) -> UpdateReport {
        let additions = resolve_phase(
            resolver,
            &changes.services_to_add,
            &changes.custom_to_add,
            Phase::Add,
        )
        .await;
        let removals = resolve_phase(
            resolver,
            &changes.services_to_remove,
            &changes.custom_to_remove,
            Phase::Remove,
        )
        .await;
        let retained = if changes.keep.is_empty() || removals.groups.is_empty() {
            Resolution::default()
        } else {
            resolver.resolve(&changes.keep).await
        };

        let (to_remove, still_covered): (Vec<String>, Vec<String>) = removals
            .groups
            .iter()
            .cloned()
            .partition(|group| !additions.may_cover(group) && !retained.may_cover(group));
        if !still_covered.is_empty() {
            info!(groups = ?still_covered, "keeping groups the desired selectors still cover");
        }

        let mut added = self.apply(Phase::Add, &additions.groups).await;
        added.failed.merge(additions.errors);
        added.failed.merge_new(retained.errors);
        let mut removed = self.apply(Phase::Remove, &to_remove).await;
        removed.failed.merge(removals.errors);
        UpdateReport { added, removed }
    }

    async fn apply(&self, phase: Phase, groups: &[String]) -> ReconciliationResult {
        if groups.is_empty() {
            debug!(phase = phase.label(), "no log groups to apply");
            return ReconciliationResult::default();
        }
        match phase {
            Phase::Add => self.add(groups).await,
            Phase::Remove => self.remove(groups).await,
        }
    }

    async fn run_batch<F, Fut>(&self, groups: Vec<String>, op: F) -> ReconciliationResult
    where
        F: Fn(Reconciler, String) -> Fut,
        Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        let results = fan_out(groups, |log_group| {
            let work = op(self.clone(), log_group);
            async move { work.await.map_err(Into::into) }
        })
        .await;

        let mut outcome = ReconciliationResult::default();
        for (log_group, result) in results {
            match result {
                Ok(()) => outcome.succeeded.push(log_group),
                Err(cause) => {
                    error!(log_group = %log_group, error = %cause, "subscription filter change failed");
                    outcome.failed.push(log_group, cause);
                }
            }
        }
        outcome
    }

    fn put_request(&self, log_group: &str) -> PutFilterRequest {
        PutFilterRequest {
            log_group: log_group.to_string(),
            filter_name: self.filter.filter_name.clone(),
            filter_pattern: self.filter.pattern_or_empty().to_string(),
            destination_arn: self.filter.destination_arn.clone(),
            role_arn: self.filter.role_arn.clone(),
        }
    }
}

async fn resolve_phase(
    resolver: &Resolver,
    services: &[Selector],
    custom: &[Selector],
    phase: Phase,
) -> Resolution {
    let selectors: Vec<Selector> = services.iter().chain(custom).cloned().collect();
    if selectors.is_empty() {
        debug!(phase = phase.label(), "no selectors to resolve");
        return Resolution::default();
    }
    resolver.resolve(&selectors).await
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Add,
    Remove,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

fn unique(groups: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .filter(|group| seen.insert(group.as_str()))
        .cloned()
        .collect()
}
