use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapters::log_groups::LogGroupApi;
use crate::adapters::secret_store::SecretStore;
use crate::engine::reconciler::{Reconciler, ReconciliationResult, SubscriptionChanges, UpdateReport};
use crate::engine::resolver::Resolver;
use crate::engine::secret_versions::SecretVersionDiffer;
use crate::runtime::arn::log_group_for_arn;
use crate::runtime::config::Config;
use crate::runtime::diff::diff;
use crate::runtime::error::{
    AggregatedError, ApiError, ClassificationError, ConfigError, SecretError,
};
use crate::runtime::event::{classify, Intent, SelectorSet};
use crate::runtime::selector::{references_same_secret, service_names, Selector};

/// Collaborators and configuration for one invocation.
#[derive(Clone)]
pub struct EngineContext {
    pub config: Config,
    pub logs: Arc<dyn LogGroupApi>,
    pub secrets: Arc<dyn SecretStore>,
}

impl EngineContext {
    pub fn new(config: Config, logs: Arc<dyn LogGroupApi>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            config,
            logs,
            secrets,
        }
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(
            self.logs.clone(),
            self.secrets.clone(),
            self.config.own_log_group.clone(),
        )
        .with_retry_policy(self.config.retry)
    }

    /// Validates the configured filter pattern before any filter is written.
    async fn reconciler(&self) -> Result<Reconciler, HandlerError> {
        let reconciler = Reconciler::new(self.logs.clone(), &self.config);
        reconciler.validate_filter_pattern().await?;
        Ok(reconciler)
    }
}

/// Terminal failure of an invocation. Per-item failures never end up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("failed to check subscription filters of {log_group}: {source}")]
    Api { log_group: String, source: ApiError },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub status: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub failures: Vec<String>,
}

impl Outcome {
    fn skipped(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        info!(reason = %reason, "event skipped");
        Self {
            status: format!("skipped: {reason}"),
            ..Self::default()
        }
    }

    fn handled(event_name: &str, report: UpdateReport, mut failures: AggregatedError) -> Self {
        failures.merge_new(report.failures());
        for failure in failures.failures() {
            warn!(item = %failure.item, error = %failure.error, "item failed during reconciliation");
        }

        let mut added = report.added.succeeded;
        let mut removed = report.removed.succeeded;
        added.sort();
        removed.sort();

        info!(
            event = %event_name,
            added = added.len(),
            removed = removed.len(),
            failed = failures.len(),
            "event handled"
        );
        Self {
            status: format!("{event_name} event handled successfully"),
            added,
            removed,
            failures: failures
                .failures()
                .iter()
                .map(|failure| format!("{}: {}", failure.item, failure.error))
                .collect(),
        }
    }
}

/// Classifies one inbound envelope and applies the resulting intent.
pub async fn handle_event(ctx: &EngineContext, event: &Value) -> Result<Outcome, HandlerError> {
    debug!(event = %event, "received event");
    let classified = classify(event)?;
    info!(event = %classified.event_name, "event classified");
    let event_name = classified.event_name.as_str();

    match classified.intent {
        Intent::LogGroupCreated { log_group } => {
            handle_log_group_created(ctx, event_name, &log_group).await
        }
        Intent::SecretValueChanged { secret_id } => {
            handle_secret_changed(ctx, event_name, &secret_id).await
        }
        Intent::ResourceTagged { resource_arn, tags } => {
            handle_resource_tagged(ctx, event_name, &resource_arn, tags.as_ref()).await
        }
        Intent::Subscribe(selectors) => {
            let changes = SubscriptionChanges {
                services_to_add: selectors.services,
                custom_to_add: selectors.custom,
                ..SubscriptionChanges::default()
            };
            apply_changes(ctx, event_name, &changes, AggregatedError::new()).await
        }
        Intent::Resubscribe { old, new } => handle_resubscribe(ctx, event_name, &old, &new).await,
        Intent::Unsubscribe(selectors) => {
            let changes = SubscriptionChanges {
                services_to_remove: selectors.services,
                custom_to_remove: selectors.custom,
                ..SubscriptionChanges::default()
            };
            apply_changes(ctx, event_name, &changes, AggregatedError::new()).await
        }
    }
}

async fn handle_log_group_created(
    ctx: &EngineContext,
    event_name: &str,
    log_group: &str,
) -> Result<Outcome, HandlerError> {
    if ctx.config.is_own_log_group(log_group) {
        return Ok(Outcome::skipped(format!("{log_group} is this function's own log group")));
    }

    let selectors: Vec<Selector> = ctx
        .config
        .services
        .iter()
        .chain(&ctx.config.custom_groups)
        .cloned()
        .collect();
    if !ctx.resolver().covers(&selectors, log_group).await {
        return Ok(Outcome::skipped(format!(
            "log group {log_group} does not match any configured service or custom group"
        )));
    }

    let added = ctx.reconciler().await?.add(&[log_group.to_string()]).await;
    Ok(single_add(event_name, added))
}

async fn handle_secret_changed(
    ctx: &EngineContext,
    event_name: &str,
    secret_id: &str,
) -> Result<Outcome, HandlerError> {
    let configured = ctx.config.custom_groups_secret.as_deref().unwrap_or_default();
    if !references_same_secret(configured, secret_id) {
        return Ok(Outcome::skipped(format!(
            "secret {secret_id} does not hold the custom log groups"
        )));
    }

    let delta = SecretVersionDiffer::new(ctx.secrets.clone())
        .diff_secret_versions(configured)
        .await?;
    if delta.is_empty() {
        return Ok(Outcome::skipped(format!(
            "custom log groups in {secret_id} did not change"
        )));
    }

    let changes = SubscriptionChanges {
        custom_to_add: delta.to_add.iter().map(|token| Selector::custom(token)).collect(),
        custom_to_remove: delta
            .to_remove
            .iter()
            .map(|token| Selector::custom(token))
            .collect(),
        keep: vec![Selector::SecretRef(configured.to_string())],
        ..SubscriptionChanges::default()
    };
    apply_changes(ctx, event_name, &changes, AggregatedError::new()).await
}

async fn handle_resource_tagged(
    ctx: &EngineContext,
    event_name: &str,
    resource_arn: &str,
    tags: Option<&Value>,
) -> Result<Outcome, HandlerError> {
    if !ctx.config.tag_reconciliation_enabled {
        return Ok(Outcome::skipped("tag reconciliation is disabled"));
    }
    if !ctx.config.monitoring_tag.is_present(tags) {
        return Ok(Outcome::skipped(format!(
            "{resource_arn} does not carry the {}={} tag",
            ctx.config.monitoring_tag.key, ctx.config.monitoring_tag.value
        )));
    }

    let log_group = log_group_for_arn(resource_arn)?;
    if ctx.config.is_own_log_group(&log_group) {
        return Ok(Outcome::skipped(format!("{log_group} is this function's own log group")));
    }

    let reconciler = ctx.reconciler().await?;
    let subscribed = reconciler
        .has_filter(&log_group)
        .await
        .map_err(|source| HandlerError::Api {
            log_group: log_group.clone(),
            source,
        })?;
    if subscribed {
        return Ok(Outcome::skipped(format!(
            "{log_group} already has a subscription filter"
        )));
    }

    let added = reconciler.add(&[log_group]).await;
    Ok(single_add(event_name, added))
}

async fn handle_resubscribe(
    ctx: &EngineContext,
    event_name: &str,
    old: &SelectorSet,
    new: &SelectorSet,
) -> Result<Outcome, HandlerError> {
    let services = diff(&service_names(&old.services), &service_names(&new.services));

    let resolver = ctx.resolver();
    let old_custom = resolver.resolve(&old.custom).await;
    let new_custom = resolver.resolve(&new.custom).await;
    let custom = diff(&old_custom.groups, &new_custom.groups);

    let mut failures = old_custom.errors;
    failures.merge(new_custom.errors);

    let changes = SubscriptionChanges {
        services_to_add: services.to_add.into_iter().map(Selector::NamedService).collect(),
        services_to_remove: services
            .to_remove
            .into_iter()
            .map(Selector::NamedService)
            .collect(),
        custom_to_add: custom.to_add.into_iter().map(Selector::LiteralGroup).collect(),
        custom_to_remove: custom
            .to_remove
            .into_iter()
            .map(Selector::LiteralGroup)
            .collect(),
        keep: new.all(),
    };
    apply_changes(ctx, event_name, &changes, failures).await
}

async fn apply_changes(
    ctx: &EngineContext,
    event_name: &str,
    changes: &SubscriptionChanges,
    failures: AggregatedError,
) -> Result<Outcome, HandlerError> {
    let reconciler = ctx.reconciler().await?;
    let report = reconciler
        .update_subscription_filters(&ctx.resolver(), changes)
        .await;
    Ok(Outcome::handled(event_name, report, failures))
}

fn single_add(event_name: &str, added: ReconciliationResult) -> Outcome {
    let report = UpdateReport {
        added,
        removed: ReconciliationResult::default(),
    };
    Outcome::handled(event_name, report, AggregatedError::new())
}
