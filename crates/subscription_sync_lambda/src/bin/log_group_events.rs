use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, ProvideErrorMetadata};
use chrono::DateTime;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use subscription_sync_lambda::adapters::log_groups::{
    LogGroupApi, LogGroupPage, PutFilterRequest, SubscriptionFilter,
};
use subscription_sync_lambda::adapters::secret_store::{SecretStore, SecretVersion};
use subscription_sync_lambda::handlers::dispatch::{handle_event, EngineContext};
use subscription_sync_lambda::runtime::config::Config;
use subscription_sync_lambda::runtime::error::{ApiError, ApiErrorKind};
use subscription_sync_lambda::telemetry::init_tracing;
use tracing::error;

struct CloudWatchLogGroups {
    client: aws_sdk_cloudwatchlogs::Client,
}

#[async_trait]
impl LogGroupApi for CloudWatchLogGroups {
    async fn describe_log_groups(
        &self,
        prefix: &str,
        next_token: Option<String>,
    ) -> Result<LogGroupPage, ApiError> {
        let output = self
            .client
            .describe_log_groups()
            .log_group_name_prefix(prefix)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(api_error)?;

        Ok(LogGroupPage {
            names: output
                .log_groups()
                .iter()
                .filter_map(|group| group.log_group_name().map(str::to_string))
                .collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn put_subscription_filter(&self, request: PutFilterRequest) -> Result<(), ApiError> {
        self.client
            .put_subscription_filter()
            .log_group_name(request.log_group)
            .filter_name(request.filter_name)
            .filter_pattern(request.filter_pattern)
            .destination_arn(request.destination_arn)
            .set_role_arn(request.role_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(api_error)
    }

    async fn delete_subscription_filter(
        &self,
        log_group: &str,
        filter_name: &str,
    ) -> Result<(), ApiError> {
        self.client
            .delete_subscription_filter()
            .log_group_name(log_group)
            .filter_name(filter_name)
            .send()
            .await
            .map(|_| ())
            .map_err(api_error)
    }

    async fn describe_subscription_filters(
        &self,
        log_group: &str,
    ) -> Result<Vec<SubscriptionFilter>, ApiError> {
        let mut filters = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .describe_subscription_filters()
                .log_group_name(log_group)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(api_error)?;
            filters.extend(output.subscription_filters().iter().map(|filter| {
                SubscriptionFilter {
                    filter_name: filter.filter_name().unwrap_or_default().to_string(),
                    destination_arn: filter.destination_arn().unwrap_or_default().to_string(),
                }
            }));
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => return Ok(filters),
            }
        }
    }

    async fn test_filter_pattern(&self, pattern: &str, sample: &str) -> Result<(), ApiError> {
        self.client
            .test_metric_filter()
            .filter_pattern(pattern)
            .log_event_messages(sample)
            .send()
            .await
            .map(|_| ())
            .map_err(api_error)
    }
}

struct SecretsManagerStore {
    client: aws_sdk_secretsmanager::Client,
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret_string(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(api_error)?;
        Ok(output.secret_string().map(str::to_string))
    }

    async fn list_secret_versions(&self, secret_id: &str) -> Result<Vec<SecretVersion>, ApiError> {
        let mut versions = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .list_secret_version_ids()
                .secret_id(secret_id)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(api_error)?;
            versions.extend(output.versions().iter().filter_map(|entry| {
                Some(SecretVersion {
                    version_id: entry.version_id()?.to_string(),
                    created_at: entry.created_date().and_then(|created| {
                        DateTime::from_timestamp(created.secs(), created.subsec_nanos())
                    }),
                })
            }));
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => return Ok(versions),
            }
        }
    }
}

fn error_kind(code: Option<&str>) -> ApiErrorKind {
    match code {
        Some("ThrottlingException") | Some("Throttling") | Some("TooManyRequestsException") => {
            ApiErrorKind::Throttled
        }
        Some("ResourceNotFoundException") => ApiErrorKind::NotFound,
        _ => ApiErrorKind::Other,
    }
}

fn api_error<E>(error: E) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = match (error.code(), error.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        _ => DisplayErrorContext(&error).to_string(),
    };
    ApiError::new(error_kind(error.code()), message)
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = Config::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let ctx = EngineContext::new(
        config,
        Arc::new(CloudWatchLogGroups {
            client: aws_sdk_cloudwatchlogs::Client::new(&aws_config),
        }),
        Arc::new(SecretsManagerStore {
            client: aws_sdk_secretsmanager::Client::new(&aws_config),
        }),
    );

    match handle_event(&ctx, &event.payload).await {
        Ok(outcome) => serde_json::to_value(outcome)
            .map_err(|error| Error::from(format!("failed to serialize outcome: {error}"))),
        Err(failure) => {
            error!(error = %failure, "invocation failed");
            Err(failure.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    lambda_runtime::run(service_fn(handle_request)).await
}
