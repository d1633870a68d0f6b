use async_trait::async_trait;

use crate::runtime::error::ApiError;

/// One page of a prefix enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogGroupPage {
    pub names: Vec<String>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutFilterRequest {
    pub log_group: String,
    pub filter_name: String,
    pub filter_pattern: String,
    pub destination_arn: String,
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub filter_name: String,
    pub destination_arn: String,
}

/// Log-group API surface the engine depends on. Implementations must report
/// throttling and missing resources through `ApiErrorKind`.
#[async_trait]
pub trait LogGroupApi: Send + Sync {
    async fn describe_log_groups(
        &self,
        prefix: &str,
        next_token: Option<String>,
    ) -> Result<LogGroupPage, ApiError>;

    async fn put_subscription_filter(&self, request: PutFilterRequest) -> Result<(), ApiError>;

    async fn delete_subscription_filter(
        &self,
        log_group: &str,
        filter_name: &str,
    ) -> Result<(), ApiError>;

    async fn describe_subscription_filters(
        &self,
        log_group: &str,
    ) -> Result<Vec<SubscriptionFilter>, ApiError>;

    async fn test_filter_pattern(&self, pattern: &str, sample: &str) -> Result<(), ApiError>;
}
