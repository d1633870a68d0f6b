use std::time::Duration;

use crate::arn::function_log_group;
use crate::error::ConfigError;
use crate::selector::{parse_custom_groups, parse_services, Selector};
use crate::tags::{MonitoringTag, DEFAULT_MONITORING_TAG_KEY, DEFAULT_MONITORING_TAG_VALUE};

pub const ENV_DESTINATION_ARN: &str = "FIREHOSE_ARN";
pub const ENV_ACCOUNT_ID: &str = "ACCOUNT_ID";
pub const ENV_AWS_PARTITION: &str = "AWS_PARTITION";
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_PUT_SUBSCRIPTION_FILTER_ROLE: &str = "PUT_SF_ROLE";
pub const ENV_STACK_NAME: &str = "STACK_NAME";
pub const ENV_FILTER_PATTERN: &str = "FILTER_PATTERN";
pub const ENV_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
pub const ENV_SERVICES: &str = "SERVICES";
pub const ENV_CUSTOM_GROUPS: &str = "CUSTOM_GROUPS";
pub const ENV_SECRET_ENABLED: &str = "SECRET_ENABLED";
pub const ENV_MONITORING_TAG_KEY: &str = "MONITORING_TAG_KEY";
pub const ENV_MONITORING_TAG_VALUE: &str = "MONITORING_TAG_VALUE";
pub const ENV_TAG_RECONCILIATION_ENABLED: &str = "TAG_RECONCILIATION_ENABLED";

pub const SUBSCRIPTION_FILTER_NAME: &str = "logzio_firehose";
pub const FILTER_PATTERN_SAMPLE_MESSAGE: &str =
    "{\"level\":\"INFO\",\"message\":\"subscription filter pattern validation\"}";
pub const MAX_RETRIES: u32 = 10;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Retry-on-throttle policy: attempt `n` (starting at 0) sleeps `unit * n²`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(attempt.saturating_mul(attempt))
    }
}

/// Everything a put/delete-filter call needs besides the log group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSettings {
    pub destination_arn: String,
    pub role_arn: Option<String>,
    pub filter_name: String,
    pub filter_pattern: Option<String>,
}

impl FilterSettings {
    pub fn pattern_or_empty(&self) -> &str {
        self.filter_pattern.as_deref().unwrap_or_default()
    }
}

/// Invocation configuration. Built once, validated eagerly, immutable after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub account_id: String,
    pub partition: String,
    pub region: String,
    pub filter: FilterSettings,
    pub own_log_group: Option<String>,
    pub services: Vec<Selector>,
    pub custom_groups: Vec<Selector>,
    pub custom_groups_secret: Option<String>,
    pub monitoring_tag: MonitoringTag,
    pub tag_reconciliation_enabled: bool,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));

        let destination_arn = required(ENV_DESTINATION_ARN)?;
        let account_id = required(ENV_ACCOUNT_ID)?;
        let partition = required(ENV_AWS_PARTITION)?;

        let filter_name = match value(ENV_STACK_NAME) {
            Some(stack) => format!("{SUBSCRIPTION_FILTER_NAME}_{stack}"),
            None => SUBSCRIPTION_FILTER_NAME.to_string(),
        };

        let secret_enabled = value(ENV_SECRET_ENABLED)
            .map(|raw| is_true(&raw))
            .unwrap_or(false);
        let custom_raw = value(ENV_CUSTOM_GROUPS).unwrap_or_default();
        let custom_groups_secret = if secret_enabled && !custom_raw.is_empty() {
            Some(custom_raw.clone())
        } else {
            None
        };

        Ok(Self {
            account_id,
            partition,
            region: value(ENV_AWS_REGION).unwrap_or_default(),
            filter: FilterSettings {
                destination_arn,
                role_arn: value(ENV_PUT_SUBSCRIPTION_FILTER_ROLE),
                filter_name,
                filter_pattern: value(ENV_FILTER_PATTERN),
            },
            own_log_group: value(ENV_FUNCTION_NAME).map(|name| function_log_group(&name)),
            services: parse_services(&value(ENV_SERVICES).unwrap_or_default()),
            custom_groups: parse_custom_groups(&custom_raw, secret_enabled),
            custom_groups_secret,
            monitoring_tag: MonitoringTag {
                key: value(ENV_MONITORING_TAG_KEY)
                    .unwrap_or_else(|| DEFAULT_MONITORING_TAG_KEY.to_string()),
                value: value(ENV_MONITORING_TAG_VALUE)
                    .unwrap_or_else(|| DEFAULT_MONITORING_TAG_VALUE.to_string()),
            },
            tag_reconciliation_enabled: value(ENV_TAG_RECONCILIATION_ENABLED)
                .map(|raw| is_true(&raw))
                .unwrap_or(false),
            retry: RetryPolicy::default(),
        })
    }

    pub fn is_own_log_group(&self, log_group: &str) -> bool {
        self.own_log_group.as_deref() == Some(log_group)
    }
}

pub fn is_true(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_DESTINATION_ARN, "arn:aws:firehose:us-east-1:1:deliverystream/logs"),
            (ENV_ACCOUNT_ID, "123456789012"),
            (ENV_AWS_PARTITION, "aws"),
        ]
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup(&required())).expect("config should load");

        assert_eq!(config.filter.filter_name, "logzio_firehose");
        assert_eq!(config.filter.role_arn, None);
        assert_eq!(config.filter.filter_pattern, None);
        assert_eq!(config.own_log_group, None);
        assert!(config.services.is_empty());
        assert!(config.custom_groups.is_empty());
        assert_eq!(config.monitoring_tag, MonitoringTag::default());
        assert!(!config.tag_reconciliation_enabled);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn each_required_value_is_fatal_when_missing() {
        for missing in [ENV_DESTINATION_ARN, ENV_ACCOUNT_ID, ENV_AWS_PARTITION] {
            let pairs: Vec<_> = required()
                .into_iter()
                .filter(|(key, _)| *key != missing)
                .collect();
            assert_eq!(
                Config::from_lookup(lookup(&pairs)),
                Err(ConfigError::Missing(missing))
            );
        }
    }

    #[test]
    fn blank_required_value_counts_as_missing() {
        let mut pairs = required();
        pairs[2] = (ENV_AWS_PARTITION, "  ");
        assert_eq!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Missing(ENV_AWS_PARTITION))
        );
    }

    #[test]
    fn full_config_is_parsed() {
        let mut pairs = required();
        pairs.extend([
            (ENV_PUT_SUBSCRIPTION_FILTER_ROLE, "arn:aws:iam::1:role/put"),
            (ENV_STACK_NAME, "shipper"),
            (ENV_FILTER_PATTERN, "ERROR"),
            (ENV_FUNCTION_NAME, "log-group-events"),
            (ENV_SERVICES, "rds, lambda"),
            (ENV_CUSTOM_GROUPS, "app/one, app/batch*"),
            (ENV_MONITORING_TAG_KEY, "ship"),
            (ENV_MONITORING_TAG_VALUE, "yes"),
            (ENV_TAG_RECONCILIATION_ENABLED, "TRUE"),
        ]);

        let config = Config::from_lookup(lookup(&pairs)).expect("config should load");

        assert_eq!(config.filter.filter_name, "logzio_firehose_shipper");
        assert_eq!(config.filter.pattern_or_empty(), "ERROR");
        assert_eq!(
            config.own_log_group.as_deref(),
            Some("/aws/lambda/log-group-events")
        );
        assert!(config.is_own_log_group("/aws/lambda/log-group-events"));
        assert_eq!(
            config.services,
            vec![
                Selector::NamedService("rds".to_string()),
                Selector::NamedService("lambda".to_string()),
            ]
        );
        assert_eq!(
            config.custom_groups,
            vec![
                Selector::LiteralGroup("app/one".to_string()),
                Selector::WildcardGroup("app/batch".to_string()),
            ]
        );
        assert_eq!(config.custom_groups_secret, None);
        assert_eq!(config.monitoring_tag.key, "ship");
        assert!(config.tag_reconciliation_enabled);
    }

    #[test]
    fn secret_enabled_turns_custom_groups_into_secret_ref() {
        let mut pairs = required();
        pairs.extend([
            (ENV_SECRET_ENABLED, "true"),
            (ENV_CUSTOM_GROUPS, "arn:aws:secretsmanager:us-east-1:1:secret:groups-AbC123"),
        ]);

        let config = Config::from_lookup(lookup(&pairs)).expect("config should load");
        assert_eq!(
            config.custom_groups,
            vec![Selector::SecretRef(
                "arn:aws:secretsmanager:us-east-1:1:secret:groups-AbC123".to_string()
            )]
        );
        assert_eq!(
            config.custom_groups_secret.as_deref(),
            Some("arn:aws:secretsmanager:us-east-1:1:secret:groups-AbC123")
        );
    }

    #[test]
    fn retry_delay_is_quadratic() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(9));
        assert!(policy.can_retry(9));
        assert!(!policy.can_retry(10));
    }
}
