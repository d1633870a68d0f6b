use std::fmt;

/// Error classes surfaced by the log-group and secret-store collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Throttled,
    NotFound,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Throttled, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Other, message)
    }

    pub fn is_throttled(&self) -> bool {
        self.kind == ApiErrorKind::Throttled
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("filter pattern '{pattern}' was rejected: {reason}")]
    InvalidFilterPattern { pattern: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("unsupported event")]
    UnsupportedEvent,

    #[error("unsupported event '{0}'")]
    UnsupportedEventName(String),

    #[error("`{field}` is not of type {expected} or missing from the {event} event")]
    MissingField {
        event: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("unsupported subscription filter action '{0}'")]
    UnsupportedAction(String),

    #[error("invalid configuration type for {0}; expected string")]
    InvalidConfigurationValue(String),

    #[error("malformed resource ARN '{0}'")]
    MalformedArn(String),

    #[error("unsupported resource type '{resource_type}' in ARN '{arn}'")]
    UnsupportedResource { arn: String, resource_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("secret store request failed: {0}")]
    Api(#[from] ApiError),

    #[error("secret {0} has no string value")]
    MissingSecretString(String),

    #[error("secret {secret} is not a JSON object: {reason}")]
    MalformedValue { secret: String, reason: String },

    #[error("did not find {key} key in the secret {secret}")]
    MissingKey { secret: String, key: &'static str },

    #[error("secret {0} doesn't have an older version")]
    NoPreviousVersion(String),
}

/// Why a single log group (or selector) could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("task ended before reporting a result")]
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item: String,
    pub error: ItemError,
}

/// Per-item failures collected across a fan-out. Empty means every item
/// succeeded; entries keep the order in which they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedError {
    failures: Vec<ItemFailure>,
}

impl AggregatedError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: impl Into<String>, error: impl Into<ItemError>) {
        self.failures.push(ItemFailure {
            item: item.into(),
            error: error.into(),
        });
    }

    pub fn merge(&mut self, other: AggregatedError) {
        self.failures.extend(other.failures);
    }

    /// Appends only entries whose item is not already recorded.
    pub fn merge_new(&mut self, other: AggregatedError) {
        for failure in other.failures {
            if !self.failures.iter().any(|known| known.item == failure.item) {
                self.failures.push(failure);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    pub fn items(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|failure| failure.item.as_str())
            .collect()
    }

    pub fn into_result(self) -> Result<(), AggregatedError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.item, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedError {}
