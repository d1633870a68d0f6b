use serde_json::Value;

use crate::error::SecretError;
use crate::services::service_prefix;

pub const VALUES_SEPARATOR: char = ',';
pub const WILDCARD_MARKER: char = '*';
pub const CUSTOM_GROUPS_SECRET_KEY: &str = "logzioCustomLogGroups";

/// A logical reference that resolves to zero or more concrete log groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    NamedService(String),
    LiteralGroup(String),
    /// Holds the prefix with the wildcard marker already stripped.
    WildcardGroup(String),
    SecretRef(String),
}

impl Selector {
    /// Parses one custom-group token: a trailing `*` makes it a wildcard.
    pub fn custom(token: &str) -> Self {
        match token.strip_suffix(WILDCARD_MARKER) {
            Some(prefix) => Self::WildcardGroup(prefix.to_string()),
            None => Self::LiteralGroup(token.to_string()),
        }
    }

    /// Whether a newly created log group is covered by this selector without
    /// enumerating anything. `SecretRef` never matches directly; expand it first.
    pub fn matches_group(&self, log_group: &str) -> bool {
        match self {
            Self::NamedService(name) => service_prefix(name)
                .map(|prefix| log_group.starts_with(prefix))
                .unwrap_or(false),
            Self::LiteralGroup(name) => name == log_group,
            Self::WildcardGroup(prefix) => log_group.starts_with(prefix.as_str()),
            Self::SecretRef(_) => false,
        }
    }
}

/// Splits a comma-separated configuration value into trimmed, non-empty tokens.
pub fn split_values(raw: &str) -> Vec<String> {
    raw.split(VALUES_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_services(raw: &str) -> Vec<Selector> {
    split_values(raw)
        .into_iter()
        .map(Selector::NamedService)
        .collect()
}

/// Parses the custom-group setting. When `is_secret` is set the whole value is
/// the identifier of a secret holding the actual list.
pub fn parse_custom_groups(raw: &str, is_secret: bool) -> Vec<Selector> {
    if is_secret {
        let identifier = raw.trim();
        if identifier.is_empty() {
            return Vec::new();
        }
        return vec![Selector::SecretRef(identifier.to_string())];
    }

    split_values(raw)
        .iter()
        .map(|token| Selector::custom(token))
        .collect()
}

pub fn service_names(selectors: &[Selector]) -> Vec<String> {
    selectors
        .iter()
        .filter_map(|selector| match selector {
            Selector::NamedService(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Extracts the custom group list from a secret's JSON string value.
pub fn extract_custom_groups(secret_id: &str, secret_string: &str) -> Result<String, SecretError> {
    let parsed: Value =
        serde_json::from_str(secret_string).map_err(|error| SecretError::MalformedValue {
            secret: secret_id.to_string(),
            reason: error.to_string(),
        })?;

    let Some(object) = parsed.as_object() else {
        return Err(SecretError::MalformedValue {
            secret: secret_id.to_string(),
            reason: "expected a JSON object".to_string(),
        });
    };

    match object.get(CUSTOM_GROUPS_SECRET_KEY) {
        Some(Value::String(groups)) => Ok(groups.clone()),
        Some(_) => Err(SecretError::MalformedValue {
            secret: secret_id.to_string(),
            reason: format!("{CUSTOM_GROUPS_SECRET_KEY} must be a string"),
        }),
        None => Err(SecretError::MissingKey {
            secret: secret_id.to_string(),
            key: CUSTOM_GROUPS_SECRET_KEY,
        }),
    }
}

/// Secret name without the ARN prefix and the random 6-character suffix
/// the secret store appends to every secret ARN.
pub fn secret_name(identifier: &str) -> &str {
    let Some((_, resource)) = identifier
        .strip_prefix("arn:")
        .and_then(|rest| rest.split_once(":secret:"))
    else {
        return identifier;
    };

    match resource.rsplit_once('-') {
        Some((name, suffix))
            if suffix.len() == 6 && suffix.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            name
        }
        _ => resource,
    }
}

pub fn references_same_secret(left: &str, right: &str) -> bool {
    !left.trim().is_empty() && secret_name(left.trim()) == secret_name(right.trim())
}
