use serde_json::Value;

pub const DEFAULT_MONITORING_TAG_KEY: &str = "logzio:logs";
pub const DEFAULT_MONITORING_TAG_VALUE: &str = "true";

/// Key/value pair a resource must carry for tag-triggered subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringTag {
    pub key: String,
    pub value: String,
}

impl Default for MonitoringTag {
    fn default() -> Self {
        Self {
            key: DEFAULT_MONITORING_TAG_KEY.to_string(),
            value: DEFAULT_MONITORING_TAG_VALUE.to_string(),
        }
    }
}

impl MonitoringTag {
    /// Case-insensitive match on both key and value. Absent or non-map tag
    /// payloads never match.
    pub fn is_present(&self, tags: Option<&Value>) -> bool {
        let Some(Value::Object(tags)) = tags else {
            return false;
        };

        tags.iter().any(|(key, value)| {
            key.eq_ignore_ascii_case(&self.key)
                && value
                    .as_str()
                    .map(|value| value.eq_ignore_ascii_case(&self.value))
                    .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn matches_key_and_value_ignoring_case() {
        let tag = MonitoringTag::default();
        let tags = json!({"Team": "core", "LOGZIO:LOGS": "True"});
        assert!(tag.is_present(Some(&tags)));
    }

    #[test]
    fn value_mismatch_does_not_match() {
        let tag = MonitoringTag::default();
        assert!(!tag.is_present(Some(&json!({"logzio:logs": "false"}))));
        assert!(!tag.is_present(Some(&json!({"logzio:logs": true}))));
    }

    #[test]
    fn absent_or_non_map_tags_never_match() {
        let tag = MonitoringTag::default();
        assert!(!tag.is_present(None));
        assert!(!tag.is_present(Some(&Value::Null)));
        assert!(!tag.is_present(Some(&json!(["logzio:logs", "true"]))));
        assert!(!tag.is_present(Some(&json!("logzio:logs=true"))));
    }

    #[test]
    fn custom_tag_pair_is_honoured() {
        let tag = MonitoringTag {
            key: "ship-logs".to_string(),
            value: "yes".to_string(),
        };
        assert!(tag.is_present(Some(&json!({"Ship-Logs": "YES"}))));
        assert!(!tag.is_present(Some(&json!({"logzio:logs": "true"}))));
    }
}
