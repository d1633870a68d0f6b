use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::is_true;
use crate::error::ClassificationError;
use crate::selector::{parse_custom_groups, parse_services, Selector};

pub const CREATE_LOG_GROUP_EVENT: &str = "CreateLogGroup";
pub const PUT_SECRET_VALUE_EVENT: &str = "PutSecretValue";
pub const SUBSCRIPTION_FILTER_EVENT: &str = "SubscriptionFilterEvent";
pub const TAG_RESOURCE_EVENT: &str = "TagResource";
pub const TAG_CHANGE_DETAIL_TYPE: &str = "Tag Change on Resource";

const SERVICES_PROPERTY: &str = "Services";
const CUSTOM_GROUPS_PROPERTY: &str = "CustomLogGroups";
const SECRET_ENABLED_PROPERTY: &str = "SecretEnabled";

/// Service and custom selectors carried by one side of a subscription request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorSet {
    pub services: Vec<Selector>,
    pub custom: Vec<Selector>,
}

impl SelectorSet {
    pub fn parse(services: &str, custom: &str, custom_is_secret: bool) -> Self {
        Self {
            services: parse_services(services),
            custom: parse_custom_groups(custom, custom_is_secret),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.custom.is_empty()
    }

    /// Services first, then custom selectors, in configuration order.
    pub fn all(&self) -> Vec<Selector> {
        self.services.iter().chain(&self.custom).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    LogGroupCreated { log_group: String },
    SecretValueChanged { secret_id: String },
    ResourceTagged {
        resource_arn: String,
        tags: Option<Value>,
    },
    Subscribe(SelectorSet),
    Resubscribe { old: SelectorSet, new: SelectorSet },
    Unsubscribe(SelectorSet),
}

/// A classified envelope. `event_name` is what status strings report.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    pub event_name: String,
    pub intent: Intent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionAction {
    Add,
    Update,
    Delete,
}

impl SubscriptionAction {
    fn parse(raw: &str) -> Result<Self, ClassificationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "add" | "create" => Ok(Self::Add),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(ClassificationError::UnsupportedAction(raw.to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SubscriptionRequest {
    #[serde(alias = "Action")]
    action: Option<String>,
    new_services: String,
    old_services: String,
    new_custom: String,
    old_custom: String,
    new_is_secret: String,
    old_is_secret: String,
}

impl SubscriptionRequest {
    fn old_selectors(&self) -> SelectorSet {
        SelectorSet::parse(
            &self.old_services,
            &self.old_custom,
            is_true(&self.old_is_secret),
        )
    }

    fn new_selectors(&self) -> SelectorSet {
        SelectorSet::parse(
            &self.new_services,
            &self.new_custom,
            is_true(&self.new_is_secret),
        )
    }
}

/// Classifies one inbound envelope into a typed intent.
///
/// Three shapes are recognised: stream events keyed by `detail.eventName`,
/// tag-change notifications keyed by `detail-type`, and stack-lifecycle
/// requests keyed by `requestType`.
pub fn classify(envelope: &Value) -> Result<ClassifiedEvent, ClassificationError> {
    let Some(root) = envelope.as_object() else {
        return Err(ClassificationError::UnsupportedEvent);
    };

    if root.get("detail-type").and_then(Value::as_str) == Some(TAG_CHANGE_DETAIL_TYPE) {
        return classify_tag_change(root);
    }
    if let Some(detail) = root.get("detail") {
        return classify_stream_event(detail);
    }
    if let Some(request_type) = field(root, &["requestType", "RequestType"]) {
        return classify_lifecycle(root, request_type);
    }

    Err(ClassificationError::UnsupportedEvent)
}

fn classify_stream_event(detail: &Value) -> Result<ClassifiedEvent, ClassificationError> {
    let detail = detail
        .as_object()
        .ok_or_else(|| missing("inbound", "detail", "object"))?;
    let event_name = detail
        .get("eventName")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("inbound", "eventName", "string"))?;
    let parameters = detail
        .get("requestParameters")
        .and_then(Value::as_object)
        .ok_or_else(|| missing(event_name, "requestParameters", "object"))?;

    let intent = match event_name {
        CREATE_LOG_GROUP_EVENT => Intent::LogGroupCreated {
            log_group: required_string(parameters, event_name, "logGroupName")?,
        },
        PUT_SECRET_VALUE_EVENT => Intent::SecretValueChanged {
            secret_id: required_string(parameters, event_name, "secretId")?,
        },
        TAG_RESOURCE_EVENT => {
            let resource_arn = field(parameters, &["resourceArn", "resource", "resourceARN"])
                .ok_or_else(|| missing(event_name, "resourceArn", "string"))?
                .to_string();
            Intent::ResourceTagged {
                resource_arn,
                tags: parameters.get("tags").cloned(),
            }
        }
        SUBSCRIPTION_FILTER_EVENT => {
            let request: SubscriptionRequest =
                serde_json::from_value(Value::Object(parameters.clone()))
                    .map_err(|_| missing(event_name, "requestParameters", "string map"))?;
            let action = request
                .action
                .as_deref()
                .ok_or_else(|| missing(event_name, "action", "string"))?;

            match SubscriptionAction::parse(action)? {
                SubscriptionAction::Add => Intent::Subscribe(request.new_selectors()),
                SubscriptionAction::Update => Intent::Resubscribe {
                    old: request.old_selectors(),
                    new: request.new_selectors(),
                },
                SubscriptionAction::Delete => Intent::Unsubscribe(request.new_selectors()),
            }
        }
        other => return Err(ClassificationError::UnsupportedEventName(other.to_string())),
    };

    Ok(ClassifiedEvent {
        event_name: event_name.to_string(),
        intent,
    })
}

fn classify_tag_change(root: &Map<String, Value>) -> Result<ClassifiedEvent, ClassificationError> {
    let resource_arn = root
        .get("resources")
        .and_then(Value::as_array)
        .and_then(|resources| resources.first())
        .and_then(Value::as_str)
        .ok_or_else(|| missing(TAG_CHANGE_DETAIL_TYPE, "resources", "non-empty string list"))?
        .to_string();
    let tags = root
        .get("detail")
        .and_then(|detail| detail.get("tags"))
        .cloned();

    Ok(ClassifiedEvent {
        event_name: TAG_CHANGE_DETAIL_TYPE.to_string(),
        intent: Intent::ResourceTagged { resource_arn, tags },
    })
}

fn classify_lifecycle(
    root: &Map<String, Value>,
    request_type: &str,
) -> Result<ClassifiedEvent, ClassificationError> {
    let action = SubscriptionAction::parse(request_type)?;
    let new = lifecycle_selectors(root, &["newConfiguration", "ResourceProperties"])?;

    let intent = match action {
        SubscriptionAction::Add => Intent::Subscribe(new),
        SubscriptionAction::Update => Intent::Resubscribe {
            old: lifecycle_selectors(root, &["oldConfiguration", "OldResourceProperties"])?,
            new,
        },
        SubscriptionAction::Delete => Intent::Unsubscribe(new),
    };

    Ok(ClassifiedEvent {
        event_name: request_type.to_string(),
        intent,
    })
}

fn lifecycle_selectors(
    root: &Map<String, Value>,
    keys: &[&str],
) -> Result<SelectorSet, ClassificationError> {
    let Some(properties) = keys
        .iter()
        .find_map(|key| root.get(*key))
        .and_then(Value::as_object)
    else {
        return Ok(SelectorSet::default());
    };

    let services = configuration_value(properties, SERVICES_PROPERTY)?;
    let custom = configuration_value(properties, CUSTOM_GROUPS_PROPERTY)?;
    let secret_enabled = configuration_value(properties, SECRET_ENABLED_PROPERTY)?;

    Ok(SelectorSet::parse(services, custom, is_true(secret_enabled)))
}

fn configuration_value<'a>(
    properties: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ClassificationError> {
    match properties.get(key) {
        None | Some(Value::Null) => Ok(""),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(ClassificationError::InvalidConfigurationValue(
            key.to_string(),
        )),
    }
}

fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
}

fn required_string(
    parameters: &Map<String, Value>,
    event_name: &str,
    key: &'static str,
) -> Result<String, ClassificationError> {
    parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(event_name, key, "string"))
}

fn missing(event: &str, field: &'static str, expected: &'static str) -> ClassificationError {
    ClassificationError::MissingField {
        event: event.to_string(),
        field,
        expected,
    }
}
