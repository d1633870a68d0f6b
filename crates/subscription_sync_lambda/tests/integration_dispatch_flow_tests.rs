use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use subscription_sync_lambda::handlers::dispatch::{handle_event, EngineContext, HandlerError};
use subscription_sync_lambda::runtime::config::Config;
use subscription_sync_lambda::runtime::error::{ApiError, ClassificationError, SecretError};
use subscription_sync_lambda::test_support::{FakeLogGroupApi, FakeSecretStore};

const DESTINATION: &str = "arn:aws:firehose:us-east-1:123456789012:deliverystream/logs";
const SECRET_ARN: &str = "arn:aws:secretsmanager:us-east-1:123456789012:secret:custom-groups-AbC123";

struct Harness {
    ctx: EngineContext,
    logs: Arc<FakeLogGroupApi>,
    secrets: Arc<FakeSecretStore>,
}

fn harness(env: &[(&str, &str)], logs: FakeLogGroupApi, secrets: FakeSecretStore) -> Harness {
    let mut pairs = vec![
        ("FIREHOSE_ARN", DESTINATION),
        ("ACCOUNT_ID", "123456789012"),
        ("AWS_PARTITION", "aws"),
        ("AWS_LAMBDA_FUNCTION_NAME", "log-group-events"),
        ("STACK_NAME", "shipper"),
    ];
    pairs.extend_from_slice(env);
    let mut config = Config::from_lookup(|key| {
        pairs
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
    })
    .expect("config should load");
    config.retry.backoff_unit = Duration::ZERO;

    let logs = Arc::new(logs);
    let secrets = Arc::new(secrets);
    Harness {
        ctx: EngineContext::new(config, logs.clone(), secrets.clone()),
        logs,
        secrets,
    }
}

fn stream_event(event_name: &str, parameters: Value) -> Value {
    json!({
        "version": "0",
        "source": "aws.logs",
        "detail-type": "AWS API Call via CloudTrail",
        "detail": {"eventName": event_name, "requestParameters": parameters},
    })
}

fn tag_change(resource: &str, tags: Value) -> Value {
    json!({
        "detail-type": "Tag Change on Resource",
        "source": "aws.tag",
        "resources": [resource],
        "detail": {"changed-tag-keys": ["logzio:logs"], "tags": tags},
    })
}

fn secret_value(groups: &str) -> String {
    format!(r#"{{"logzioCustomLogGroups": "{groups}"}}"#)
}

#[tokio::test]
async fn stack_create_subscribes_resolved_groups() {
    let h = harness(
        &[],
        FakeLogGroupApi::new().with_groups([
            "/aws/rds/a",
            "/aws/rds/b",
            "custom/x",
            "/aws/lambda/log-group-events",
        ]),
        FakeSecretStore::new(),
    );
    let event = json!({
        "RequestType": "Create",
        "ResourceProperties": {"Services": "rds", "CustomLogGroups": "custom/*, literal/app"},
    });

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.status, "Create event handled successfully");
    assert_eq!(
        outcome.added,
        vec!["/aws/rds/a", "/aws/rds/b", "custom/x", "literal/app"]
    );
    assert!(outcome.failures.is_empty());
    assert!(h
        .logs
        .puts()
        .iter()
        .all(|request| request.filter_name == "logzio_firehose_shipper"
            && request.destination_arn == DESTINATION));
}

#[tokio::test]
async fn lifecycle_update_applies_both_halves() {
    let h = harness(
        &[],
        FakeLogGroupApi::new().with_groups(["/aws/rds/a", "/aws/ecs/b", "app/1", "app/2"]),
        FakeSecretStore::new(),
    );
    let event = json!({
        "RequestType": "Update",
        "ResourceProperties": {"Services": "ecs", "CustomLogGroups": "app/2, new/one"},
        "OldResourceProperties": {"Services": "rds", "CustomLogGroups": "app/*"},
    });

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.added, vec!["/aws/ecs/b", "new/one"]);
    assert_eq!(outcome.removed, vec!["/aws/rds/a", "app/1"]);
    assert_eq!(h.logs.put_groups(), vec!["/aws/ecs/b", "new/one"]);
    assert_eq!(h.logs.delete_groups(), vec!["/aws/rds/a", "app/1"]);
}

#[tokio::test]
async fn lifecycle_update_keeps_literal_carved_out_of_removed_service() {
    let h = harness(
        &[],
        FakeLogGroupApi::new().with_groups(["/aws/rds/a", "/aws/rds/b"]),
        FakeSecretStore::new(),
    );
    let event = json!({
        "RequestType": "Update",
        "ResourceProperties": {"CustomLogGroups": "/aws/rds/a"},
        "OldResourceProperties": {"Services": "rds"},
    });

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.added, vec!["/aws/rds/a"]);
    assert_eq!(outcome.removed, vec!["/aws/rds/b"]);
    assert_eq!(h.logs.delete_groups(), vec!["/aws/rds/b"]);
}

#[tokio::test]
async fn lifecycle_update_keeps_groups_when_new_prefix_fails_to_enumerate() {
    let h = harness(
        &[],
        FakeLogGroupApi::new()
            .with_groups(["app/a"])
            .fail_describe("app/", ApiError::other("access denied")),
        FakeSecretStore::new(),
    );
    let event = json!({
        "RequestType": "Update",
        "ResourceProperties": {"CustomLogGroups": "app/*"},
        "OldResourceProperties": {"CustomLogGroups": "app/a"},
    });

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert!(outcome.removed.is_empty(), "{:?}", outcome.removed);
    assert!(h.logs.delete_groups().is_empty());
    assert_eq!(outcome.failures, vec!["app/: access denied"]);
}

#[tokio::test]
async fn lifecycle_update_retries_throttled_enumeration() {
    let h = harness(
        &[],
        FakeLogGroupApi::new().with_groups(["app/a", "app/b"]).throttle("app/", 2),
        FakeSecretStore::new(),
    );
    let event = json!({
        "RequestType": "Update",
        "ResourceProperties": {"CustomLogGroups": "app/*"},
        "OldResourceProperties": {"CustomLogGroups": "app/a"},
    });

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.added, vec!["app/b"]);
    assert!(outcome.removed.is_empty());
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
}

#[tokio::test]
async fn subscription_delete_removes_resolved_groups() {
    let h = harness(
        &[],
        FakeLogGroupApi::new().with_groups(["/aws/eks/c1", "/aws/eks/c2"]),
        FakeSecretStore::new(),
    );
    let event = stream_event(
        "SubscriptionFilterEvent",
        json!({"action": "delete", "newServices": "eks", "newCustom": "manual"}),
    );

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.status, "SubscriptionFilterEvent event handled successfully");
    assert_eq!(outcome.removed, vec!["/aws/eks/c1", "/aws/eks/c2", "manual"]);
    assert!(h.logs.puts().is_empty());
}

#[tokio::test]
async fn partial_failures_still_report_success() {
    let h = harness(
        &[],
        FakeLogGroupApi::new()
            .with_groups(["/aws/rds/a", "/aws/rds/b", "/aws/rds/c"])
            .fail_put("/aws/rds/b", ApiError::other("AccessDeniedException: denied")),
        FakeSecretStore::new(),
    );
    let event = stream_event(
        "SubscriptionFilterEvent",
        json!({"Action": "add", "newServices": "rds"}),
    );

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.status, "SubscriptionFilterEvent event handled successfully");
    assert_eq!(outcome.added, vec!["/aws/rds/a", "/aws/rds/c"]);
    assert_eq!(
        outcome.failures,
        vec!["/aws/rds/b: AccessDeniedException: denied"]
    );
}

#[tokio::test]
async fn created_group_matching_a_service_is_subscribed() {
    let h = harness(&[("SERVICES", "rds, lambda")], FakeLogGroupApi::new(), FakeSecretStore::new());
    let event = stream_event("CreateLogGroup", json!({"logGroupName": "/aws/rds/instance/db"}));

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.status, "CreateLogGroup event handled successfully");
    assert_eq!(h.logs.put_groups(), vec!["/aws/rds/instance/db"]);
}

#[tokio::test]
async fn created_group_matching_nothing_is_skipped() {
    let h = harness(
        &[("SERVICES", "rds"), ("CUSTOM_GROUPS", "app/api, batch/*")],
        FakeLogGroupApi::new(),
        FakeSecretStore::new(),
    );
    let event = stream_event("CreateLogGroup", json!({"logGroupName": "app/api-v2"}));

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert!(outcome.status.starts_with("skipped: "), "{}", outcome.status);
    assert_eq!(h.logs.total_calls(), 0);
}

#[tokio::test]
async fn created_group_matching_secret_wildcard_is_subscribed() {
    let h = harness(
        &[("SECRET_ENABLED", "true"), ("CUSTOM_GROUPS", SECRET_ARN)],
        FakeLogGroupApi::new(),
        FakeSecretStore::new().with_version(SECRET_ARN, "v1", 0, &secret_value("batch/*")),
    );
    let event = stream_event("CreateLogGroup", json!({"logGroupName": "batch/nightly"}));

    handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(h.logs.put_groups(), vec!["batch/nightly"]);
}

#[tokio::test]
async fn secret_change_adds_and_removes_expanded_groups() {
    let h = harness(
        &[("SECRET_ENABLED", "true"), ("CUSTOM_GROUPS", SECRET_ARN)],
        FakeLogGroupApi::new().with_groups(["jobs/1", "jobs/2", "old/a"]),
        FakeSecretStore::new()
            .with_version(SECRET_ARN, "previous", 1, &secret_value("old/a, keep"))
            .with_version(SECRET_ARN, "current", 2, &secret_value("keep, jobs/*")),
    );
    let event = stream_event("PutSecretValue", json!({"secretId": "custom-groups"}));

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.status, "PutSecretValue event handled successfully");
    assert_eq!(outcome.added, vec!["jobs/1", "jobs/2"]);
    assert_eq!(outcome.removed, vec!["old/a"]);
}

#[tokio::test]
async fn secret_change_keeps_literal_now_covered_by_wildcard() {
    let h = harness(
        &[("SECRET_ENABLED", "true"), ("CUSTOM_GROUPS", SECRET_ARN)],
        FakeLogGroupApi::new().with_groups(["app/api", "app/x"]),
        FakeSecretStore::new()
            .with_version(SECRET_ARN, "previous", 1, &secret_value("app/api"))
            .with_version(SECRET_ARN, "current", 2, &secret_value("app/*")),
    );
    let event = stream_event("PutSecretValue", json!({"secretId": SECRET_ARN}));

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.added, vec!["app/api", "app/x"]);
    assert!(outcome.removed.is_empty(), "{:?}", outcome.removed);
    assert!(h.logs.delete_groups().is_empty());
}

#[tokio::test]
async fn secret_change_keeps_groups_covered_by_unchanged_tokens() {
    let h = harness(
        &[("SECRET_ENABLED", "true"), ("CUSTOM_GROUPS", SECRET_ARN)],
        FakeLogGroupApi::new().with_groups(["app/api", "app/x"]),
        FakeSecretStore::new()
            .with_version(SECRET_ARN, "previous", 1, &secret_value("app/*, app/api"))
            .with_version(SECRET_ARN, "current", 2, &secret_value("app/api")),
    );
    let event = stream_event("PutSecretValue", json!({"secretId": SECRET_ARN}));

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.removed, vec!["app/x"]);
    assert_eq!(h.logs.delete_groups(), vec!["app/x"]);
}

#[tokio::test]
async fn unrelated_secret_change_is_skipped() {
    let h = harness(
        &[("SECRET_ENABLED", "true"), ("CUSTOM_GROUPS", SECRET_ARN)],
        FakeLogGroupApi::new(),
        FakeSecretStore::new(),
    );
    let event = stream_event("PutSecretValue", json!({"secretId": "database-password"}));

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert!(outcome.status.starts_with("skipped: "));
    assert!(h.secrets.reads().is_empty());
}

#[tokio::test]
async fn secret_without_history_is_terminal() {
    let h = harness(
        &[("SECRET_ENABLED", "true"), ("CUSTOM_GROUPS", SECRET_ARN)],
        FakeLogGroupApi::new(),
        FakeSecretStore::new().with_version(SECRET_ARN, "only", 0, &secret_value("a")),
    );
    let event = stream_event("PutSecretValue", json!({"secretId": SECRET_ARN}));

    let error = handle_event(&h.ctx, &event).await.expect_err("no previous version");

    assert_eq!(
        error,
        HandlerError::Secret(SecretError::NoPreviousVersion(SECRET_ARN.to_string()))
    );
    assert_eq!(h.logs.total_calls(), 0);
}

#[tokio::test]
async fn tag_flow_disabled_makes_no_calls() {
    let h = harness(&[], FakeLogGroupApi::new(), FakeSecretStore::new());
    let event = tag_change(
        "arn:aws:lambda:us-east-1:123456789012:function:orders",
        json!({"logzio:logs": "true"}),
    );

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.status, "skipped: tag reconciliation is disabled");
    assert_eq!(h.logs.total_calls(), 0);
}

#[tokio::test]
async fn tagged_function_gets_its_log_group_subscribed() {
    let h = harness(
        &[("TAG_RECONCILIATION_ENABLED", "true")],
        FakeLogGroupApi::new().with_groups(["/aws/lambda/orders"]),
        FakeSecretStore::new(),
    );
    let event = tag_change(
        "arn:aws:lambda:us-east-1:123456789012:function:orders",
        json!({"LOGZIO:LOGS": "TRUE"}),
    );

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.status, "Tag Change on Resource event handled successfully");
    assert_eq!(outcome.added, vec!["/aws/lambda/orders"]);
}

#[tokio::test]
async fn tagged_group_already_subscribed_is_skipped() {
    let h = harness(
        &[("TAG_RECONCILIATION_ENABLED", "true")],
        FakeLogGroupApi::new()
            .with_groups(["/app/api"])
            .with_filter("/app/api", "logzio_firehose_shipper", DESTINATION),
        FakeSecretStore::new(),
    );
    let event = stream_event(
        "TagResource",
        json!({
            "resourceArn": "arn:aws:logs:us-east-1:123456789012:log-group:/app/api:*",
            "tags": {"logzio:logs": "true"},
        }),
    );

    let outcome = handle_event(&h.ctx, &event).await.expect("should handle");

    assert_eq!(outcome.status, "skipped: /app/api already has a subscription filter");
    assert!(h.logs.puts().is_empty());
}

#[tokio::test]
async fn tag_without_monitoring_pair_is_skipped() {
    let h = harness(
        &[("TAG_RECONCILIATION_ENABLED", "true")],
        FakeLogGroupApi::new(),
        FakeSecretStore::new(),
    );

    for tags in [json!({"logzio:logs": "false"}), json!(["logzio:logs"]), Value::Null] {
        let event = tag_change("arn:aws:logs:us-east-1:1:log-group:/app/api", tags);
        let outcome = handle_event(&h.ctx, &event).await.expect("should handle");
        assert!(outcome.status.starts_with("skipped: "));
    }
    assert_eq!(h.logs.total_calls(), 0);
}

#[tokio::test]
async fn tagged_unsupported_resource_is_a_classification_error() {
    let h = harness(
        &[("TAG_RECONCILIATION_ENABLED", "true")],
        FakeLogGroupApi::new(),
        FakeSecretStore::new(),
    );
    let event = tag_change("arn:aws:s3:::my-bucket", json!({"logzio:logs": "true"}));

    let error = handle_event(&h.ctx, &event).await.expect_err("s3 is unsupported");

    assert!(matches!(
        error,
        HandlerError::Classification(ClassificationError::UnsupportedResource { .. })
    ));
    assert_eq!(h.logs.total_calls(), 0);
}

#[tokio::test]
async fn malformed_envelope_is_rejected() {
    let h = harness(&[], FakeLogGroupApi::new(), FakeSecretStore::new());

    let error = handle_event(&h.ctx, &stream_event("CreateLogGroup", json!({})))
        .await
        .expect_err("group name is required");

    assert_eq!(
        error.to_string(),
        "`logGroupName` is not of type string or missing from the CreateLogGroup event"
    );
}
