/// Log-group prefix table for the named services that can be selected.
/// Ordered by name; extend this table rather than special-casing lookups.
pub const SERVICE_PREFIXES: &[(&str, &str)] = &[
    ("amazon-mq", "/aws/amazonmq/broker/"),
    ("apigateway", "/aws/apigateway/"),
    ("athena", "/aws/athena/"),
    ("aws-glue", "/aws/aws-glue/"),
    ("aws-iot", "AWSIotLogsV2"),
    ("batch", "/aws/batch/"),
    ("cloudfront", "/aws/cloudfront/"),
    ("cloudhsm", "/aws/cloudhsm/"),
    ("cloudtrail", "aws-cloudtrail-logs-"),
    ("cloudwatch", "/aws/cloudwatch/"),
    ("codebuild", "/aws/codebuild/"),
    ("codepipeline", "/aws/codepipeline/"),
    ("config", "/aws/config/"),
    ("connect", "/aws/connect/"),
    ("dms", "/aws/dms/"),
    ("dynamodb", "/aws/dynamodb/"),
    ("ec2", "/aws/ec2/"),
    ("ecs", "/aws/ecs/"),
    ("eks", "/aws/eks/"),
    ("elasticache", "/aws/elasticache/"),
    ("elasticbeanstalk", "/aws/elasticbeanstalk/"),
    ("elasticfilesystem", "/aws/elasticfilesystem/"),
    ("elasticloadbalancing", "/aws/elasticloadbalancing/"),
    ("emr", "/aws/elasticmapreduce/"),
    ("es", "/aws/es/"),
    ("events", "/aws/events/"),
    ("firehose", "/aws/kinesisfirehose/"),
    ("fsx", "/aws/fsx/"),
    ("guardduty", "/aws/guardduty/"),
    ("inspector", "/aws/inspector/"),
    ("kafka", "/aws/msk/"),
    ("kinesis", "/aws/kinesis/"),
    ("kms", "/aws/kms/"),
    ("lambda", "/aws/lambda/"),
    ("macie", "/aws/macie/"),
    ("rds", "/aws/rds/"),
    ("redshift", "/aws/redshift/"),
    ("route53", "/aws/route53/"),
    ("s3", "/aws/s3/"),
    ("sagemaker", "/aws/sagemaker/"),
    ("secretsmanager", "/aws/secretsmanager/"),
    ("sns", "/aws/sns/"),
    ("sqs", "/aws/sqs/"),
    ("ssm", "/aws/ssm/"),
    ("stepfunctions", "/aws/states/"),
    ("transfer", "/aws/transfer/"),
    ("vpc", "/aws/vpc/"),
    ("waf", "/aws/waf/"),
    ("workspaces", "/aws/workspaces/"),
];

pub fn service_prefix(service: &str) -> Option<&'static str> {
    SERVICE_PREFIXES
        .binary_search_by(|(name, _)| (*name).cmp(service))
        .ok()
        .map(|index| SERVICE_PREFIXES[index].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_binary_search() {
        let names: Vec<&str> = SERVICE_PREFIXES.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 49);
    }

    #[test]
    fn resolves_known_services() {
        assert_eq!(service_prefix("rds"), Some("/aws/rds/"));
        assert_eq!(service_prefix("cloudtrail"), Some("aws-cloudtrail-logs-"));
        assert_eq!(service_prefix("stepfunctions"), Some("/aws/states/"));
        assert_eq!(service_prefix("aws-iot"), Some("AWSIotLogsV2"));
    }

    #[test]
    fn unknown_service_has_no_prefix() {
        assert_eq!(service_prefix("mainframe"), None);
        assert_eq!(service_prefix(""), None);
    }
}
