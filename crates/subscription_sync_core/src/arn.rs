use crate::error::ClassificationError;

pub const LAMBDA_LOG_GROUP_PREFIX: &str = "/aws/lambda/";

const LOG_GROUP_RESOURCE: &str = "log-group:";
const FUNCTION_RESOURCE: &str = "function:";

/// Structural fields of a resource ARN. `resource` is everything after the
/// fifth separator and may itself contain `:` or `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceArn<'a> {
    pub partition: &'a str,
    pub service: &'a str,
    pub region: &'a str,
    pub account: &'a str,
    pub resource: &'a str,
}

impl<'a> ResourceArn<'a> {
    pub fn parse(arn: &'a str) -> Result<Self, ClassificationError> {
        let malformed = || ClassificationError::MalformedArn(arn.to_string());

        let mut fields = arn.splitn(6, ':');
        if fields.next() != Some("arn") {
            return Err(malformed());
        }
        let partition = fields.next().ok_or_else(malformed)?;
        let service = fields.next().ok_or_else(malformed)?;
        let region = fields.next().ok_or_else(malformed)?;
        let account = fields.next().ok_or_else(malformed)?;
        let resource = fields.next().ok_or_else(malformed)?;

        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            partition,
            service,
            region,
            account,
            resource,
        })
    }
}

/// Maps a log-group or function ARN to the log group it writes to.
pub fn log_group_for_arn(arn: &str) -> Result<String, ClassificationError> {
    let parsed = ResourceArn::parse(arn)?;

    if let Some(name) = parsed.resource.strip_prefix(LOG_GROUP_RESOURCE) {
        let name = name.strip_suffix(":*").unwrap_or(name);
        if name.is_empty() {
            return Err(ClassificationError::MalformedArn(arn.to_string()));
        }
        return Ok(name.to_string());
    }

    if let Some(function) = parsed.resource.strip_prefix(FUNCTION_RESOURCE) {
        let name = function.split(':').next().unwrap_or_default();
        if name.is_empty() {
            return Err(ClassificationError::MalformedArn(arn.to_string()));
        }
        return Ok(function_log_group(name));
    }

    let resource_type = parsed
        .resource
        .split([':', '/'])
        .next()
        .unwrap_or_default()
        .to_string();
    Err(ClassificationError::UnsupportedResource {
        arn: arn.to_string(),
        resource_type,
    })
}

pub fn function_log_group(function_name: &str) -> String {
    format!("{LAMBDA_LOG_GROUP_PREFIX}{function_name}")
}
