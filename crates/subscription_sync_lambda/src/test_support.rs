//! In-memory collaborators for engine and dispatcher tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::adapters::log_groups::{LogGroupApi, LogGroupPage, PutFilterRequest, SubscriptionFilter};
use crate::adapters::secret_store::{SecretStore, SecretVersion};
use crate::runtime::error::ApiError;

#[derive(Default)]
struct LogGroupState {
    groups: Vec<String>,
    page_size: usize,
    filters: HashMap<String, Vec<SubscriptionFilter>>,
    put_failures: HashMap<String, ApiError>,
    delete_failures: HashMap<String, ApiError>,
    describe_failures: HashMap<String, ApiError>,
    remaining_throttles: HashMap<String, u32>,
    rejected_patterns: HashMap<String, String>,
    puts: Vec<PutFilterRequest>,
    deletes: Vec<(String, String)>,
    describe_calls: Vec<(String, Option<String>)>,
    pattern_tests: Vec<(String, String)>,
}

/// Scriptable log-group API. Groups listed with `with_groups` are what
/// prefix enumeration sees; put/delete calls are recorded in call order.
pub struct FakeLogGroupApi {
    state: Mutex<LogGroupState>,
}

impl Default for FakeLogGroupApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLogGroupApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogGroupState {
                page_size: 50,
                ..LogGroupState::default()
            }),
        }
    }

    pub fn with_groups<I, S>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .groups
            .extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    pub fn with_filter(self, log_group: &str, filter_name: &str, destination_arn: &str) -> Self {
        self.lock()
            .filters
            .entry(log_group.to_string())
            .or_default()
            .push(SubscriptionFilter {
                filter_name: filter_name.to_string(),
                destination_arn: destination_arn.to_string(),
            });
        self
    }

    pub fn fail_put(self, log_group: &str, error: ApiError) -> Self {
        self.lock().put_failures.insert(log_group.to_string(), error);
        self
    }

    pub fn fail_delete(self, log_group: &str, error: ApiError) -> Self {
        self.lock()
            .delete_failures
            .insert(log_group.to_string(), error);
        self
    }

    /// Fails enumeration for `prefix`, or `describe_subscription_filters`
    /// for a group with that exact name.
    pub fn fail_describe(self, prefix_or_group: &str, error: ApiError) -> Self {
        self.lock()
            .describe_failures
            .insert(prefix_or_group.to_string(), error);
        self
    }

    /// Throttles the next `times` put/delete calls for `log_group`, or the
    /// next `times` enumeration pages when given a prefix.
    pub fn throttle(self, log_group: &str, times: u32) -> Self {
        self.lock()
            .remaining_throttles
            .insert(log_group.to_string(), times);
        self
    }

    pub fn reject_pattern(self, pattern: &str, reason: &str) -> Self {
        self.lock()
            .rejected_patterns
            .insert(pattern.to_string(), reason.to_string());
        self
    }

    pub fn puts(&self) -> Vec<PutFilterRequest> {
        self.lock().puts.clone()
    }

    pub fn put_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .lock()
            .puts
            .iter()
            .map(|request| request.log_group.clone())
            .collect();
        groups.sort();
        groups
    }

    pub fn delete_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .lock()
            .deletes
            .iter()
            .map(|(log_group, _)| log_group.clone())
            .collect();
        groups.sort();
        groups
    }

    pub fn describe_calls(&self) -> Vec<(String, Option<String>)> {
        self.lock().describe_calls.clone()
    }

    pub fn pattern_tests(&self) -> Vec<(String, String)> {
        self.lock().pattern_tests.clone()
    }

    pub fn total_calls(&self) -> usize {
        let state = self.lock();
        state.puts.len()
            + state.deletes.len()
            + state.describe_calls.len()
            + state.pattern_tests.len()
    }

    fn lock(&self) -> MutexGuard<'_, LogGroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_throttle(state: &mut LogGroupState, log_group: &str) -> Option<ApiError> {
        let remaining = state.remaining_throttles.get_mut(log_group)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(ApiError::throttled("Rate exceeded"))
    }
}

#[async_trait]
impl LogGroupApi for FakeLogGroupApi {
    async fn describe_log_groups(
        &self,
        prefix: &str,
        next_token: Option<String>,
    ) -> Result<LogGroupPage, ApiError> {
        let mut state = self.lock();
        state
            .describe_calls
            .push((prefix.to_string(), next_token.clone()));
        if let Some(error) = Self::take_throttle(&mut state, prefix) {
            return Err(error);
        }
        if let Some(error) = state.describe_failures.get(prefix) {
            return Err(error.clone());
        }

        let offset = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ApiError::other(format!("invalid next token {token}")))?,
            None => 0,
        };
        let matching: Vec<String> = state
            .groups
            .iter()
            .filter(|group| group.starts_with(prefix))
            .cloned()
            .collect();
        let end = (offset + state.page_size).min(matching.len());
        let names = matching.get(offset..end).unwrap_or_default().to_vec();

        Ok(LogGroupPage {
            names,
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn put_subscription_filter(&self, request: PutFilterRequest) -> Result<(), ApiError> {
        let mut state = self.lock();
        if let Some(error) = Self::take_throttle(&mut state, &request.log_group) {
            return Err(error);
        }
        if let Some(error) = state.put_failures.get(&request.log_group) {
            return Err(error.clone());
        }
        state
            .filters
            .entry(request.log_group.clone())
            .or_default()
            .push(SubscriptionFilter {
                filter_name: request.filter_name.clone(),
                destination_arn: request.destination_arn.clone(),
            });
        state.puts.push(request);
        Ok(())
    }

    async fn delete_subscription_filter(
        &self,
        log_group: &str,
        filter_name: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        if let Some(error) = Self::take_throttle(&mut state, log_group) {
            return Err(error);
        }
        if let Some(error) = state.delete_failures.get(log_group) {
            return Err(error.clone());
        }
        if let Some(filters) = state.filters.get_mut(log_group) {
            filters.retain(|filter| filter.filter_name != filter_name);
        }
        state
            .deletes
            .push((log_group.to_string(), filter_name.to_string()));
        Ok(())
    }

    async fn describe_subscription_filters(
        &self,
        log_group: &str,
    ) -> Result<Vec<SubscriptionFilter>, ApiError> {
        let state = self.lock();
        if let Some(error) = state.describe_failures.get(log_group) {
            return Err(error.clone());
        }
        if !state.groups.iter().any(|group| group == log_group)
            && !state.filters.contains_key(log_group)
        {
            return Err(ApiError::not_found(format!(
                "The specified log group does not exist: {log_group}"
            )));
        }
        Ok(state.filters.get(log_group).cloned().unwrap_or_default())
    }

    async fn test_filter_pattern(&self, pattern: &str, sample: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state
            .pattern_tests
            .push((pattern.to_string(), sample.to_string()));
        match state.rejected_patterns.get(pattern) {
            Some(reason) => Err(ApiError::other(reason.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
struct StoredVersion {
    version_id: String,
    created_at: Option<DateTime<Utc>>,
    value: Option<String>,
}

#[derive(Default)]
struct SecretState {
    secrets: HashMap<String, Vec<StoredVersion>>,
    failures: HashMap<String, ApiError>,
    reads: Vec<(String, Option<String>)>,
}

/// Secret store keyed by secret id. The most recently added version is
/// the current one.
#[derive(Default)]
pub struct FakeSecretStore {
    state: Mutex<SecretState>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a version created `minute` minutes after a fixed epoch.
    pub fn with_version(self, secret_id: &str, version_id: &str, minute: u32, value: &str) -> Self {
        let created_at = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, minute, 0)
            .single();
        self.push(secret_id, version_id, created_at, Some(value.to_string()));
        self
    }

    pub fn with_undated_version(self, secret_id: &str, version_id: &str, value: &str) -> Self {
        self.push(secret_id, version_id, None, Some(value.to_string()));
        self
    }

    pub fn with_binary_version(self, secret_id: &str, version_id: &str, minute: u32) -> Self {
        let created_at = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, minute, 0)
            .single();
        self.push(secret_id, version_id, created_at, None);
        self
    }

    pub fn fail(self, secret_id: &str, error: ApiError) -> Self {
        self.lock().failures.insert(secret_id.to_string(), error);
        self
    }

    pub fn reads(&self) -> Vec<(String, Option<String>)> {
        self.lock().reads.clone()
    }

    fn push(
        &self,
        secret_id: &str,
        version_id: &str,
        created_at: Option<DateTime<Utc>>,
        value: Option<String>,
    ) {
        self.lock()
            .secrets
            .entry(secret_id.to_string())
            .or_default()
            .push(StoredVersion {
                version_id: version_id.to_string(),
                created_at,
                value,
            });
    }

    fn lock(&self) -> MutexGuard<'_, SecretState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn get_secret_string(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let mut state = self.lock();
        state
            .reads
            .push((secret_id.to_string(), version_id.map(str::to_string)));
        if let Some(error) = state.failures.get(secret_id) {
            return Err(error.clone());
        }

        let versions = state
            .secrets
            .get(secret_id)
            .ok_or_else(|| ApiError::not_found(format!("secret {secret_id} not found")))?;
        let version = match version_id {
            Some(version_id) => versions
                .iter()
                .find(|version| version.version_id == version_id),
            None => versions.last(),
        };
        version
            .map(|version| version.value.clone())
            .ok_or_else(|| ApiError::not_found(format!("secret {secret_id} version not found")))
    }

    async fn list_secret_versions(&self, secret_id: &str) -> Result<Vec<SecretVersion>, ApiError> {
        let state = self.lock();
        if let Some(error) = state.failures.get(secret_id) {
            return Err(error.clone());
        }
        let versions = state
            .secrets
            .get(secret_id)
            .ok_or_else(|| ApiError::not_found(format!("secret {secret_id} not found")))?;
        Ok(versions
            .iter()
            .map(|version| SecretVersion {
                version_id: version.version_id.clone(),
                created_at: version.created_at,
            })
            .collect())
    }
}
