//! Bounded polling for eventually consistent operations.
//!
//! A [`WaiterDefinition`] is a declarative status table: each [`Acceptor`]
//! maps an observation (a status value, the resource being gone, or a fetch
//! error) to success, retry or failure. [`Waiter::wait`] drives the table by
//! repeatedly calling a poll function, normally a State Fetcher call.
//!
//! # Example
//!
//! ```
//! use reconcile_sdk::waiter::{WaiterConfig, WaiterDefinition};
//!
//! let available = WaiterDefinition::until_status(
//!     "nat_gateway_available",
//!     "state",
//!     ["available"],
//!     ["failed", "deleted"],
//!     WaiterConfig::new(15, 40),
//! );
//! assert_eq!(available.acceptors.len(), 3);
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, ReconcileError};
use crate::types::ResourceState;

/// Polling cadence and limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiterConfig {
    /// Seconds to sleep between polls.
    pub delay_seconds: u64,
    /// Maximum number of polls.
    pub max_attempts: u32,
}

impl WaiterConfig {
    /// Create a new waiter configuration.
    pub fn new(delay_seconds: u64, max_attempts: u32) -> Self {
        Self {
            delay_seconds,
            max_attempts,
        }
    }

    /// The delay between polls.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    /// Apply a caller override on top of this configuration.
    pub fn with_override(self, over: Option<&WaiterOverride>) -> Self {
        match over {
            Some(over) => Self {
                delay_seconds: over.delay.unwrap_or(self.delay_seconds),
                max_attempts: over.max_attempts.unwrap_or(self.max_attempts),
            },
            None => self,
        }
    }
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self::new(15, 40)
    }
}

/// Caller-supplied override of a waiter's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiterOverride {
    /// Seconds between polls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    /// Maximum number of polls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Per-phase waiter overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Override for waiters run after create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<WaiterOverride>,
    /// Override for waiters run after update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<WaiterOverride>,
    /// Override for waiters run after delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<WaiterOverride>,
}

/// The mutation a waiter follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// After create.
    Create,
    /// After update.
    Update,
    /// After delete.
    Delete,
}

impl TimeoutConfig {
    /// The override for `phase`, if any.
    pub fn for_phase(&self, phase: Phase) -> Option<&WaiterOverride> {
        match phase {
            Phase::Create => self.create.as_ref(),
            Phase::Update => self.update.as_ref(),
            Phase::Delete => self.delete.as_ref(),
        }
    }
}

/// What an acceptor match means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptorState {
    /// Stop polling; the wait succeeded.
    Success,
    /// Keep polling.
    Retry,
    /// Stop polling; the wait failed.
    Failure,
}

/// What an acceptor looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// The value at the waiter's status path equals this string.
    Status(String),
    /// The resource does not exist.
    NotFound,
    /// The poll returned an error of this kind.
    Error(ErrorKind),
}

/// One row of a waiter's status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acceptor {
    /// What to match.
    pub matcher: Matcher,
    /// What a match means.
    pub state: AcceptorState,
}

impl Acceptor {
    /// Create a new acceptor.
    pub fn new(matcher: Matcher, state: AcceptorState) -> Self {
        Self { matcher, state }
    }
}

/// A declarative waiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiterDefinition {
    /// Name used in logs and errors.
    pub name: String,
    /// Dotted path to the status within the flat resource state. A segment
    /// ending in `[]` selects the first element of a list.
    pub status_path: String,
    /// Status table, checked in order.
    pub acceptors: Vec<Acceptor>,
    /// Cadence used when the caller gives no override.
    pub default: WaiterConfig,
}

impl WaiterDefinition {
    /// Create a waiter with no acceptors.
    pub fn new(name: impl Into<String>, status_path: impl Into<String>, default: WaiterConfig) -> Self {
        Self {
            name: name.into(),
            status_path: status_path.into(),
            acceptors: Vec::new(),
            default,
        }
    }

    /// Append an acceptor.
    pub fn with_acceptor(mut self, matcher: Matcher, state: AcceptorState) -> Self {
        self.acceptors.push(Acceptor::new(matcher, state));
        self
    }

    /// Wait until the status is one of `success`; fail on any of `failure`.
    /// Any other status, and the resource not being visible yet, are retried.
    pub fn until_status<S, F>(
        name: impl Into<String>,
        status_path: impl Into<String>,
        success: S,
        failure: F,
        default: WaiterConfig,
    ) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        let mut waiter = Self::new(name, status_path, default);
        for status in success {
            waiter = waiter.with_acceptor(Matcher::Status(status.into()), AcceptorState::Success);
        }
        for status in failure {
            waiter = waiter.with_acceptor(Matcher::Status(status.into()), AcceptorState::Failure);
        }
        waiter.with_acceptor(Matcher::NotFound, AcceptorState::Retry)
    }

    /// Wait until the resource is gone. Any of `failure` statuses fail the wait.
    pub fn until_deleted<F>(
        name: impl Into<String>,
        status_path: impl Into<String>,
        failure: F,
        default: WaiterConfig,
    ) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
    {
        let mut waiter = Self::new(name, status_path, default)
            .with_acceptor(Matcher::NotFound, AcceptorState::Success);
        for status in failure {
            waiter = waiter.with_acceptor(Matcher::Status(status.into()), AcceptorState::Failure);
        }
        waiter
    }

    /// Classify one poll result. Unmatched observations are retried.
    pub fn evaluate(
        &self,
        observed: &Result<Option<ResourceState>, ReconcileError>,
    ) -> (AcceptorState, Option<String>) {
        let (matched, status) = self.matching(observed);
        (matched.unwrap_or(AcceptorState::Retry), status)
    }

    /// The state of the first acceptor matching `observed`, if any.
    fn matching(
        &self,
        observed: &Result<Option<ResourceState>, ReconcileError>,
    ) -> (Option<AcceptorState>, Option<String>) {
        let status = match observed {
            Ok(Some(state)) => status_at(&state.to_value(), &self.status_path),
            _ => None,
        };
        let matched = self.acceptors.iter().find(|acceptor| match (&acceptor.matcher, observed) {
            (Matcher::NotFound, Ok(None)) => true,
            (Matcher::NotFound, Err(err)) => err.is_not_found(),
            (Matcher::Error(kind), Err(err)) => err.kind() == *kind,
            (Matcher::Status(expected), Ok(Some(_))) => status.as_deref() == Some(expected),
            _ => false,
        });
        (matched.map(|acceptor| acceptor.state), status)
    }
}

/// The outcome of a successful wait.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitReport {
    /// Number of polls made.
    pub attempts: u32,
    /// The state observed by the last poll (None if the resource is gone).
    pub last_state: Option<ResourceState>,
}

/// Runs a [`WaiterDefinition`] with a concrete [`WaiterConfig`].
#[derive(Debug, Clone)]
pub struct Waiter<'a> {
    definition: &'a WaiterDefinition,
    config: WaiterConfig,
}

impl<'a> Waiter<'a> {
    /// Use the definition's default cadence.
    pub fn new(definition: &'a WaiterDefinition) -> Self {
        Self {
            definition,
            config: definition.default,
        }
    }

    /// Use the definition's defaults overridden for `phase` by `timeout`.
    pub fn for_phase(
        definition: &'a WaiterDefinition,
        phase: Phase,
        timeout: Option<&TimeoutConfig>,
    ) -> Self {
        let over = timeout.and_then(|t| t.for_phase(phase));
        Self {
            definition,
            config: definition.default.with_override(over),
        }
    }

    /// Use an explicit configuration.
    pub fn with_config(mut self, config: WaiterConfig) -> Self {
        self.config = config;
        self
    }

    /// The effective configuration.
    pub fn config(&self) -> WaiterConfig {
        self.config
    }

    /// Poll until an acceptor reports success or failure, or attempts run out.
    ///
    /// `poll` is called at most `max_attempts` times with `delay_seconds`
    /// between calls; there is no sleep after the final attempt. An error from
    /// `poll` that matches no acceptor ends the wait and is returned as is.
    pub async fn wait<F, Fut>(&self, mut poll: F) -> Result<WaitReport, ReconcileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<ResourceState>, ReconcileError>>,
    {
        let name = &self.definition.name;
        let max_attempts = self.config.max_attempts;
        let mut attempts = 0;

        while attempts < max_attempts {
            if attempts > 0 {
                tokio::time::sleep(self.config.delay()).await;
            }
            attempts += 1;

            let observed = poll().await;
            let (matched, status) = self.definition.matching(&observed);
            let observed = match (matched, observed) {
                (None, Err(err)) => {
                    warn!(waiter = %name, attempts, error = %err, "waiter poll failed");
                    return Err(err);
                },
                (_, observed) => observed,
            };
            let state = matched.unwrap_or(AcceptorState::Retry);
            debug!(
                waiter = %name,
                attempt = attempts,
                max_attempts,
                status = status.as_deref().unwrap_or("<none>"),
                ?state,
                "polled"
            );

            match state {
                AcceptorState::Success => {
                    info!(waiter = %name, attempts, "waiter reached success");
                    return Ok(WaitReport {
                        attempts,
                        last_state: observed.ok().flatten(),
                    });
                },
                AcceptorState::Failure => {
                    let reason = match (&observed, status) {
                        (Err(err), _) => err.to_string(),
                        (_, Some(status)) => format!("status {status}"),
                        (Ok(None), None) => "resource not found".to_string(),
                        (Ok(Some(_)), None) => "no status".to_string(),
                    };
                    warn!(waiter = %name, attempts, %reason, "waiter reached failure");
                    return Err(ReconcileError::WaiterFailed {
                        waiter: name.clone(),
                        reason,
                    });
                },
                AcceptorState::Retry => {},
            }
        }

        warn!(waiter = %name, attempts, "waiter exhausted its attempts");
        Err(ReconcileError::WaiterTimeout {
            waiter: name.clone(),
            attempts,
        })
    }
}

/// Read the string at a dotted path.
fn status_at(value: &Value, path: &str) -> Option<String> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match segment.strip_suffix("[]") {
            Some(key) => current.get(key)?.as_array()?.first()?,
            None => current.get(segment)?,
        };
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    fn state_with_status(status: &str) -> ResourceState {
        ResourceState::new("q1", "id-1").with_attribute("status", json!(status))
    }

    fn scripted(
        steps: Vec<Result<Option<ResourceState>, ReconcileError>>,
    ) -> Mutex<VecDeque<Result<Option<ResourceState>, ReconcileError>>> {
        Mutex::new(steps.into())
    }

    fn available() -> WaiterDefinition {
        WaiterDefinition::until_status(
            "available",
            "status",
            ["AVAILABLE"],
            ["FAILED"],
            WaiterConfig::new(0, 5),
        )
    }

    #[tokio::test]
    async fn test_success_after_three_polls() {
        let steps = scripted(vec![
            Ok(Some(state_with_status("PENDING"))),
            Ok(Some(state_with_status("PENDING"))),
            Ok(Some(state_with_status("AVAILABLE"))),
        ]);
        let calls = Cell::new(0);
        let definition = available();
        let report = Waiter::new(&definition)
            .wait(|| {
                calls.set(calls.get() + 1);
                let next = steps.lock().unwrap().pop_front().unwrap();
                async move { next }
            })
            .await;
        let report = assert_ok!(report);
        assert_eq!(report.attempts, 3);
        assert_eq!(calls.get(), 3);
        assert_eq!(
            report.last_state.unwrap().attribute("status"),
            Some(&json!("AVAILABLE"))
        );
    }

    #[tokio::test]
    async fn test_timeout_after_max_attempts() {
        let definition = available();
        let calls = Cell::new(0);
        let result = Waiter::new(&definition)
            .with_config(WaiterConfig::new(0, 4))
            .wait(|| {
                calls.set(calls.get() + 1);
                async { Ok(Some(state_with_status("PENDING"))) }
            })
            .await;
        let err = assert_err!(result);
        assert_eq!(err.kind(), ErrorKind::WaiterTimeout);
        assert_eq!(calls.get(), 4);
        match err {
            ReconcileError::WaiterTimeout { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_status_stops_polling() {
        let steps = scripted(vec![
            Ok(Some(state_with_status("PENDING"))),
            Ok(Some(state_with_status("FAILED"))),
            Ok(Some(state_with_status("AVAILABLE"))),
        ]);
        let definition = available();
        let result = Waiter::new(&definition)
            .wait(|| {
                let next = steps.lock().unwrap().pop_front().unwrap();
                async move { next }
            })
            .await;
        let err = assert_err!(result);
        assert_eq!(err.kind(), ErrorKind::WaiterFailed);
        assert!(err.to_string().contains("status FAILED"));
        assert_eq!(steps.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_success_for_deletion() {
        let definition =
            WaiterDefinition::until_deleted("deleted", "status", ["DELETE_FAILED"], WaiterConfig::new(0, 5));
        let steps = scripted(vec![
            Ok(Some(state_with_status("DELETING"))),
            Err(ReconcileError::NotFound("gone".to_string())),
        ]);
        let report = Waiter::new(&definition)
            .wait(|| {
                let next = steps.lock().unwrap().pop_front().unwrap();
                async move { next }
            })
            .await;
        let report = assert_ok!(report);
        assert_eq!(report.attempts, 2);
        assert!(report.last_state.is_none());
    }

    #[tokio::test]
    async fn test_not_found_is_retried_while_creating() {
        let steps = scripted(vec![Ok(None), Ok(Some(state_with_status("AVAILABLE")))]);
        let definition = available();
        let report = Waiter::new(&definition)
            .wait(|| {
                let next = steps.lock().unwrap().pop_front().unwrap();
                async move { next }
            })
            .await;
        assert_eq!(assert_ok!(report).attempts, 2);
    }

    #[tokio::test]
    async fn test_unmatched_poll_error_stops_waiting() {
        let definition = available();
        let calls = Cell::new(0);
        let result = Waiter::new(&definition)
            .wait(|| {
                calls.set(calls.get() + 1);
                async {
                    Err(ReconcileError::remote(
                        "ec2",
                        "describe_subnets",
                        crate::error::ClientError::new("UnauthorizedOperation", "denied"),
                    ))
                }
            })
            .await;
        let err = assert_err!(result);
        assert_eq!(err.kind(), ErrorKind::RemoteCallFailed);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_error_acceptor_can_retry() {
        let definition = available().with_acceptor(
            Matcher::Error(ErrorKind::RemoteCallFailed),
            AcceptorState::Retry,
        );
        let steps = scripted(vec![
            Err(ReconcileError::remote(
                "ec2",
                "describe_subnets",
                crate::error::ClientError::new("RequestLimitExceeded", "slow down"),
            )),
            Ok(Some(state_with_status("AVAILABLE"))),
        ]);
        let report = Waiter::new(&definition)
            .wait(|| {
                let next = steps.lock().unwrap().pop_front().unwrap();
                async move { next }
            })
            .await;
        assert_eq!(assert_ok!(report).attempts, 2);
    }

    #[test]
    fn test_override_applies_per_phase() {
        let timeout = TimeoutConfig {
            update: Some(WaiterOverride {
                delay: Some(1),
                max_attempts: None,
            }),
            ..Default::default()
        };
        let definition = available();
        let update = Waiter::for_phase(&definition, Phase::Update, Some(&timeout));
        assert_eq!(update.config(), WaiterConfig::new(1, 5));
        let create = Waiter::for_phase(&definition, Phase::Create, Some(&timeout));
        assert_eq!(create.config(), WaiterConfig::new(0, 5));
    }

    #[test]
    fn test_status_path_lookup() {
        let value = json!({"Stacks": [{"StackStatus": "CREATE_COMPLETE"}], "count": 2});
        assert_eq!(
            status_at(&value, "Stacks[].StackStatus").as_deref(),
            Some("CREATE_COMPLETE")
        );
        assert_eq!(status_at(&value, "count").as_deref(), Some("2"));
        assert_eq!(status_at(&value, "missing"), None);
    }

    #[test]
    fn test_timeout_config_deserializes() {
        let timeout: TimeoutConfig =
            serde_json::from_value(json!({"create": {"delay": 5, "max_attempts": 10}})).unwrap();
        assert_eq!(timeout.create.unwrap().max_attempts, Some(10));
        assert!(timeout.delete.is_none());
    }
}
