//! Testing utilities for resource bindings.
//!
//! [`ScriptedClient`] stands in for the cloud: it serves scripted responses
//! and records every call, so tests can assert exactly which API calls a
//! binding made. [`ReconcileTester`] wraps a binding and a client with
//! JSON-level shortcuts.
//!
//! # Example
//!
//! ```ignore
//! use reconcile_sdk::testing::{assert_succeeded, ReconcileTester, ScriptedClient};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_queue() {
//!     let client = ScriptedClient::new()
//!         .with_response("sqs", "create_queue", json!({"QueueUrl": "https://sqs/q1"}))
//!         .with_response("sqs", "get_queue_attributes", json!({"Attributes": {}}));
//!     let tester = ReconcileTester::new(Queue, client);
//!
//!     let envelope = tester.present("q1", json!({"delay_seconds": 0})).await;
//!     assert_succeeded(&envelope);
//!     assert_eq!(tester.client().call_count("sqs", "create_queue"), 1);
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::client::{strip_nulls, ApiClient};
use crate::envelope::{Describe, Envelope};
use crate::error::{ClientError, ErrorKind, UNKNOWN_OPERATION};
use crate::reconcile::Reconciler;
use crate::resource::Resource;
use crate::types::{Context, DesiredState};

/// Operation name prefixes that never change remote state.
const READ_ONLY_PREFIXES: &[&str] = &["describe_", "get_", "list_", "head_"];

/// One recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The service called.
    pub service: String,
    /// The operation called.
    pub operation: String,
    /// The parameters, after null stripping.
    pub params: Value,
}

impl RecordedCall {
    /// Whether the operation may change remote state.
    pub fn is_mutation(&self) -> bool {
        !READ_ONLY_PREFIXES
            .iter()
            .any(|prefix| self.operation.starts_with(prefix))
    }
}

type Response = Result<Value, ClientError>;

#[derive(Default)]
struct Script {
    queued: HashMap<(String, String), VecDeque<Response>>,
    fallback: HashMap<(String, String), Response>,
    calls: Vec<RecordedCall>,
}

/// An [`ApiClient`] that replays scripted responses.
///
/// Responses for one `(service, operation)` are served in the order they were
/// added. When the queue is empty the fallback for that pair is served, and
/// without a fallback the call fails with `UnknownOperation`.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<Script>,
}

impl ScriptedClient {
    /// Create a client with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn with_response(self, service: &str, operation: &str, response: Value) -> Self {
        self.push(service, operation, Ok(response));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, service: &str, operation: &str, error: ClientError) -> Self {
        self.push(service, operation, Err(error));
        self
    }

    /// Serve `response` whenever the queue for the pair is empty.
    pub fn with_fallback(self, service: &str, operation: &str, response: Response) -> Self {
        self.lock()
            .fallback
            .insert(key(service, operation), response);
        self
    }

    /// Queue a response on a shared client.
    pub fn push(&self, service: &str, operation: &str, response: Response) {
        self.lock()
            .queued
            .entry(key(service, operation))
            .or_default()
            .push_back(response);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Parameters of every call to `service.operation`, in order.
    pub fn calls_to(&self, service: &str, operation: &str) -> Vec<Value> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.service == service && c.operation == operation)
            .map(|c| c.params.clone())
            .collect()
    }

    /// Number of calls to `service.operation`.
    pub fn call_count(&self, service: &str, operation: &str) -> usize {
        self.calls_to(service, operation).len()
    }

    /// Calls that may have changed remote state.
    pub fn mutations(&self) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Forget recorded calls, keeping the remaining script.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test may poison the lock; the script is still usable.
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl ApiClient for ScriptedClient {
    async fn call(
        &self,
        service: &str,
        operation: &str,
        params: Value,
    ) -> Result<Value, ClientError> {
        let mut script = self.lock();
        script.calls.push(RecordedCall {
            service: service.to_string(),
            operation: operation.to_string(),
            params: strip_nulls(params),
        });

        let key = key(service, operation);
        if let Some(response) = script.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return response;
        }
        match script.fallback.get(&key) {
            Some(response) => response.clone(),
            None => Err(ClientError::new(
                UNKNOWN_OPERATION,
                format!("No scripted response for {service}.{operation}"),
            )),
        }
    }
}

fn key(service: &str, operation: &str) -> (String, String) {
    (service.to_string(), operation.to_string())
}

/// A test harness around one binding and one client.
pub struct ReconcileTester<R: Resource, C: ApiClient> {
    resource: R,
    client: C,
    ctx: Context,
}

impl<R: Resource, C: ApiClient> ReconcileTester<R, C> {
    /// Create a tester running with a default (non dry-run) context.
    pub fn new(resource: R, client: C) -> Self {
        Self {
            resource,
            client,
            ctx: Context::new(),
        }
    }

    /// Use `ctx` for every call.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// Switch dry-run mode.
    pub fn dry_run(mut self, test: bool) -> Self {
        self.ctx.test = test;
        self
    }

    /// The binding under test.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// The client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The context used for calls.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.resource, &self.client)
    }

    /// Run `present` with JSON parameters.
    ///
    /// Malformed parameters yield a failed envelope.
    pub async fn present(&self, name: &str, params: Value) -> Envelope {
        match DesiredState::from_params(name, params) {
            Ok(desired) => self.present_state(desired).await,
            Err(err) => Envelope::from_error(name, &err),
        }
    }

    /// Run `present` with a typed desired state.
    pub async fn present_state(&self, desired: DesiredState) -> Envelope {
        self.reconciler().present(&self.ctx, desired).await
    }

    /// Run `absent`.
    pub async fn absent(&self, name: &str, resource_id: Option<&str>) -> Envelope {
        self.reconciler().absent(&self.ctx, name, resource_id).await
    }

    /// Run `describe`.
    pub async fn describe(&self) -> Describe {
        self.reconciler().describe(&self.ctx).await
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that an envelope reports success.
///
/// # Panics
///
/// Panics if `result` is false.
pub fn assert_succeeded(envelope: &Envelope) {
    assert!(
        envelope.result(),
        "Expected success for '{}', got {:?}: {:?}",
        envelope.name,
        envelope.error_kind(),
        envelope.comment
    );
}

/// Assert that an envelope failed with `kind`.
///
/// # Panics
///
/// Panics if the call succeeded or failed with another kind.
pub fn assert_failed(envelope: &Envelope, kind: ErrorKind) {
    assert_eq!(
        envelope.error_kind(),
        Some(kind),
        "Expected '{}' to fail with {}, comments: {:?}",
        envelope.name,
        kind,
        envelope.comment
    );
}

/// Assert that an envelope describes a successful no-op.
///
/// # Panics
///
/// Panics unless the call succeeded with `old_state == new_state`.
pub fn assert_no_op(envelope: &Envelope) {
    assert_succeeded(envelope);
    assert!(envelope.old_state.is_some(), "Expected an existing resource");
    assert_eq!(
        envelope.old_state, envelope.new_state,
        "Expected old_state and new_state to be equal"
    );
}

/// Assert that some comment contains `needle`.
///
/// # Panics
///
/// Panics if no comment contains `needle`.
pub fn assert_comment_contains(envelope: &Envelope, needle: &str) {
    assert!(
        envelope.has_comment(needle),
        "Expected a comment containing {:?}, got {:?}",
        needle,
        envelope.comment
    );
}

/// Assert that no state-changing call reached the client.
///
/// # Panics
///
/// Panics if any recorded call is a mutation.
pub fn assert_no_mutations(client: &ScriptedClient) {
    let mutations = client.mutations();
    assert!(
        mutations.is_empty(),
        "Expected no mutating calls, got: {:?}",
        mutations
            .iter()
            .map(|c| format!("{}.{}", c.service, c.operation))
            .collect::<Vec<_>>()
    );
}
