//! The API client seam.
//!
//! Resource bindings never talk to a cloud SDK directly. They call
//! [`ApiClient::call`] with a service name, an operation name and JSON
//! parameters. [`ServiceRegistry`] is the explicit `(service, operation)`
//! locator that a host application fills with real handlers.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ClientError, UNKNOWN_OPERATION};

/// A boxed future returned by registered operation handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// An async operation handler.
pub type Handler = Arc<dyn Fn(Value) -> BoxFuture<Result<Value, ClientError>> + Send + Sync>;

/// Issues cloud API calls.
#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    /// Invoke `service.operation` with `params`.
    async fn call(&self, service: &str, operation: &str, params: Value)
        -> Result<Value, ClientError>;
}

#[async_trait::async_trait]
impl<T: ApiClient + ?Sized> ApiClient for Arc<T> {
    async fn call(
        &self,
        service: &str,
        operation: &str,
        params: Value,
    ) -> Result<Value, ClientError> {
        (**self).call(service, operation, params).await
    }
}

/// Explicit `(service, operation)` to handler mapping.
///
/// # Example
///
/// ```
/// use reconcile_sdk::client::{ApiClient, ServiceRegistry};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let registry = ServiceRegistry::new().with_operation("sqs", "get_queue_url", |params| async move {
///     Ok(json!({"QueueUrl": format!("https://sqs/{}", params["QueueName"].as_str().unwrap_or(""))}))
/// });
///
/// let out = registry
///     .call("sqs", "get_queue_url", json!({"QueueName": "q1"}))
///     .await
///     .unwrap();
/// assert_eq!(out["QueueUrl"], "https://sqs/q1");
/// # });
/// ```
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    handlers: HashMap<(String, String), Handler>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `service.operation`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, service: impl Into<String>, operation: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ClientError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |params| Box::pin(handler(params)));
        self.handlers
            .insert((service.into(), operation.into()), handler);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_operation<F, Fut>(
        mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ClientError>> + Send + 'static,
    {
        self.register(service, operation, handler);
        self
    }

    /// Whether `service.operation` has a handler.
    pub fn contains(&self, service: &str, operation: &str) -> bool {
        self.handlers
            .contains_key(&(service.to_string(), operation.to_string()))
    }

    /// Registered `(service, operation)` pairs, sorted.
    pub fn operations(&self) -> Vec<(String, String)> {
        let mut ops: Vec<_> = self.handlers.keys().cloned().collect();
        ops.sort();
        ops
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("operations", &self.operations())
            .finish()
    }
}

#[async_trait::async_trait]
impl ApiClient for ServiceRegistry {
    async fn call(
        &self,
        service: &str,
        operation: &str,
        params: Value,
    ) -> Result<Value, ClientError> {
        let key = (service.to_string(), operation.to_string());
        let Some(handler) = self.handlers.get(&key) else {
            warn!(service, operation, "no handler registered");
            return Err(ClientError::new(
                UNKNOWN_OPERATION,
                format!("No handler registered for {service}.{operation}"),
            ));
        };

        let params = strip_nulls(params);
        debug!(service, operation, %params, "calling");
        let result = handler(params).await;
        match &result {
            Ok(_) => debug!(service, operation, "call succeeded"),
            Err(e) => debug!(service, operation, code = %e.code, error = %e.message, "call failed"),
        }
        result
    }
}

/// Drop `null`-valued top-level parameters. The API treats an omitted
/// parameter and an explicit null differently.
pub fn strip_nulls(params: Value) -> Value {
    match params {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, value)| !value.is_null())
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}
