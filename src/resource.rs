//! Resource bindings.
//!
//! A binding teaches the SDK one resource type: how to read it, how to change
//! it, what parameters it takes and which waiters follow each mutation. The
//! [`Reconciler`](crate::reconcile::Reconciler) does the rest.

use serde_json::{json, Map, Value};

use crate::diff::Differ;
use crate::fetcher::StateFetcher;
use crate::mutator::Mutator;
use crate::schema::ParameterSchema;
use crate::types::ResourceState;
use crate::waiter::WaiterDefinition;

/// A resource type binding.
///
/// # Example
///
/// ```
/// use reconcile_sdk::serde_json::{json, Value};
/// use reconcile_sdk::{
///     async_trait, found_or_none, ApiClient, Attribute, DesiredState, Diff, Mutator,
///     ParameterSchema, ReconcileError, Resource, ResourceState, StateFetcher, TagDiff,
///     WaiterConfig, WaiterDefinition,
/// };
///
/// struct Queue;
///
/// #[async_trait]
/// impl StateFetcher for Queue {
///     async fn fetch(
///         &self,
///         client: &dyn ApiClient,
///         name: &str,
///         resource_id: &str,
///     ) -> Result<Option<ResourceState>, ReconcileError> {
///         let ret = client
///             .call("sqs", "get_queue_attributes", json!({"QueueUrl": resource_id}))
///             .await;
///         Ok(found_or_none("sqs", "get_queue_attributes", ret)?.map(|body| {
///             ResourceState::new(name, resource_id)
///                 .with_attribute("delay_seconds", body["Attributes"]["DelaySeconds"].clone())
///         }))
///     }
///
///     async fn list(&self, _client: &dyn ApiClient) -> Result<Vec<ResourceState>, ReconcileError> {
///         Ok(Vec::new())
///     }
/// }
///
/// #[async_trait]
/// impl Mutator for Queue {
///     async fn create(
///         &self,
///         client: &dyn ApiClient,
///         desired: &DesiredState,
///     ) -> Result<String, ReconcileError> {
///         let ret = client
///             .call("sqs", "create_queue", json!({"QueueName": desired.name}))
///             .await
///             .map_err(|e| ReconcileError::remote("sqs", "create_queue", e))?;
///         Ok(ret["QueueUrl"].as_str().unwrap_or_default().to_string())
///     }
///
///     async fn update(
///         &self,
///         client: &dyn ApiClient,
///         resource_id: &str,
///         _desired: &DesiredState,
///         diff: &Diff,
///     ) -> Result<bool, ReconcileError> {
///         let params = json!({"QueueUrl": resource_id, "Attributes": Value::Object(diff.desired_values())});
///         client
///             .call("sqs", "set_queue_attributes", params)
///             .await
///             .map_err(|e| ReconcileError::remote("sqs", "set_queue_attributes", e))?;
///         Ok(true)
///     }
///
///     async fn update_tags(
///         &self,
///         _client: &dyn ApiClient,
///         _resource_id: &str,
///         _tags: &TagDiff,
///     ) -> Result<bool, ReconcileError> {
///         Ok(false)
///     }
///
///     async fn delete(&self, client: &dyn ApiClient, resource_id: &str) -> Result<bool, ReconcileError> {
///         client
///             .call("sqs", "delete_queue", json!({"QueueUrl": resource_id}))
///             .await
///             .map_err(|e| ReconcileError::remote("sqs", "delete_queue", e))?;
///         Ok(true)
///     }
/// }
///
/// impl Resource for Queue {
///     fn resource_type(&self) -> &str {
///         "aws.sqs.queue"
///     }
///
///     fn schema(&self) -> ParameterSchema {
///         ParameterSchema::new().with_attribute("delay_seconds", Attribute::optional_int64())
///     }
///
///     fn delete_waiter(&self) -> Option<WaiterDefinition> {
///         Some(WaiterDefinition::until_deleted(
///             "queue_deleted",
///             "resource_id",
///             Vec::<String>::new(),
///             WaiterConfig::new(1, 60),
///         ))
///     }
/// }
///
/// assert_eq!(Queue.resource_type(), "aws.sqs.queue");
/// assert!(Queue.schema().attribute("delay_seconds").is_some());
/// ```
pub trait Resource: StateFetcher + Mutator {
    /// The resource type, e.g. `aws.ec2.subnet`.
    fn resource_type(&self) -> &str;

    /// Parameters this resource accepts.
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    /// The differ used to compare current and desired state.
    fn differ(&self) -> Differ {
        self.schema().differ()
    }

    /// Waiter run after create.
    fn create_waiter(&self) -> Option<WaiterDefinition> {
        None
    }

    /// Waiter run after update.
    fn update_waiter(&self) -> Option<WaiterDefinition> {
        None
    }

    /// Waiter run after delete.
    fn delete_waiter(&self) -> Option<WaiterDefinition> {
        None
    }

    /// Render a state as the parameter list `describe` emits, one
    /// single-key object per parameter.
    fn describe_params(&self, state: &ResourceState) -> Vec<Value> {
        let mut params = vec![
            json!({ "name": state.name }),
            json!({ "resource_id": state.resource_id }),
        ];
        params.extend(
            state
                .attributes
                .iter()
                .map(|(key, value)| single(key, value.clone())),
        );
        if !state.tags.is_empty() {
            params.push(json!({ "tags": state.tags }));
        }
        params
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}
