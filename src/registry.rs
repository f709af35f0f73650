//! Dispatch by resource type.
//!
//! A downstream engine addresses resources by type name (`aws.ec2.subnet`)
//! and hands over raw JSON `ctx` and parameters. [`ResourceRegistry`] maps
//! the type to its binding, decodes the JSON and runs the [`Reconciler`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::client::ApiClient;
use crate::envelope::{Describe, Envelope};
use crate::error::ReconcileError;
use crate::reconcile::Reconciler;
use crate::resource::Resource;
use crate::types::{Context, DesiredState};
use crate::waiter::TimeoutConfig;

/// Bindings by resource type, sharing one API client.
pub struct ResourceRegistry {
    client: Arc<dyn ApiClient>,
    resources: BTreeMap<String, Box<dyn Resource>>,
}

impl ResourceRegistry {
    /// Create an empty registry using `client` for every call.
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            resources: BTreeMap::new(),
        }
    }

    /// Register a binding under its own resource type.
    pub fn register<R: Resource + 'static>(&mut self, resource: R) {
        let resource_type = resource.resource_type().to_string();
        if self.resources.contains_key(&resource_type) {
            warn!(resource_type = %resource_type, "replacing registered binding");
        }
        self.resources.insert(resource_type, Box::new(resource));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_resource<R: Resource + 'static>(mut self, resource: R) -> Self {
        self.register(resource);
        self
    }

    /// Registered resource types, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// The reconciler for `resource_type`.
    pub fn reconciler(&self, resource_type: &str) -> Result<Reconciler<'_>, ReconcileError> {
        self.resources
            .get(resource_type)
            .map(|resource| Reconciler::new(resource.as_ref(), self.client.as_ref()))
            .ok_or_else(|| ReconcileError::UnknownResource(resource_type.to_string()))
    }

    /// Run `present` for `resource_type` with the engine's JSON.
    ///
    /// A `timeout` parameter is lifted into the context.
    #[instrument(skip(self, ctx, params), name = "registry.present")]
    pub async fn present(&self, ctx: Value, resource_type: &str, name: &str, params: Value) -> Envelope {
        let (ctx, params) = match split_timeout(ctx, params) {
            Ok(split) => split,
            Err(err) => return Envelope::from_error(name, &err),
        };
        let prepared = self
            .reconciler(resource_type)
            .and_then(|reconciler| Ok((reconciler, DesiredState::from_params(name, params)?)));
        match prepared {
            Ok((reconciler, desired)) => reconciler.present(&ctx, desired).await,
            Err(err) => {
                warn!(error = %err, "present rejected");
                Envelope::from_error(name, &err)
            },
        }
    }

    /// Run `absent` for `resource_type` with the engine's JSON.
    #[instrument(skip(self, ctx), name = "registry.absent")]
    pub async fn absent(
        &self,
        ctx: Value,
        resource_type: &str,
        name: &str,
        resource_id: Option<&str>,
    ) -> Envelope {
        let prepared = Context::from_value(ctx)
            .and_then(|ctx| Ok((ctx, self.reconciler(resource_type)?)));
        match prepared {
            Ok((ctx, reconciler)) => reconciler.absent(&ctx, name, resource_id).await,
            Err(err) => {
                warn!(error = %err, "absent rejected");
                Envelope::from_error(name, &err)
            },
        }
    }

    /// Run `describe` for `resource_type`.
    ///
    /// An unknown type or malformed context yields an empty map.
    #[instrument(skip(self, ctx), name = "registry.describe")]
    pub async fn describe(&self, ctx: Value, resource_type: &str) -> Describe {
        let prepared = Context::from_value(ctx)
            .and_then(|ctx| Ok((ctx, self.reconciler(resource_type)?)));
        match prepared {
            Ok((ctx, reconciler)) => reconciler.describe(&ctx).await,
            Err(err) => {
                warn!(error = %err, "describe rejected");
                Describe::new()
            },
        }
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

/// Parse `ctx` and move a `timeout` parameter into it.
fn split_timeout(ctx: Value, params: Value) -> Result<(Context, Value), ReconcileError> {
    let mut ctx = Context::from_value(ctx)?;
    let params = match params {
        Value::Object(mut map) => {
            if let Some(timeout) = map.remove("timeout").filter(|t| !t.is_null()) {
                debug!(%timeout, "timeout supplied with parameters");
                ctx.timeout = Some(serde_json::from_value::<TimeoutConfig>(timeout)?);
            }
            Value::Object(map)
        },
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    Ok((ctx, params))
}
