//! Reconcile SDK
//!
//! Converge-and-wait primitives for declarative cloud resource state modules.
//! A state call fetches the current remote representation of a resource,
//! diffs it against the desired state, creates, updates or leaves it alone,
//! waits for the cloud to settle and reports a uniform envelope:
//!
//! ```text
//! {"name": .., "result": true, "comment": [..], "old_state": {..}, "new_state": {..}, "changes": {..}}
//! ```
//!
//! # Overview
//!
//! - **Resource bindings**: implement [`StateFetcher`], [`Mutator`] and
//!   [`Resource`] once per resource type
//! - **Reconciler**: the present/absent/describe state machine, including
//!   dry-run ("test") mode
//! - **Differ**: attribute and tag deltas with per-attribute comparison policies
//! - **Waiter**: bounded polling driven by declarative acceptor tables
//! - **Client seam**: [`ApiClient`] and the explicit [`ServiceRegistry`]
//! - **Resource registry**: dispatch by resource type name from raw JSON
//! - **Logging**: integration with `tracing`
//! - **Testing**: [`testing::ScriptedClient`] and assertion helpers
//!
//! # Quick Start
//!
//! ```ignore
//! use reconcile_sdk::{
//!     async_trait, ApiClient, Context, DesiredState, Diff, Mutator, ReconcileError,
//!     Reconciler, Resource, ResourceState, StateFetcher, TagDiff,
//! };
//!
//! struct Queue;
//!
//! #[async_trait]
//! impl StateFetcher for Queue {
//!     async fn fetch(
//!         &self,
//!         client: &dyn ApiClient,
//!         name: &str,
//!         resource_id: &str,
//!     ) -> Result<Option<ResourceState>, ReconcileError> {
//!         // call "sqs.get_queue_attributes" and convert the response
//!     }
//!
//!     // list(..)
//! }
//!
//! #[async_trait]
//! impl Mutator for Queue {
//!     // create(..), update(..), update_tags(..), delete(..)
//! }
//!
//! impl Resource for Queue {
//!     fn resource_type(&self) -> &str {
//!         "aws.sqs.queue"
//!     }
//! }
//!
//! async fn run(client: &dyn ApiClient) {
//!     let desired = DesiredState::new("q1").with_attribute("delay_seconds", serde_json::json!(0));
//!     let envelope = Reconciler::new(&Queue, client)
//!         .present(&Context::new(), desired)
//!         .await;
//!     println!("{}", envelope.to_value());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod comment;
pub mod diff;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod mutator;
pub mod reconcile;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod tags;
pub mod testing;
pub mod types;
pub mod validation;
pub mod waiter;

// Re-export main types at crate root
pub use client::{ApiClient, ServiceRegistry};
pub use diff::{Comparison, Diff, Differ};
pub use envelope::{Describe, Envelope};
pub use error::{ClientError, ErrorKind, ReconcileError};
pub use fetcher::{found_or_none, StateFetcher};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use mutator::Mutator;
pub use reconcile::Reconciler;
pub use registry::ResourceRegistry;
pub use resource::Resource;
pub use schema::{Attribute, AttributeType, ParameterSchema};
pub use tags::{diff_tags, TagDiff, Tags};
pub use types::{
    AttributeChange, Context, DesiredState, ResourceState, RESOURCE_ID_KNOWN_AFTER_PRESENT,
};
pub use validation::{is_valid, validate, validate_result};
pub use waiter::{TimeoutConfig, WaiterConfig, WaiterDefinition};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
