//! Issuing create, update and delete calls.

use crate::client::ApiClient;
use crate::diff::Diff;
use crate::error::ReconcileError;
use crate::tags::TagDiff;
use crate::types::DesiredState;

/// Applies changes to a resource type.
///
/// Every client failure is returned as a [`ReconcileError`] built with
/// [`ReconcileError::remote`], so the provider's code and message reach the
/// caller unchanged.
#[async_trait::async_trait]
pub trait Mutator: Send + Sync {
    /// Create the resource and return its new `resource_id`.
    async fn create(
        &self,
        client: &dyn ApiClient,
        desired: &DesiredState,
    ) -> Result<String, ReconcileError>;

    /// Apply the attribute changes in `diff`. Returns whether anything was sent.
    ///
    /// Only called when `diff` has attribute changes.
    async fn update(
        &self,
        client: &dyn ApiClient,
        resource_id: &str,
        desired: &DesiredState,
        diff: &Diff,
    ) -> Result<bool, ReconcileError>;

    /// Add and remove tags. Returns whether anything was sent.
    ///
    /// Only called with a non-empty diff.
    async fn update_tags(
        &self,
        client: &dyn ApiClient,
        resource_id: &str,
        tags: &TagDiff,
    ) -> Result<bool, ReconcileError>;

    /// Delete the resource. Returns whether a delete call was made.
    async fn delete(&self, client: &dyn ApiClient, resource_id: &str)
        -> Result<bool, ReconcileError>;
}
