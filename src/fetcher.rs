//! Reading current remote state.

use crate::client::ApiClient;
use crate::error::{ClientError, ErrorKind, ReconcileError};
use crate::types::ResourceState;

/// Reads the current representation of a resource type.
///
/// Fetchers are read-only. A resource that does not exist is `Ok(None)`, never
/// an error.
#[async_trait::async_trait]
pub trait StateFetcher: Send + Sync {
    /// Fetch the resource identified by `resource_id`, labelled with `name`.
    async fn fetch(
        &self,
        client: &dyn ApiClient,
        name: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceState>, ReconcileError>;

    /// List every resource of this type visible to the client.
    async fn list(&self, client: &dyn ApiClient) -> Result<Vec<ResourceState>, ReconcileError>;
}

/// Turn a not-found client error into `Ok(None)`.
///
/// Every other error becomes [`ReconcileError::RemoteCallFailed`] for
/// `service.operation`.
///
/// ```
/// use reconcile_sdk::error::ClientError;
/// use reconcile_sdk::fetcher::found_or_none;
///
/// let gone: Result<u32, _> = Err(ClientError::new("InvalidSubnetID.NotFound", "gone"));
/// assert_eq!(found_or_none("ec2", "describe_subnets", gone).unwrap(), None);
///
/// let denied: Result<u32, _> = Err(ClientError::new("UnauthorizedOperation", "no"));
/// assert!(found_or_none("ec2", "describe_subnets", denied).is_err());
/// ```
pub fn found_or_none<T>(
    service: &str,
    operation: &str,
    result: Result<T, ClientError>,
) -> Result<Option<T>, ReconcileError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(service, operation, code = %err.code, "resource not found");
            Ok(None)
        },
        Err(err) => Err(ReconcileError::remote(service, operation, err)),
    }
}

/// Fold a fetch error classified as not-found into `Ok(None)`.
pub fn none_if_not_found(
    result: Result<Option<ResourceState>, ReconcileError>,
) -> Result<Option<ResourceState>, ReconcileError> {
    match result {
        Err(err) if err.is_not_found() => Ok(None),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_found_or_none() {
        let found: Result<&str, ClientError> = Ok("subnet-1");
        assert_eq!(
            assert_ok!(found_or_none("ec2", "describe_subnets", found)),
            Some("subnet-1")
        );

        let gone: Result<&str, ClientError> =
            Err(ClientError::new("AWS.SimpleQueueService.NonExistentQueue", "no queue"));
        assert_eq!(assert_ok!(found_or_none("sqs", "get_queue_attributes", gone)), None);

        let failed: Result<&str, ClientError> = Err(ClientError::new("Throttling", "slow down"));
        let err = found_or_none("sqs", "get_queue_attributes", failed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteCallFailed);
    }

    #[test]
    fn test_none_if_not_found() {
        let result = none_if_not_found(Err(ReconcileError::NotFound("gone".to_string())));
        assert_eq!(assert_ok!(result), None);

        let result = none_if_not_found(Err(ReconcileError::remote(
            "sqs",
            "get_queue_attributes",
            ClientError::new("AWS.SimpleQueueService.NonExistentQueue", "gone"),
        )));
        assert_eq!(assert_ok!(result), None);

        let result = none_if_not_found(Err(ReconcileError::ValidationConflict("x".to_string())));
        assert!(result.is_err());
    }
}
