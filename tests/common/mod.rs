//! Example bindings used by the integration tests: an SQS queue and an EC2
//! subnet, both talking to the API through `ApiClient`.

#![allow(dead_code)]

use reconcile_sdk::comment;
use reconcile_sdk::diff::Diff;
use reconcile_sdk::schema::AttributeFlags;
use reconcile_sdk::serde_json::{json, Map, Value};
use reconcile_sdk::tags;
use reconcile_sdk::waiter::{TimeoutConfig, WaiterOverride};
use reconcile_sdk::{
    async_trait, found_or_none, ApiClient, Attribute, AttributeType, Comparison, Context,
    DesiredState, Mutator, ParameterSchema, ReconcileError, Resource, ResourceState, StateFetcher,
    TagDiff, WaiterConfig, WaiterDefinition,
};

pub fn init() {
    reconcile_sdk::logging::init_test_logging();
}

/// A context whose waiters never sleep.
pub fn fast_context() -> Context {
    let fast = Some(WaiterOverride {
        delay: Some(0),
        max_attempts: None,
    });
    Context::new().with_timeout(TimeoutConfig {
        create: fast,
        update: fast,
        delete: fast,
    })
}

fn remote(service: &str, operation: &str) -> impl FnOnce(reconcile_sdk::ClientError) -> ReconcileError {
    let service = service.to_string();
    let operation = operation.to_string();
    move |err| ReconcileError::remote(service, operation, err)
}

// =========================================================================
// aws.sqs.queue
// =========================================================================

pub const QUEUE_TYPE: &str = "aws.sqs.queue";

/// Parameter name to SQS attribute name.
const QUEUE_ATTRIBUTES: &[(&str, &str)] = &[
    ("delay_seconds", "DelaySeconds"),
    ("visibility_timeout", "VisibilityTimeout"),
    ("message_retention_period", "MessageRetentionPeriod"),
    ("fifo_queue", "FifoQueue"),
    ("policy", "Policy"),
];

pub struct Queue;

impl Queue {
    fn to_state(name: &str, url: &str, attributes: &Value, tags: &Value) -> ResourceState {
        let mut state = ResourceState::new(name, url);
        for (param, key) in QUEUE_ATTRIBUTES {
            let Some(raw) = attributes.get(*key).and_then(Value::as_str) else {
                continue;
            };
            let value = match *param {
                "policy" => Value::String(raw.to_string()),
                "fifo_queue" => json!(raw == "true"),
                _ => raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(raw)),
            };
            state.attributes.insert(param.to_string(), value);
        }
        if let Some(arn) = attributes.get("QueueArn") {
            state.attributes.insert("queue_arn".to_string(), arn.clone());
        }
        if let Ok(parsed) = tags::from_value(tags.clone()) {
            state.tags = parsed;
        }
        state
    }

    fn to_attributes(values: &Map<String, Value>) -> Map<String, Value> {
        QUEUE_ATTRIBUTES
            .iter()
            .filter_map(|(param, key)| {
                let value = values.get(*param)?;
                let encoded = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.to_string(), Value::String(encoded)))
            })
            .collect()
    }
}

#[async_trait]
impl StateFetcher for Queue {
    async fn fetch(
        &self,
        client: &dyn ApiClient,
        name: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceState>, ReconcileError> {
        let ret = client
            .call(
                "sqs",
                "get_queue_attributes",
                json!({"QueueUrl": resource_id, "AttributeNames": ["All"]}),
            )
            .await;
        let Some(ret) = found_or_none("sqs", "get_queue_attributes", ret)? else {
            return Ok(None);
        };
        let tags = client
            .call("sqs", "list_queue_tags", json!({"QueueUrl": resource_id}))
            .await
            .map_err(remote("sqs", "list_queue_tags"))?;
        Ok(Some(Self::to_state(name, resource_id, &ret["Attributes"], &tags["Tags"])))
    }

    async fn list(&self, client: &dyn ApiClient) -> Result<Vec<ResourceState>, ReconcileError> {
        let ret = client
            .call("sqs", "list_queues", json!({}))
            .await
            .map_err(remote("sqs", "list_queues"))?;
        let mut states = Vec::new();
        for url in ret["QueueUrls"].as_array().into_iter().flatten() {
            let Some(url) = url.as_str() else { continue };
            let name = url.rsplit('/').next().unwrap_or(url);
            if let Some(state) = self.fetch(client, name, url).await? {
                states.push(state);
            }
        }
        Ok(states)
    }
}

#[async_trait]
impl Mutator for Queue {
    async fn create(
        &self,
        client: &dyn ApiClient,
        desired: &DesiredState,
    ) -> Result<String, ReconcileError> {
        let ret = client
            .call(
                "sqs",
                "create_queue",
                json!({
                    "QueueName": desired.name,
                    "Attributes": Self::to_attributes(&desired.attributes),
                    "tags": desired.tags,
                }),
            )
            .await
            .map_err(remote("sqs", "create_queue"))?;
        ret["QueueUrl"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ReconcileError::NotFound("create_queue returned no QueueUrl".to_string()))
    }

    async fn update(
        &self,
        client: &dyn ApiClient,
        resource_id: &str,
        _desired: &DesiredState,
        diff: &Diff,
    ) -> Result<bool, ReconcileError> {
        let attributes = Self::to_attributes(&diff.desired_values());
        if attributes.is_empty() {
            return Ok(false);
        }
        client
            .call(
                "sqs",
                "set_queue_attributes",
                json!({"QueueUrl": resource_id, "Attributes": attributes}),
            )
            .await
            .map_err(remote("sqs", "set_queue_attributes"))?;
        Ok(true)
    }

    async fn update_tags(
        &self,
        client: &dyn ApiClient,
        resource_id: &str,
        tags: &TagDiff,
    ) -> Result<bool, ReconcileError> {
        if !tags.to_remove.is_empty() {
            let keys: Vec<&String> = tags.to_remove.keys().collect();
            client
                .call("sqs", "untag_queue", json!({"QueueUrl": resource_id, "TagKeys": keys}))
                .await
                .map_err(remote("sqs", "untag_queue"))?;
        }
        if !tags.to_add.is_empty() {
            client
                .call("sqs", "tag_queue", json!({"QueueUrl": resource_id, "Tags": tags.to_add}))
                .await
                .map_err(remote("sqs", "tag_queue"))?;
        }
        Ok(!tags.is_empty())
    }

    async fn delete(&self, client: &dyn ApiClient, resource_id: &str) -> Result<bool, ReconcileError> {
        client
            .call("sqs", "delete_queue", json!({"QueueUrl": resource_id}))
            .await
            .map_err(remote("sqs", "delete_queue"))?;
        Ok(true)
    }
}

impl Resource for Queue {
    fn resource_type(&self) -> &str {
        QUEUE_TYPE
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_attribute("delay_seconds", Attribute::optional_int64())
            .with_attribute("visibility_timeout", Attribute::optional_int64())
            .with_attribute("message_retention_period", Attribute::optional_int64())
            .with_attribute("fifo_queue", Attribute::optional_bool().create_only())
            .with_attribute("policy", Attribute::optional_document())
            .with_attribute("queue_arn", Attribute::computed_string())
    }

    fn delete_waiter(&self) -> Option<WaiterDefinition> {
        Some(WaiterDefinition::until_deleted(
            "queue_deleted",
            "queue_arn",
            Vec::<String>::new(),
            WaiterConfig::new(1, 60),
        ))
    }
}

// =========================================================================
// aws.ec2.subnet
// =========================================================================

pub const SUBNET_TYPE: &str = "aws.ec2.subnet";

pub struct Subnet;

impl Subnet {
    fn to_state(name: &str, raw: &Value) -> ResourceState {
        let tag_list = raw["Tags"].as_array().map(Vec::as_slice).unwrap_or(&[]);
        let mut state = ResourceState::new(name, raw["SubnetId"].as_str().unwrap_or_default())
            .with_tags(tags::from_list(tag_list));
        for (param, key) in [
            ("vpc_id", "VpcId"),
            ("cidr_block", "CidrBlock"),
            ("availability_zone", "AvailabilityZone"),
            ("map_public_ip_on_launch", "MapPublicIpOnLaunch"),
            ("state", "State"),
        ] {
            if let Some(value) = raw.get(key).filter(|v| !v.is_null()) {
                state.attributes.insert(param.to_string(), value.clone());
            }
        }
        state
    }

    fn name_of(raw: &Value) -> String {
        raw["Tags"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|tag| tag["Key"] == "Name")
            .and_then(|tag| tag["Value"].as_str())
            .or_else(|| raw["SubnetId"].as_str())
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl StateFetcher for Subnet {
    async fn fetch(
        &self,
        client: &dyn ApiClient,
        name: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceState>, ReconcileError> {
        let ret = client
            .call("ec2", "describe_subnets", json!({"SubnetIds": [resource_id]}))
            .await;
        let Some(ret) = found_or_none("ec2", "describe_subnets", ret)? else {
            return Ok(None);
        };
        Ok(ret["Subnets"]
            .as_array()
            .and_then(|subnets| subnets.first())
            .map(|raw| Self::to_state(name, raw)))
    }

    async fn list(&self, client: &dyn ApiClient) -> Result<Vec<ResourceState>, ReconcileError> {
        let ret = client
            .call("ec2", "describe_subnets", json!({}))
            .await
            .map_err(remote("ec2", "describe_subnets"))?;
        Ok(ret["Subnets"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|raw| Self::to_state(&Self::name_of(raw), raw))
            .collect())
    }
}

#[async_trait]
impl Mutator for Subnet {
    async fn create(
        &self,
        client: &dyn ApiClient,
        desired: &DesiredState,
    ) -> Result<String, ReconcileError> {
        let tag_specifications = desired.tags.as_ref().filter(|t| !t.is_empty()).map(|t| {
            json!([{"ResourceType": "subnet", "Tags": tags::to_list(t)}])
        });
        let ret = client
            .call(
                "ec2",
                "create_subnet",
                json!({
                    "VpcId": desired.attribute("vpc_id"),
                    "CidrBlock": desired.attribute("cidr_block"),
                    "AvailabilityZone": desired.attribute("availability_zone"),
                    "TagSpecifications": tag_specifications,
                }),
            )
            .await
            .map_err(remote("ec2", "create_subnet"))?;
        ret["Subnet"]["SubnetId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ReconcileError::NotFound("create_subnet returned no SubnetId".to_string()))
    }

    async fn update(
        &self,
        client: &dyn ApiClient,
        resource_id: &str,
        _desired: &DesiredState,
        diff: &Diff,
    ) -> Result<bool, ReconcileError> {
        let Some(change) = diff.attributes.get("map_public_ip_on_launch") else {
            return Ok(false);
        };
        client
            .call(
                "ec2",
                "modify_subnet_attribute",
                json!({"SubnetId": resource_id, "MapPublicIpOnLaunch": {"Value": change.after}}),
            )
            .await
            .map_err(remote("ec2", "modify_subnet_attribute"))?;
        Ok(true)
    }

    async fn update_tags(
        &self,
        client: &dyn ApiClient,
        resource_id: &str,
        tags: &TagDiff,
    ) -> Result<bool, ReconcileError> {
        if !tags.to_remove.is_empty() {
            client
                .call(
                    "ec2",
                    "delete_tags",
                    json!({"Resources": [resource_id], "Tags": tags.remove_key_list()}),
                )
                .await
                .map_err(remote("ec2", "delete_tags"))?;
        }
        if !tags.to_add.is_empty() {
            client
                .call(
                    "ec2",
                    "create_tags",
                    json!({"Resources": [resource_id], "Tags": tags.add_list()}),
                )
                .await
                .map_err(remote("ec2", "create_tags"))?;
        }
        Ok(!tags.is_empty())
    }

    async fn delete(&self, client: &dyn ApiClient, resource_id: &str) -> Result<bool, ReconcileError> {
        client
            .call("ec2", "delete_subnet", json!({"SubnetId": resource_id}))
            .await
            .map_err(remote("ec2", "delete_subnet"))?;
        Ok(true)
    }
}

impl Resource for Subnet {
    fn resource_type(&self) -> &str {
        SUBNET_TYPE
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_attribute("vpc_id", Attribute::required_string().create_only())
            .with_attribute("cidr_block", Attribute::optional_string().create_only())
            .with_attribute(
                "availability_zone",
                Attribute::optional_string().create_only(),
            )
            .with_attribute("map_public_ip_on_launch", Attribute::optional_bool())
            .with_attribute(
                "ipv6_cidr_blocks",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_comparison(Comparison::Unordered)
                .conflicts_with("cidr_block"),
            )
            .with_attribute("state", Attribute::computed_string())
            .strict()
    }

    fn create_waiter(&self) -> Option<WaiterDefinition> {
        Some(WaiterDefinition::until_status(
            "subnet_available",
            "state",
            ["available"],
            Vec::<String>::new(),
            WaiterConfig::new(15, 40),
        ))
    }

    fn delete_waiter(&self) -> Option<WaiterDefinition> {
        Some(WaiterDefinition::until_deleted(
            "subnet_deleted",
            "state",
            Vec::<String>::new(),
            WaiterConfig::new(15, 40),
        ))
    }
}

/// A raw `describe_subnets` entry.
pub fn subnet_body(id: &str, state: &str, tags: &[(&str, &str)]) -> Value {
    let tags: Vec<Value> = tags
        .iter()
        .map(|(k, v)| json!({"Key": k, "Value": v}))
        .collect();
    json!({
        "SubnetId": id,
        "VpcId": "vpc-1",
        "CidrBlock": "10.0.1.0/24",
        "AvailabilityZone": "us-east-1a",
        "MapPublicIpOnLaunch": false,
        "State": state,
        "Tags": tags,
    })
}

pub fn describe_subnets(bodies: Vec<Value>) -> Value {
    json!({ "Subnets": bodies })
}

/// The comment a successful creation produces.
pub fn created(resource_type: &str, name: &str) -> String {
    comment::created(resource_type, name)
}
