//! The present/absent/describe state machine.
//!
//! [`Reconciler`] drives one [`Resource`] binding against one [`ApiClient`].
//! Its entry points never return errors or panic: every failure ends up in
//! the returned [`Envelope`] with its [`ErrorKind`](crate::error::ErrorKind).
//!
//! # Present
//!
//! 1. Validate the desired state against the binding's schema.
//! 2. No `resource_id`: create (or simulate the creation in dry-run mode).
//! 3. `resource_id` given but nothing found: fail, or re-create when the
//!    context asks for it.
//! 4. Found and nothing differs: no-op.
//! 5. Found and something differs: update attributes, then tags, then wait
//!    and re-read.
//!
//! Dry-run mode never calls a mutator or a waiter.

use std::collections::BTreeMap;

use tracing::{debug, error, info, instrument, warn};

use crate::client::ApiClient;
use crate::comment;
use crate::envelope::{Describe, Envelope};
use crate::error::{ErrorKind, ReconcileError};
use crate::fetcher::none_if_not_found;
use crate::resource::Resource;
use crate::schema::Diagnostic;
use crate::types::{Context, DesiredState, ResourceState, RESOURCE_ID_KNOWN_AFTER_PRESENT};
use crate::validation::{validate, validate_update};
use crate::waiter::{Phase, WaitReport, Waiter, WaiterDefinition};

/// Reconciles one resource type through one API client.
pub struct Reconciler<'a> {
    resource: &'a dyn Resource,
    client: &'a dyn ApiClient,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler.
    pub fn new(resource: &'a dyn Resource, client: &'a dyn ApiClient) -> Self {
        Self { resource, client }
    }

    /// The resource type this reconciler handles.
    pub fn resource_type(&self) -> &str {
        self.resource.resource_type()
    }

    /// Make sure the resource exists and matches `desired`.
    #[instrument(
        skip(self, ctx, desired),
        name = "reconcile.present",
        fields(resource_type = %self.resource.resource_type(), name = %desired.name, test = ctx.test)
    )]
    pub async fn present(&self, ctx: &Context, desired: DesiredState) -> Envelope {
        let mut envelope = Envelope::new(desired.name.clone());

        let diagnostics = validate(&self.resource.schema(), &desired);
        if reject(&mut envelope, diagnostics) {
            return envelope;
        }

        let current = match desired.resource_id.as_deref() {
            None => None,
            Some(resource_id) => match self.fetch(&desired.name, resource_id).await {
                Ok(Some(state)) => Some(state),
                Ok(None) if ctx.recreate_if_deleted => {
                    warn!(resource_id, "resource no longer exists, re-creating it");
                    None
                },
                Ok(None) => {
                    warn!(resource_id, "resource not found");
                    envelope.push_comment(comment::get_empty(self.resource_type(), &desired.name));
                    envelope.fail(ErrorKind::NotFound);
                    return envelope;
                },
                Err(err) => {
                    error!(resource_id, error = %err, "fetch failed");
                    envelope.fail_with(&err);
                    return envelope;
                },
            },
        };

        let applied = match current {
            None => self.create(ctx, &desired, &mut envelope).await,
            Some(current) => self.converge(ctx, &desired, current, &mut envelope).await,
        };
        if let Err(err) = applied {
            error!(error = %err, kind = %err.kind(), "present failed");
            envelope.fail_with(&err);
        }
        envelope
    }

    /// Make sure the resource does not exist.
    #[instrument(
        skip(self, ctx),
        name = "reconcile.absent",
        fields(resource_type = %self.resource.resource_type(), test = ctx.test)
    )]
    pub async fn absent(&self, ctx: &Context, name: &str, resource_id: Option<&str>) -> Envelope {
        let mut envelope = Envelope::new(name);

        let Some(resource_id) = resource_id.filter(|id| !id.is_empty()) else {
            debug!("no resource_id given");
            envelope.push_comment(comment::already_absent(self.resource_type(), name));
            return envelope;
        };

        if let Err(err) = self.remove(ctx, name, resource_id, &mut envelope).await {
            error!(error = %err, kind = %err.kind(), "absent failed");
            envelope.fail_with(&err);
        }
        envelope
    }

    /// List every resource of this type in the engine's re-creatable shape.
    ///
    /// A listing failure is logged and yields an empty map.
    #[instrument(
        skip(self, ctx),
        name = "reconcile.describe",
        fields(resource_type = %self.resource.resource_type(), test = ctx.test)
    )]
    pub async fn describe(&self, ctx: &Context) -> Describe {
        let mut described = Describe::new();
        let states = match self.resource.list(self.client).await {
            Ok(states) => states,
            Err(err) => {
                warn!(error = %err, "describe could not list resources");
                return described;
            },
        };

        let key = format!("{}.present", self.resource_type());
        for state in states {
            let params = self.resource.describe_params(&state);
            described.insert(
                state.resource_id.clone(),
                BTreeMap::from([(key.clone(), params)]),
            );
        }
        info!(count = described.len(), "describe completed");
        described
    }

    async fn create(
        &self,
        ctx: &Context,
        desired: &DesiredState,
        envelope: &mut Envelope,
    ) -> Result<(), ReconcileError> {
        let resource_type = self.resource_type();
        let name = desired.name.as_str();

        if ctx.test {
            envelope.new_state = Some(desired.to_planned_state(RESOURCE_ID_KNOWN_AFTER_PRESENT));
            envelope.push_comment(comment::would_create(resource_type, name));
            return Ok(());
        }

        let resource_id = self.resource.create(self.client, desired).await?;
        info!(resource_id = %resource_id, "created");
        envelope.push_comment(comment::created(resource_type, name));

        if let Some(waiter) = self.resource.create_waiter() {
            self.wait(&waiter, Phase::Create, ctx, name, &resource_id)
                .await?;
        }

        envelope.new_state = Some(self.refresh(name, &resource_id).await?);
        Ok(())
    }

    async fn converge(
        &self,
        ctx: &Context,
        desired: &DesiredState,
        current: ResourceState,
        envelope: &mut Envelope,
    ) -> Result<(), ReconcileError> {
        let resource_type = self.resource_type();
        let name = desired.name.as_str();
        let differ = self.resource.differ();
        let diff = differ.diff(&current, desired);
        envelope.old_state = Some(current.clone());

        if diff.is_empty() {
            debug!("no changes");
            envelope.push_comment(comment::already_exists(resource_type, name));
            envelope.new_state = Some(current);
            return Ok(());
        }

        if reject(envelope, validate_update(&self.resource.schema(), &diff)) {
            return Ok(());
        }
        debug!(changed = ?diff.changed_paths(), tags = diff.tag_changes().is_some(), "diff computed");

        if ctx.test {
            envelope.new_state = Some(differ.plan_state(&current, &diff));
            if let Some(tags) = diff.tag_changes() {
                envelope.push_comment(comment::would_update_tags(tags));
            }
            envelope.push_comment(comment::would_update(resource_type, name));
            return Ok(());
        }

        let resource_id = current.resource_id.as_str();
        let mut updated = false;
        if diff.has_attribute_changes()
            && self
                .resource
                .update(self.client, resource_id, desired, &diff)
                .await?
        {
            envelope.push_comment(comment::updated(resource_type, name));
            updated = true;
        }
        if let Some(tags) = diff.tag_changes() {
            if self
                .resource
                .update_tags(self.client, resource_id, tags)
                .await?
            {
                envelope.push_comment(comment::update_tags(tags));
                if !updated {
                    envelope.push_comment(comment::updated(resource_type, name));
                    updated = true;
                }
            }
        }

        if !updated {
            debug!("binding reported nothing to update");
            envelope.push_comment(comment::already_exists(resource_type, name));
            envelope.new_state = Some(current);
            return Ok(());
        }
        info!(resource_id, "updated");

        if let Some(waiter) = self.resource.update_waiter() {
            self.wait(&waiter, Phase::Update, ctx, name, resource_id)
                .await?;
        }

        envelope.new_state = Some(self.refresh(name, resource_id).await?);
        Ok(())
    }

    async fn remove(
        &self,
        ctx: &Context,
        name: &str,
        resource_id: &str,
        envelope: &mut Envelope,
    ) -> Result<(), ReconcileError> {
        let resource_type = self.resource_type();

        let Some(current) = self.fetch(name, resource_id).await? else {
            envelope.push_comment(comment::already_absent(resource_type, name));
            return Ok(());
        };
        envelope.old_state = Some(current);

        if ctx.test {
            envelope.push_comment(comment::would_delete(resource_type, name));
            return Ok(());
        }

        match self.resource.delete(self.client, resource_id).await {
            Ok(_) => {},
            // The code may name a dependency, so only a fresh read proves absence.
            Err(err) if err.is_not_found() => {
                if self.fetch(name, resource_id).await?.is_some() {
                    return Err(err);
                }
                debug!(resource_id, "resource disappeared before delete");
                envelope.push_comment(comment::already_absent(resource_type, name));
                return Ok(());
            },
            Err(err) => return Err(err),
        }

        if let Some(waiter) = self.resource.delete_waiter() {
            self.wait(&waiter, Phase::Delete, ctx, name, resource_id)
                .await?;
        }
        info!(resource_id, "deleted");
        envelope.push_comment(comment::deleted(resource_type, name));
        Ok(())
    }

    async fn fetch(
        &self,
        name: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceState>, ReconcileError> {
        none_if_not_found(self.resource.fetch(self.client, name, resource_id).await)
    }

    /// Re-read a resource after a mutation. It must exist.
    async fn refresh(&self, name: &str, resource_id: &str) -> Result<ResourceState, ReconcileError> {
        self.fetch(name, resource_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(comment::get_empty(self.resource_type(), name)))
    }

    async fn wait(
        &self,
        definition: &WaiterDefinition,
        phase: Phase,
        ctx: &Context,
        name: &str,
        resource_id: &str,
    ) -> Result<WaitReport, ReconcileError> {
        let waiter = Waiter::for_phase(definition, phase, ctx.timeout.as_ref());
        debug!(waiter = %definition.name, ?phase, config = ?waiter.config(), "waiting");
        waiter
            .wait(|| self.fetch(name, resource_id))
            .await
    }
}

/// Record error diagnostics on the envelope and fail it. Returns whether it
/// failed. Warnings are only logged.
fn reject(envelope: &mut Envelope, diagnostics: Vec<Diagnostic>) -> bool {
    let mut rejected = false;
    for diagnostic in diagnostics {
        if diagnostic.is_error() {
            envelope.push_comment(diagnostic.to_comment());
            rejected = true;
        } else {
            warn!(summary = %diagnostic.summary, "parameter warning");
        }
    }
    if rejected {
        warn!(errors = envelope.comment.len(), "parameters rejected");
        envelope.fail(ErrorKind::ValidationConflict);
    }
    rejected
}
