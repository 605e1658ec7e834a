//! Provider resource reconciliation
//!
//! Every intent resource (inventory, instance, connection) is backed by a
//! provider-specific resource of the same name and namespace. One pass of
//! [`ProviderReconciler::reconcile_provider_resource`]:
//!
//! 1. Seeds the managed condition from the intent (or `ReconcileInProgress`)
//! 2. Resolves the DBaaSProvider named by the caller
//! 3. Projects the intent spec into the provider's shape
//! 4. Creates or updates the provider resource, owned by the intent
//! 5. Parses the stored provider resource into the adapter's typed shape
//! 6. Reduces the provider status to the managed condition
//!
//! Whatever step the pass stops at, the seed condition is merged into the
//! intent and the status is written exactly once on the way out.
//!
//! Conflicts are never retried inside a pass. They set `requeue` and the
//! controller schedules another pass.

mod adapters;

use std::sync::Arc;
use std::time::Duration;

use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::crd::{
    find_condition, message, reason, set_condition, Condition, ConditionStatus, DBaaSProvider,
    IntentResource,
};
use crate::gateway::{create_or_update, ResourceGateway};
use crate::kube_utils::provider_api_resource;
use crate::metrics::{Metrics, ACTION_CREATE_OR_UPDATE};
use crate::ownership::set_controller_reference;
use crate::Error;

pub use adapters::{ConnectionAdapter, InstanceAdapter, InventoryAdapter, ProviderResource};

/// Per-kind strategy plugged into the engine.
///
/// One adapter exists for each intent/provider resource pair. The engine
/// itself never branches on the kind it is reconciling.
pub trait ProviderAdapter: Send + Sync {
    /// Intent resource the adapter reconciles
    type Intent: IntentResource;

    /// Typed view of the provider resource the status is read from
    type ProviderObject: DeserializeOwned;

    /// Provider-specific kind backing the intent
    fn provider_kind(&self, provider: &DBaaSProvider) -> String;

    /// Desired provider spec for `intent`
    fn project_spec(&self, intent: &Self::Intent) -> Result<serde_json::Value, Error>;

    /// Copy provider status into `intent` and compute the managed condition
    fn reduce_status(&self, intent: &mut Self::Intent, provider: Self::ProviderObject)
        -> Condition;
}

/// Result of one reconcile pass
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// The controller should run another pass soon
    pub requeue: bool,
    /// The first error the pass hit
    pub error: Option<Error>,
}

impl PassOutcome {
    /// Outcome carrying `error`
    pub fn failed(error: Error) -> Self {
        Self {
            requeue: false,
            error: Some(error),
        }
    }

    /// Map the outcome onto a controller action
    pub fn into_action(self, requeue_after: Duration) -> Result<Action, Error> {
        match self.error {
            Some(e) => Err(e),
            None if self.requeue => Ok(Action::requeue(requeue_after)),
            None => Ok(Action::await_change()),
        }
    }
}

/// How the sync part of a pass ended without an error
enum SyncFlow {
    Done,
    Requeue,
}

/// The managed condition a pass starts from when the intent has none
pub fn in_progress_condition(type_: &str) -> Condition {
    Condition::new(
        type_,
        ConditionStatus::False,
        reason::RECONCILE_IN_PROGRESS,
        message::PROVIDER_RECONCILE_IN_PROGRESS,
    )
}

/// Reconciles provider resources for any [`ProviderAdapter`]
pub struct ProviderReconciler {
    gateway: Arc<dyn ResourceGateway>,
    metrics: Arc<Metrics>,
}

impl ProviderReconciler {
    /// Create a reconciler over `gateway`
    pub fn new(gateway: Arc<dyn ResourceGateway>, metrics: Arc<Metrics>) -> Self {
        Self { gateway, metrics }
    }

    /// Run one pass for `intent` against provider `provider_name`.
    ///
    /// The caller is responsible for any readiness gate (such as the
    /// referenced inventory being ready) before calling this.
    pub async fn reconcile_provider_resource<A: ProviderAdapter>(
        &self,
        provider_name: &str,
        intent: &mut A::Intent,
        adapter: &A,
    ) -> PassOutcome {
        let ready_type = <A::Intent as IntentResource>::READY_TYPE;
        let mut condition = find_condition(intent.conditions(), ready_type)
            .cloned()
            .unwrap_or_else(|| in_progress_condition(ready_type));

        let mut outcome = PassOutcome::default();
        match self
            .sync(provider_name, intent, adapter, &mut condition)
            .await
        {
            Ok(SyncFlow::Done) => {}
            Ok(SyncFlow::Requeue) => outcome.requeue = true,
            Err(e) => outcome.error = Some(e),
        }

        set_condition(intent.conditions_mut(), condition);
        if let Err(e) = write_status(self.gateway.as_ref(), intent).await {
            if e.is_conflict() {
                debug!(
                    kind = %A::Intent::kind(&()),
                    name = %intent.name_any(),
                    "intent modified, retry syncing status"
                );
                outcome.requeue = true;
            } else {
                error!(
                    kind = %A::Intent::kind(&()),
                    name = %intent.name_any(),
                    error = %e,
                    "failed to update status"
                );
                if outcome.error.is_none() {
                    outcome.error = Some(e);
                }
            }
        }

        outcome
    }

    async fn sync<A: ProviderAdapter>(
        &self,
        provider_name: &str,
        intent: &mut A::Intent,
        adapter: &A,
        condition: &mut Condition,
    ) -> Result<SyncFlow, Error> {
        let ready_type = <A::Intent as IntentResource>::READY_TYPE;

        let Some(provider) = self.gateway.get_provider(provider_name).await? else {
            let err = Error::provider_not_found(provider_name);
            warn!(provider = %provider_name, "requested DBaaS provider is not configured");
            *condition = Condition::new(
                ready_type,
                ConditionStatus::False,
                reason::PROVIDER_NOT_FOUND,
                err.to_string(),
            );
            return Err(err);
        };
        debug!(provider = %provider_name, "found DBaaS provider");

        let kind = adapter.provider_kind(&provider);
        let ar = provider_api_resource(&kind);
        let name = intent.name_any();
        let namespace = intent.namespace().ok_or_else(|| {
            Error::internal_with_context("reconcile_provider_resource", "intent has no namespace")
        })?;
        let spec = adapter.project_spec(intent)?;

        let stored = {
            let owner: &A::Intent = intent;
            let desired = DynamicObject::new(&name, &ar).within(&namespace);
            let execution =
                self.metrics
                    .execution(provider_name, &kind, &name, ACTION_CREATE_OR_UPDATE);
            let result = create_or_update(self.gateway.as_ref(), &ar, desired, move |obj| {
                obj.data["spec"] = spec;
                obj.metadata.owner_references = None;
                set_controller_reference(owner, &mut obj.metadata)
            })
            .await;
            execution.finish(&result);

            match result {
                Ok((op, stored)) => {
                    debug!(kind = %kind, name = %name, operation = ?op, "provider resource reconciled");
                    stored
                }
                Err(e) if e.is_conflict() => {
                    debug!(kind = %kind, name = %name, "provider resource modified, retry syncing spec");
                    return Ok(SyncFlow::Requeue);
                }
                Err(e) => {
                    error!(kind = %kind, name = %name, error = %e, "failed to reconcile provider resource");
                    return Err(e);
                }
            }
        };

        let parsed = match parse_provider_object::<A::ProviderObject>(&ar, &stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(kind = %kind, name = %name, error = %e, "failed to parse provider resource");
                *condition = Condition::new(
                    ready_type,
                    ConditionStatus::False,
                    reason::PROVIDER_PARSING_ERROR,
                    e.to_string(),
                );
                return Err(e);
            }
        };

        *condition = adapter.reduce_status(intent, parsed);
        Ok(SyncFlow::Done)
    }
}

/// Convert a stored provider resource into the adapter's typed view
fn parse_provider_object<T: DeserializeOwned>(
    ar: &ApiResource,
    obj: &DynamicObject,
) -> Result<T, Error> {
    let value = serde_json::to_value(obj)
        .map_err(|e| Error::provider_parsing(&ar.kind, e.to_string()))?;
    serde_json::from_value(value).map_err(|e| Error::provider_parsing(&ar.kind, e.to_string()))
}

/// Write the status subresource of `intent`, guarded by its resourceVersion
pub async fn write_status<I: IntentResource>(
    gateway: &dyn ResourceGateway,
    intent: &I,
) -> Result<(), Error> {
    let ar = ApiResource::erase::<I>(&());
    let namespace = intent.namespace().unwrap_or_default();
    gateway
        .replace_status(
            &ar,
            &namespace,
            &intent.name_any(),
            intent.resource_version(),
            intent.status_value()?,
        )
        .await
}

#[cfg(test)]
mod tests;
