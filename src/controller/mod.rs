//! Controllers for the DBaaS intent CRDs
//!
//! Each controller is a thin shell around the shared machinery: the
//! inventory, instance and connection controllers drive the provider
//! reconciliation engine, the platform controller drives the installers.
//! All of them share one [`Context`].

mod connection;
mod instance;
mod inventory;
mod platform;

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use tracing::{error, warn};

use crate::config::OperatorConfig;
use crate::crd::{
    is_condition_true, message, reason, set_condition, Condition, ConditionStatus,
    DBaaSInventory, IntentResource, NamespacedRef, INVENTORY_READY_TYPE,
};
use crate::engine::{write_status, ProviderReconciler};
use crate::gateway::ResourceGateway;
use crate::install::{platform_installers, PlatformInstaller};
use crate::metrics::Metrics;
use crate::Error;

pub use connection::reconcile as reconcile_connection;
pub use instance::reconcile as reconcile_instance;
pub use inventory::reconcile as reconcile_inventory;
pub use platform::{reconcile as reconcile_platform, PLATFORM_FINALIZER};

/// Controller context shared by every reconcile
pub struct Context {
    /// API-server access
    pub gateway: Arc<dyn ResourceGateway>,
    /// Provider resource reconciliation engine
    pub reconciler: ProviderReconciler,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
    /// Operator configuration
    pub config: OperatorConfig,
    /// One installer per supported provider platform
    pub installers: Vec<Arc<dyn PlatformInstaller>>,
}

impl Context {
    /// Create a context with the default platform installers
    pub fn new(
        gateway: Arc<dyn ResourceGateway>,
        metrics: Arc<Metrics>,
        config: OperatorConfig,
    ) -> Self {
        Self::builder(gateway, metrics, config).build()
    }

    /// Start building a context
    pub fn builder(
        gateway: Arc<dyn ResourceGateway>,
        metrics: Arc<Metrics>,
        config: OperatorConfig,
    ) -> ContextBuilder {
        ContextBuilder {
            gateway,
            metrics,
            config,
            installers: None,
        }
    }

    /// Context over `gateway` with test configuration and no installers
    #[cfg(test)]
    pub(crate) fn for_testing(gateway: Arc<dyn ResourceGateway>) -> Self {
        let metrics = Arc::new(Metrics::new(&opentelemetry::global::meter("controller-test")));
        Self::builder(gateway, metrics, OperatorConfig::for_testing())
            .installers(Vec::new())
            .build()
    }
}

/// Builder for [`Context`]
///
/// ```ignore
/// let ctx = Context::builder(gateway, metrics, config)
///     .installers(vec![installer])
///     .build();
/// ```
pub struct ContextBuilder {
    gateway: Arc<dyn ResourceGateway>,
    metrics: Arc<Metrics>,
    config: OperatorConfig,
    installers: Option<Vec<Arc<dyn PlatformInstaller>>>,
}

impl ContextBuilder {
    /// Override the platform installers
    pub fn installers(mut self, installers: Vec<Arc<dyn PlatformInstaller>>) -> Self {
        self.installers = Some(installers);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        let installers = self
            .installers
            .unwrap_or_else(|| platform_installers(&self.config, self.gateway.clone()));
        Context {
            reconciler: ProviderReconciler::new(self.gateway.clone(), self.metrics.clone()),
            gateway: self.gateway,
            metrics: self.metrics,
            config: self.config,
            installers,
        }
    }
}

/// Error policy shared by every controller
///
/// Errors that need a spec or configuration change wait for the next watch
/// event; everything else is retried after the configured delay.
pub fn error_policy<K>(obj: Arc<K>, error: &Error, ctx: Arc<Context>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    if error.is_retryable() {
        warn!(
            kind = %K::kind(&()),
            name = %obj.name_any(),
            error = %error,
            "reconciliation failed, requeueing"
        );
        Action::requeue(ctx.config.requeue.error)
    } else {
        error!(
            kind = %K::kind(&()),
            name = %obj.name_any(),
            error = %error,
            "reconciliation failed"
        );
        Action::await_change()
    }
}

/// Resolve the inventory `intent` depends on and require it to be ready.
///
/// When the inventory is missing or not ready, the managed condition of
/// `intent` says so, the status is written and an error is returned.
pub(crate) async fn ready_inventory<I: IntentResource>(
    gateway: &dyn ResourceGateway,
    intent: &mut I,
    inventory_ref: &NamespacedRef,
) -> Result<DBaaSInventory, Error> {
    let own_namespace = intent.namespace().unwrap_or_default();
    let namespace = inventory_ref.namespace_or(&own_namespace).to_string();

    let (reason, message, err) = match gateway.get_inventory(&namespace, &inventory_ref.name).await? {
        Some(inventory) if is_condition_true(inventory.conditions(), INVENTORY_READY_TYPE) => {
            return Ok(inventory)
        }
        Some(_) => (
            reason::INVENTORY_NOT_READY,
            message::INVENTORY_NOT_READY.to_string(),
            Error::not_ready(format!(
                "inventory {}/{} is not ready",
                namespace, inventory_ref.name
            )),
        ),
        None => {
            let msg = format!("inventory {}/{} not found", namespace, inventory_ref.name);
            (reason::INVENTORY_NOT_FOUND, msg.clone(), Error::not_ready(msg))
        }
    };

    warn!(
        kind = %I::kind(&()),
        name = %intent.name_any(),
        inventory = %inventory_ref.name,
        reason = %reason,
        "inventory gate not passed"
    );
    set_condition(
        intent.conditions_mut(),
        Condition::new(I::READY_TYPE, ConditionStatus::False, reason, message),
    );
    if let Err(e) = write_status(gateway, intent).await {
        if !e.is_conflict() {
            error!(name = %intent.name_any(), error = %e, "failed to update status");
        }
    }
    Err(err)
}
