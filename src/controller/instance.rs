//! DBaaSInstance controller

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, instrument};

use super::{ready_inventory, Context};
use crate::crd::DBaaSInstance;
use crate::engine::InstanceAdapter;
use crate::Error;

/// Reconcile a DBaaSInstance once its inventory is ready
#[instrument(skip(instance, ctx), fields(instance = %instance.name_any()))]
pub async fn reconcile(instance: Arc<DBaaSInstance>, ctx: Arc<Context>) -> Result<Action, Error> {
    info!("reconciling instance");
    let mut instance = (*instance).clone();
    let inventory_ref = instance.spec.inventory_ref.clone();

    let inventory = ready_inventory(ctx.gateway.as_ref(), &mut instance, &inventory_ref).await?;
    let provider = inventory.spec.provider_ref.name;
    debug!(provider = %provider, "inventory ready");

    ctx.reconciler
        .reconcile_provider_resource(&provider, &mut instance, &InstanceAdapter)
        .await
        .into_action(ctx.config.requeue.conflict)
}
