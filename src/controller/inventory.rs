//! DBaaSInventory controller

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{info, instrument};

use super::Context;
use crate::crd::{find_condition, DBaaSInventory, IntentResource};
use crate::engine::InventoryAdapter;
use crate::Error;

/// Reconcile a DBaaSInventory against its provider inventory
#[instrument(skip(inventory, ctx), fields(inventory = %inventory.name_any()))]
pub async fn reconcile(inventory: Arc<DBaaSInventory>, ctx: Arc<Context>) -> Result<Action, Error> {
    info!("reconciling inventory");
    let mut inventory = (*inventory).clone();
    let provider = inventory.spec.provider_ref.name.clone();

    let outcome = ctx
        .reconciler
        .reconcile_provider_resource(&provider, &mut inventory, &InventoryAdapter)
        .await;

    ctx.metrics.inventory.record(
        &provider,
        &inventory.name_any(),
        &inventory.namespace().unwrap_or_default(),
        inventory.creation_timestamp().map(|t| t.0),
        find_condition(inventory.conditions(), DBaaSInventory::READY_TYPE),
    );

    outcome.into_action(ctx.config.requeue.conflict)
}
