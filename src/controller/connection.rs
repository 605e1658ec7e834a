//! DBaaSConnection controller

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{info, instrument};

use super::{ready_inventory, Context};
use crate::crd::{find_condition, DBaaSConnection, IntentResource};
use crate::engine::ConnectionAdapter;
use crate::Error;

/// Reconcile a DBaaSConnection once its inventory is ready
#[instrument(skip(connection, ctx), fields(connection = %connection.name_any()))]
pub async fn reconcile(
    connection: Arc<DBaaSConnection>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    info!("reconciling connection");
    let mut connection = (*connection).clone();
    let inventory_ref = connection.spec.inventory_ref.clone();

    let inventory = ready_inventory(ctx.gateway.as_ref(), &mut connection, &inventory_ref).await?;
    let provider = inventory.spec.provider_ref.name;

    let outcome = ctx
        .reconciler
        .reconcile_provider_resource(&provider, &mut connection, &ConnectionAdapter)
        .await;

    ctx.metrics.connection.record(
        &provider,
        &connection.name_any(),
        &connection.namespace().unwrap_or_default(),
        connection.creation_timestamp().map(|t| t.0),
        find_condition(connection.conditions(), DBaaSConnection::READY_TYPE),
    );

    outcome.into_action(ctx.config.requeue.conflict)
}
