//! Controller runner - builds one controller future per intent kind

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use dbaas_operator::controller::{
    error_policy, reconcile_connection, reconcile_instance, reconcile_inventory,
    reconcile_platform, Context,
};
use dbaas_operator::crd::{
    DBaaSConnection, DBaaSInstance, DBaaSInventory, DBaaSPlatform, DBaaSProvider,
};
use dbaas_operator::engine::{ConnectionAdapter, InstanceAdapter, InventoryAdapter, ProviderAdapter};
use dbaas_operator::kube_utils::provider_api_resource;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

fn watcher_config() -> WatcherConfig {
    WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS)
}

/// Provider kinds each intent controller owns, per registered DBaaSProvider
///
/// TODO: rebuild the owned watches when a DBaaSProvider is registered after startup
pub struct ProviderKinds {
    inventory: Vec<ApiResource>,
    instance: Vec<ApiResource>,
    connection: Vec<ApiResource>,
}

impl ProviderKinds {
    /// Collect the provider kinds of every DBaaSProvider in the cluster
    pub async fn discover(client: &Client) -> kube::Result<Self> {
        let providers: Api<DBaaSProvider> = Api::all(client.clone());
        let providers = providers.list(&Default::default()).await?.items;
        tracing::info!(count = providers.len(), "discovered DBaaS providers");

        Ok(Self {
            inventory: kinds_of(&providers, |p| InventoryAdapter.provider_kind(p)),
            instance: kinds_of(&providers, |p| InstanceAdapter.provider_kind(p)),
            connection: kinds_of(&providers, |p| ConnectionAdapter.provider_kind(p)),
        })
    }
}

fn kinds_of(
    providers: &[DBaaSProvider],
    kind: impl Fn(&DBaaSProvider) -> String,
) -> Vec<ApiResource> {
    let mut kinds: Vec<String> = providers
        .iter()
        .map(kind)
        .filter(|k| !k.is_empty())
        .collect();
    kinds.sort();
    kinds.dedup();
    kinds.iter().map(|k| provider_api_resource(k)).collect()
}

fn with_owned<K>(
    mut controller: Controller<K>,
    client: &Client,
    kinds: &[ApiResource],
) -> Controller<K>
where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + serde::de::DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
{
    for ar in kinds {
        tracing::debug!(kind = %ar.kind, "watching owned provider kind");
        let api: Api<DynamicObject> = Api::all_with(client.clone(), ar);
        controller = controller.owns_with(api, ar.clone(), watcher_config());
    }
    controller
}

/// Build the intent and platform controller futures
pub fn build_controllers(
    client: Client,
    ctx: Arc<Context>,
    kinds: &ProviderKinds,
) -> Vec<ControllerFuture> {
    let inventories: Api<DBaaSInventory> = Api::all(client.clone());
    let instances: Api<DBaaSInstance> = Api::all(client.clone());
    let connections: Api<DBaaSConnection> = Api::all(client.clone());
    let platforms: Api<DBaaSPlatform> = Api::all(client.clone());

    let inventory_ctrl = with_owned(
        Controller::new(inventories, watcher_config()),
        &client,
        &kinds.inventory,
    )
    .shutdown_on_signal()
    .run(reconcile_inventory, error_policy, ctx.clone())
    .for_each(log_reconcile_result("DBaaSInventory"));

    let instance_ctrl = with_owned(
        Controller::new(instances, watcher_config()),
        &client,
        &kinds.instance,
    )
    .shutdown_on_signal()
    .run(reconcile_instance, error_policy, ctx.clone())
    .for_each(log_reconcile_result("DBaaSInstance"));

    let connection_ctrl = with_owned(
        Controller::new(connections, watcher_config()),
        &client,
        &kinds.connection,
    )
    .shutdown_on_signal()
    .run(reconcile_connection, error_policy, ctx.clone())
    .for_each(log_reconcile_result("DBaaSConnection"));

    let platform_ctrl = Controller::new(platforms, watcher_config())
        .shutdown_on_signal()
        .run(reconcile_platform, error_policy, ctx)
        .for_each(log_reconcile_result("DBaaSPlatform"));

    tracing::info!("- DBaaSInventory controller");
    tracing::info!("- DBaaSInstance controller");
    tracing::info!("- DBaaSConnection controller");
    tracing::info!("- DBaaSPlatform controller");

    vec![
        Box::pin(inventory_ctrl),
        Box::pin(instance_ctrl),
        Box::pin(connection_ctrl),
        Box::pin(platform_ctrl),
    ]
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
