//! Adapters for the inventory, instance and connection kinds

use serde::Deserialize;

use super::{in_progress_condition, ProviderAdapter};
use crate::crd::{
    find_condition, message, reason, set_condition, Condition, ConditionStatus, DBaaSConnection,
    DBaaSConnectionStatus, DBaaSInstance, DBaaSInstanceStatus, DBaaSInventory,
    DBaaSInventoryStatus, DBaaSProvider, IntentResource, PROVIDER_PROVISION_READY_TYPE,
    PROVIDER_READY_FOR_BINDING_TYPE, PROVIDER_SPEC_SYNCED_TYPE,
};
use crate::Error;

/// Typed view of a provider resource; only the status is read back
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderResource<S> {
    /// Status written by the provider operator
    pub status: Option<S>,
}

fn encode_spec<T: serde::Serialize>(kind: &str, spec: &T) -> Result<serde_json::Value, Error> {
    serde_json::to_value(spec)
        .map_err(|e| Error::serialization(format!("failed to project {} spec: {}", kind, e)))
}

/// Merge provider conditions into the intent, leaving the managed type alone
fn merge_provider_conditions(target: &mut Vec<Condition>, provider: &[Condition], managed: &str) {
    for c in provider.iter().filter(|c| c.type_ != managed) {
        set_condition(target, c.clone());
    }
}

/// Ready when the provider reports `sync_type=True`, in progress otherwise
fn ready_condition(managed: &str, provider: &[Condition], sync_type: &str) -> Condition {
    match find_condition(provider, sync_type) {
        Some(c) if c.is_true() => Condition::new(
            managed,
            ConditionStatus::True,
            reason::READY,
            message::PROVIDER_STATUS_SYNC_DONE,
        ),
        _ => in_progress_condition(managed),
    }
}

/// DBaaSInventory adapter
///
/// Ready once the provider inventory reports `SpecSynced`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InventoryAdapter;

impl ProviderAdapter for InventoryAdapter {
    type Intent = DBaaSInventory;
    type ProviderObject = ProviderResource<DBaaSInventoryStatus>;

    fn provider_kind(&self, provider: &DBaaSProvider) -> String {
        provider.spec.inventory_kind.clone()
    }

    fn project_spec(&self, intent: &DBaaSInventory) -> Result<serde_json::Value, Error> {
        encode_spec("inventory", &intent.spec.inventory)
    }

    fn reduce_status(
        &self,
        intent: &mut DBaaSInventory,
        provider: Self::ProviderObject,
    ) -> Condition {
        let Some(status) = provider.status else {
            return in_progress_condition(DBaaSInventory::READY_TYPE);
        };
        let own = intent.status.get_or_insert_with(Default::default);
        own.instances = status.instances;
        merge_provider_conditions(
            &mut own.conditions,
            &status.conditions,
            DBaaSInventory::READY_TYPE,
        );
        ready_condition(
            DBaaSInventory::READY_TYPE,
            &status.conditions,
            PROVIDER_SPEC_SYNCED_TYPE,
        )
    }
}

/// DBaaSInstance adapter
///
/// Ready once the provider instance reports `ProvisionReady`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstanceAdapter;

impl ProviderAdapter for InstanceAdapter {
    type Intent = DBaaSInstance;
    type ProviderObject = ProviderResource<DBaaSInstanceStatus>;

    fn provider_kind(&self, provider: &DBaaSProvider) -> String {
        provider.spec.instance_kind.clone()
    }

    fn project_spec(&self, intent: &DBaaSInstance) -> Result<serde_json::Value, Error> {
        encode_spec("instance", &intent.spec)
    }

    fn reduce_status(
        &self,
        intent: &mut DBaaSInstance,
        provider: Self::ProviderObject,
    ) -> Condition {
        let Some(status) = provider.status else {
            return in_progress_condition(DBaaSInstance::READY_TYPE);
        };
        let own = intent.status.get_or_insert_with(Default::default);
        own.instance_id = status.instance_id;
        own.instance_info = status.instance_info;
        own.phase = status.phase;
        merge_provider_conditions(
            &mut own.conditions,
            &status.conditions,
            DBaaSInstance::READY_TYPE,
        );
        ready_condition(
            DBaaSInstance::READY_TYPE,
            &status.conditions,
            PROVIDER_PROVISION_READY_TYPE,
        )
    }
}

/// DBaaSConnection adapter
///
/// Ready once the provider connection reports `ReadyForBinding`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectionAdapter;

impl ProviderAdapter for ConnectionAdapter {
    type Intent = DBaaSConnection;
    type ProviderObject = ProviderResource<DBaaSConnectionStatus>;

    fn provider_kind(&self, provider: &DBaaSProvider) -> String {
        provider.spec.connection_kind.clone()
    }

    fn project_spec(&self, intent: &DBaaSConnection) -> Result<serde_json::Value, Error> {
        encode_spec("connection", &intent.spec)
    }

    fn reduce_status(
        &self,
        intent: &mut DBaaSConnection,
        provider: Self::ProviderObject,
    ) -> Condition {
        let Some(status) = provider.status else {
            return in_progress_condition(DBaaSConnection::READY_TYPE);
        };
        let own = intent.status.get_or_insert_with(Default::default);
        own.credentials_ref = status.credentials_ref;
        own.connection_info_ref = status.connection_info_ref;
        merge_provider_conditions(
            &mut own.conditions,
            &status.conditions,
            DBaaSConnection::READY_TYPE,
        );
        ready_condition(
            DBaaSConnection::READY_TYPE,
            &status.conditions,
            PROVIDER_READY_FOR_BINDING_TYPE,
        )
    }
}
