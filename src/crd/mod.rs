//! Custom Resource Definitions for the DBaaS operator
//!
//! This module contains the intent CRDs users author and the condition type
//! the operator writes back into their status.

mod conditions;
mod connection;
mod instance;
mod inventory;
mod platform;
mod provider;
mod types;

use std::fmt::Debug;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::NamespaceResourceScope;
use kube::CustomResourceExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Error;

pub use conditions::{find_condition, is_condition_true, set_condition};
pub use connection::{DBaaSConnection, DBaaSConnectionSpec, DBaaSConnectionStatus};
pub use instance::{DBaaSInstance, DBaaSInstanceSpec, DBaaSInstanceStatus};
pub use inventory::{
    DBaaSInventory, DBaaSInventorySpec, DBaaSInventoryStatus, DiscoveredInstance,
    InventoryDetails,
};
pub use platform::{
    DBaaSPlatform, DBaaSPlatformSpec, DBaaSPlatformStatus, InstallStatus, PlatformStatus,
    DEFAULT_SYNC_PERIOD_SECS,
};
pub use provider::{DBaaSProvider, DBaaSProviderSpec, DatabaseProvider};
pub use types::{
    message, reason, Condition, ConditionStatus, NamedRef, NamespacedRef,
    CONNECTION_READY_TYPE, INSTANCE_READY_TYPE, INVENTORY_READY_TYPE, PLATFORM_READY_TYPE,
    PROVIDER_PROVISION_READY_TYPE, PROVIDER_READY_FOR_BINDING_TYPE, PROVIDER_SPEC_SYNCED_TYPE,
};

/// A namespaced resource whose status carries operator-managed conditions.
///
/// The reconciliation engine and the controllers only see intent resources
/// through this trait, so one code path serves every kind.
pub trait IntentResource:
    kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Condition type the operator owns on this kind
    const READY_TYPE: &'static str;

    /// Current conditions, empty when no status has been written
    fn conditions(&self) -> &[Condition];

    /// Mutable conditions, creating an empty status if needed
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    /// Status encoded for a status-subresource write
    fn status_value(&self) -> Result<serde_json::Value, Error>;
}

macro_rules! impl_intent_resource {
    ($kind:ty, $ready:expr) => {
        impl IntentResource for $kind {
            const READY_TYPE: &'static str = $ready;

            fn conditions(&self) -> &[Condition] {
                self.status
                    .as_ref()
                    .map(|s| s.conditions.as_slice())
                    .unwrap_or(&[])
            }

            fn conditions_mut(&mut self) -> &mut Vec<Condition> {
                &mut self.status.get_or_insert_with(Default::default).conditions
            }

            fn status_value(&self) -> Result<serde_json::Value, Error> {
                serde_json::to_value(self.status.clone().unwrap_or_default()).map_err(|e| {
                    Error::serialization(format!(
                        "failed to encode {} status: {}",
                        stringify!($kind),
                        e
                    ))
                })
            }
        }
    };
}

impl_intent_resource!(DBaaSInventory, INVENTORY_READY_TYPE);
impl_intent_resource!(DBaaSInstance, INSTANCE_READY_TYPE);
impl_intent_resource!(DBaaSConnection, CONNECTION_READY_TYPE);
impl_intent_resource!(DBaaSPlatform, PLATFORM_READY_TYPE);

/// Every CRD the operator serves, in installation order
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        DBaaSProvider::crd(),
        DBaaSInventory::crd(),
        DBaaSInstance::crd(),
        DBaaSConnection::crd(),
        DBaaSPlatform::crd(),
    ]
}
