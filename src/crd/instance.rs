//! DBaaSInstance Custom Resource Definition
//!
//! A DBaaSInstance asks a provider to provision a new database instance
//! under an existing inventory.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, NamespacedRef};

/// Specification for a DBaaSInstance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.redhat.com",
    version = "v1alpha1",
    kind = "DBaaSInstance",
    plural = "dbaasinstances",
    namespaced,
    status = "DBaaSInstanceStatus",
    printcolumn = r#"{"name":"Inventory","type":"string","jsonPath":".spec.inventoryRef.name"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSInstanceSpec {
    /// Inventory the instance is provisioned under
    pub inventory_ref: NamespacedRef,

    /// Name of the instance at the provider
    pub name: String,

    /// Cloud provider hosting the instance (e.g., AWS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,

    /// Cloud region hosting the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_region: Option<String>,

    /// Provider-specific provisioning parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other_instance_params: BTreeMap<String, String>,
}

/// Status for a DBaaSInstance
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSInstanceStatus {
    /// Conditions; `InstanceReady` is owned by the operator
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Provider-assigned instance identifier
    #[serde(default, rename = "instanceID", skip_serializing_if = "String::is_empty")]
    pub instance_id: String,

    /// Free-form provider details
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instance_info: BTreeMap<String, String>,

    /// Provisioning phase reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}
