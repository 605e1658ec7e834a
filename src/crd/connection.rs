//! DBaaSConnection Custom Resource Definition
//!
//! A DBaaSConnection requests binding credentials for one instance of an
//! inventory.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, NamedRef, NamespacedRef};

/// Specification for a DBaaSConnection
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.redhat.com",
    version = "v1alpha1",
    kind = "DBaaSConnection",
    plural = "dbaasconnections",
    namespaced,
    status = "DBaaSConnectionStatus",
    printcolumn = r#"{"name":"Inventory","type":"string","jsonPath":".spec.inventoryRef.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSConnectionSpec {
    /// Inventory that holds the instance
    pub inventory_ref: NamespacedRef,

    /// Provider-assigned identifier of the instance to connect to
    #[serde(rename = "instanceID")]
    pub instance_id: String,
}

/// Status for a DBaaSConnection
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSConnectionStatus {
    /// Conditions; `ConnectionReady` is owned by the operator
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Secret holding the connection credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_ref: Option<NamedRef>,

    /// ConfigMap holding non-secret connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_info_ref: Option<NamedRef>,
}
