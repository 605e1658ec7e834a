//! DBaaSInventory Custom Resource Definition
//!
//! An inventory points at a provider account (via credentials) and lists the
//! database instances the provider discovered for it.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, NamedRef};

/// Specification for a DBaaSInventory
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.redhat.com",
    version = "v1alpha1",
    kind = "DBaaSInventory",
    plural = "dbaasinventories",
    namespaced,
    status = "DBaaSInventoryStatus",
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.providerRef.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSInventorySpec {
    /// The DBaaSProvider that serves this inventory
    pub provider_ref: NamedRef,

    /// Provider-facing part of the spec, copied to the provider resource
    #[serde(flatten)]
    pub inventory: InventoryDetails,
}

/// The part of an inventory spec that the provider consumes
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDetails {
    /// Secret holding the provider account credentials
    pub credentials_ref: NamedRef,
}

/// Status for a DBaaSInventory
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSInventoryStatus {
    /// Conditions; `InventoryReady` is owned by the operator
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Instances discovered by the provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<DiscoveredInstance>,
}

/// A database instance discovered by the provider
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredInstance {
    /// Provider-assigned instance identifier
    #[serde(rename = "instanceID")]
    pub instance_id: String,

    /// Instance name
    #[serde(default)]
    pub name: String,

    /// Free-form provider details
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instance_info: BTreeMap<String, String>,
}
