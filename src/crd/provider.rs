//! DBaaSProvider Custom Resource Definition
//!
//! A DBaaSProvider registers a backend with the operator and tells the
//! engine which provider-specific kinds back each intent resource.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a DBaaSProvider
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.redhat.com",
    version = "v1alpha1",
    kind = "DBaaSProvider",
    plural = "dbaasproviders",
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSProviderSpec {
    /// Provider identity
    pub provider: DatabaseProvider,

    /// Kind of the provider resource that backs a DBaaSInventory
    pub inventory_kind: String,

    /// Kind of the provider resource that backs a DBaaSConnection
    pub connection_kind: String,

    /// Kind of the provider resource that backs a DBaaSInstance
    pub instance_kind: String,
}

/// Provider identity
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseProvider {
    /// Provider name (e.g., "Crunchy Bridge")
    pub name: String,

    /// Name shown in user interfaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}
