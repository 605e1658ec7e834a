//! Operator Lifecycle Manager (OLM) types
//!
//! Typed structs for the OLM resources the installer registers. These
//! implement `HasApiResource` so installs and cleanups address the same API.

use std::collections::BTreeMap;

use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};

use crate::kube_utils::HasApiResource;
use crate::Error;

/// Label applied to every OLM resource the operator registers
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
/// Value of [`LABEL_MANAGED_BY`]
pub const LABEL_MANAGED_BY_DBAAS: &str = "dbaas-operator";

/// Metadata for a namespaced OLM resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OlmMetadata {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl OlmMetadata {
    /// Create metadata carrying the managed-by label
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_DBAAS.to_string(),
        );
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels,
        }
    }
}

/// Convert a typed OLM resource into a `DynamicObject` for the gateway
pub fn to_dynamic<T: Serialize>(resource: &T) -> Result<DynamicObject, Error> {
    let value = serde_json::to_value(resource)
        .map_err(|e| Error::serialization(format!("failed to encode OLM resource: {}", e)))?;
    serde_json::from_value(value)
        .map_err(|e| Error::serialization(format!("failed to build dynamic object: {}", e)))
}

// =============================================================================
// CatalogSource
// =============================================================================

/// OLM CatalogSource resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSource {
    /// API version
    #[serde(default = "CatalogSource::default_api_version")]
    pub api_version: String,
    /// Resource kind
    #[serde(default = "CatalogSource::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: OlmMetadata,
    /// Catalog specification
    pub spec: CatalogSourceSpec,
}

impl HasApiResource for CatalogSource {
    const API_VERSION: &'static str = "operators.coreos.com/v1alpha1";
    const KIND: &'static str = "CatalogSource";
}

impl CatalogSource {
    fn default_api_version() -> String {
        <Self as HasApiResource>::API_VERSION.to_string()
    }
    fn default_kind() -> String {
        <Self as HasApiResource>::KIND.to_string()
    }

    /// Create a new CatalogSource
    pub fn new(metadata: OlmMetadata, spec: CatalogSourceSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// CatalogSource spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSourceSpec {
    /// Source type; bundles are served over gRPC
    pub source_type: String,
    /// Catalog index image
    pub image: String,
    /// Name shown in the operator hub
    pub display_name: String,
}

// =============================================================================
// Subscription
// =============================================================================

/// OLM Subscription resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// API version
    #[serde(default = "Subscription::default_api_version")]
    pub api_version: String,
    /// Resource kind
    #[serde(default = "Subscription::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: OlmMetadata,
    /// Subscription specification
    pub spec: SubscriptionSpec,
}

impl HasApiResource for Subscription {
    const API_VERSION: &'static str = "operators.coreos.com/v1alpha1";
    const KIND: &'static str = "Subscription";
}

impl Subscription {
    fn default_api_version() -> String {
        <Self as HasApiResource>::API_VERSION.to_string()
    }
    fn default_kind() -> String {
        <Self as HasApiResource>::KIND.to_string()
    }

    /// Create a new Subscription
    pub fn new(metadata: OlmMetadata, spec: SubscriptionSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// Subscription spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// CatalogSource name
    pub source: String,
    /// Namespace of the CatalogSource
    pub source_namespace: String,
    /// Package to install
    pub name: String,
    /// Update channel
    pub channel: String,
    /// Install plan approval policy
    pub install_plan_approval: String,
}

// =============================================================================
// OperatorGroup
// =============================================================================

/// OLM OperatorGroup resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorGroup {
    /// API version
    #[serde(default = "OperatorGroup::default_api_version")]
    pub api_version: String,
    /// Resource kind
    #[serde(default = "OperatorGroup::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: OlmMetadata,
    /// Group specification; empty targets every namespace
    #[serde(default)]
    pub spec: OperatorGroupSpec,
}

impl HasApiResource for OperatorGroup {
    const API_VERSION: &'static str = "operators.coreos.com/v1";
    const KIND: &'static str = "OperatorGroup";
}

impl OperatorGroup {
    fn default_api_version() -> String {
        <Self as HasApiResource>::API_VERSION.to_string()
    }
    fn default_kind() -> String {
        <Self as HasApiResource>::KIND.to_string()
    }

    /// Create a new OperatorGroup
    pub fn new(metadata: OlmMetadata, spec: OperatorGroupSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// OperatorGroup spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorGroupSpec {
    /// Namespaces the group's operators watch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_namespaces: Vec<String>,
}
