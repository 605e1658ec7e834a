//! Supporting types shared by the DBaaS CRDs

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Condition types and reasons
// =============================================================================

/// Managed condition type on DBaaSInventory
pub const INVENTORY_READY_TYPE: &str = "InventoryReady";
/// Managed condition type on DBaaSInstance
pub const INSTANCE_READY_TYPE: &str = "InstanceReady";
/// Managed condition type on DBaaSConnection
pub const CONNECTION_READY_TYPE: &str = "ConnectionReady";
/// Managed condition type on DBaaSPlatform
pub const PLATFORM_READY_TYPE: &str = "PlatformReady";

/// Provider-side condition signalling the inventory spec was synced
pub const PROVIDER_SPEC_SYNCED_TYPE: &str = "SpecSynced";
/// Provider-side condition signalling the instance is provisioned
pub const PROVIDER_PROVISION_READY_TYPE: &str = "ProvisionReady";
/// Provider-side condition signalling the connection can be bound
pub const PROVIDER_READY_FOR_BINDING_TYPE: &str = "ReadyForBinding";

/// Condition reasons written by the operator
pub mod reason {
    /// Provider resource is synced and ready
    pub const READY: &str = "Ready";
    /// Provider resource exists but has not reported sync yet
    pub const RECONCILE_IN_PROGRESS: &str = "ReconcileInProgress";
    /// The referenced DBaaSProvider does not exist
    pub const PROVIDER_NOT_FOUND: &str = "ProviderNotFound";
    /// The provider resource could not be parsed
    pub const PROVIDER_PARSING_ERROR: &str = "ProviderParsingError";
    /// The referenced DBaaSInventory does not exist
    pub const INVENTORY_NOT_FOUND: &str = "InventoryNotFound";
    /// The referenced DBaaSInventory is not ready
    pub const INVENTORY_NOT_READY: &str = "InventoryNotReady";
    /// A provider operator installation is still converging
    pub const INSTALLATION_IN_PROGRESS: &str = "InstallationInProgress";
    /// A provider operator installation hit a hard failure
    pub const INSTALLATION_FAILED: &str = "InstallationFailed";
    /// Provider operators are being removed
    pub const INSTALLATION_CLEANUP: &str = "InstallationCleanup";
}

/// Human-readable condition messages
pub mod message {
    /// Provider resource reconcile has not completed
    pub const PROVIDER_RECONCILE_IN_PROGRESS: &str = "Provider resource reconcile in progress";
    /// Provider resource status synced into the intent resource
    pub const PROVIDER_STATUS_SYNC_DONE: &str = "Provider resource status sync completed";
    /// Inventory gate failed
    pub const INVENTORY_NOT_READY: &str = "Inventory discovery not done";
    /// All platform installations converged
    pub const PLATFORMS_READY: &str = "All provider operators are installed and ready";
}

// =============================================================================
// Condition
// =============================================================================

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., InstanceReady)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the condition's status changed
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// True if the condition status is `True`
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

// =============================================================================
// References
// =============================================================================

/// Reference to a cluster-scoped object by name
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NamedRef {
    /// Object name
    pub name: String,
}

/// Reference to a namespaced object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NamespacedRef {
    /// Object name
    pub name: String,
    /// Object namespace; defaults to the referencing object's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl NamespacedRef {
    /// Resolve the namespace, falling back to `default_ns`
    pub fn namespace_or<'a>(&'a self, default_ns: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default_ns)
    }
}

impl std::fmt::Display for NamespacedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
