//! DBaaSPlatform Custom Resource Definition
//!
//! A DBaaSPlatform triggers installation of every provider operator the
//! operator knows about and reports per-platform installation progress.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// Default interval between convergence checks once every platform is installed
pub const DEFAULT_SYNC_PERIOD_SECS: u64 = 300;

/// Specification for a DBaaSPlatform
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "dbaas.redhat.com",
    version = "v1alpha1",
    kind = "DBaaSPlatform",
    plural = "dbaasplatforms",
    namespaced,
    status = "DBaaSPlatformStatus",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSPlatformSpec {
    /// Seconds between re-checks after every platform reports success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_period: Option<u64>,
}

impl DBaaSPlatformSpec {
    /// Effective sync period in seconds
    pub fn sync_period_secs(&self) -> u64 {
        self.sync_period
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_SYNC_PERIOD_SECS)
    }
}

/// Installation status of a single platform
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum InstallStatus {
    /// Every step converged
    Success,
    /// A step is still converging; run again later
    #[default]
    InProgress,
    /// A step hit a hard failure
    Failed,
}

impl InstallStatus {
    /// Every status, in declaration order
    pub const ALL: [InstallStatus; 3] = [Self::Success, Self::InProgress, Self::Failed];

    /// Label value used in metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InProgress => "InProgress",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status for a DBaaSPlatform
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DBaaSPlatformStatus {
    /// Conditions; `PlatformReady` is owned by the operator
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Per-platform installation progress
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms_status: Vec<PlatformStatus>,
}

impl DBaaSPlatformStatus {
    /// Record the latest result for a platform, replacing any previous entry
    pub fn set_platform_status(&mut self, entry: PlatformStatus) {
        match self
            .platforms_status
            .iter_mut()
            .find(|p| p.platform_name == entry.platform_name)
        {
            Some(existing) => *existing = entry,
            None => self.platforms_status.push(entry),
        }
    }
}

/// Installation progress of one platform
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    /// Platform name (e.g., crunchy-bridge)
    pub platform_name: String,

    /// Latest installation result
    pub platform_status: InstallStatus,

    /// Error message of the latest failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}
