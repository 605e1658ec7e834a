//! Shared Kubernetes utilities using kube-rs
//!
//! Provider resources are only known by kind at runtime, so most of the
//! helpers here turn an apiVersion/kind pair into an `ApiResource` that the
//! dynamic API can use.

use kube::discovery::ApiResource;

use crate::{API_GROUP, API_VERSION};

// =============================================================================
// HasApiResource Trait
// =============================================================================

/// Trait for types that have a known API group, version, and kind.
///
/// Implement this for external CRD types (OLM resources) to derive their
/// `ApiResource` from constants, keeping serialization and API calls in sync.
///
/// # Example
/// ```ignore
/// impl HasApiResource for Subscription {
///     const API_VERSION: &'static str = "operators.coreos.com/v1alpha1";
///     const KIND: &'static str = "Subscription";
/// }
///
/// let ar = Subscription::api_resource();
/// ```
pub trait HasApiResource {
    /// Full API version (e.g., "operators.coreos.com/v1alpha1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "Subscription")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// Split an apiVersion into (group, version). Core types have an empty group.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from an apiVersion string and kind.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// ApiResource for a provider-declared kind.
///
/// Provider resources live in the same group and version as the intent
/// resources that own them.
pub fn provider_api_resource(kind: &str) -> ApiResource {
    build_api_resource(&format!("{}/{}", API_GROUP, API_VERSION), kind)
}

/// Kinds whose plural does not follow the simple rules below.
const KIND_PLURALS: &[(&str, &str)] = &[
    ("catalogsource", "catalogsources"),
    ("operatorgroup", "operatorgroups"),
    ("subscription", "subscriptions"),
];

/// Derive the REST plural for a kind, matching what CRD generators emit.
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    for (singular, plural) in KIND_PLURALS {
        if *singular == lower {
            return (*plural).to_string();
        }
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}
