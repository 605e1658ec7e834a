//! DBaaS operator - one intent API in front of many database providers
//!
//! Users author provider-neutral intent resources (inventories, instances,
//! connections). The operator mirrors each of them into the resource kind the
//! selected provider operator understands and reports the provider's progress
//! back as conditions. It also installs the provider operators themselves
//! through OLM.
//!
//! # Modules
//!
//! - [`crd`] - Intent CRDs and the condition merger
//! - [`engine`] - Provider resource reconciliation shared by every intent kind
//! - [`ownership`] - Owner references and the ownership check
//! - [`install`] - Provider operator installation state machine
//! - [`controller`] - Per-kind controllers and their shared context
//! - [`gateway`] - API-server access behind a mockable trait
//! - [`olm`] - Typed OLM resources
//! - [`metrics`] - Provider call and readiness metrics
//! - [`config`] - Environment configuration
//! - [`telemetry`] - Logging and OTLP export
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod install;
pub mod kube_utils;
pub mod metrics;
pub mod olm;
pub mod ownership;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group of the intent CRDs and of every provider kind
pub const API_GROUP: &str = "dbaas.redhat.com";

/// API version of the intent CRDs and of every provider kind
pub const API_VERSION: &str = "v1alpha1";

/// Field manager used for every write the operator makes
pub const FIELD_MANAGER: &str = "dbaas-operator";
