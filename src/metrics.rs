//! Metrics registry for DBaaS operator observability
//!
//! Provides OpenTelemetry metrics for:
//! - Provider calls (duration and outcome per provider resource)
//! - Platform installation status
//! - Inventory and connection readiness, reasons and time-to-ready
//!
//! A single [`Metrics`] is built at startup from a `Meter` and shared by
//! every controller.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use chrono::{DateTime, Utc};
use opentelemetry::metrics::{Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use parking_lot::Mutex;

use crate::crd::{Condition, InstallStatus};

/// Outcome label for successful provider calls
pub const OUTCOME_SUCCESS: &str = "success";
/// Outcome label for failed provider calls
pub const OUTCOME_FAILURE: &str = "failure";

/// Action label for the create-or-update of a provider resource
pub const ACTION_CREATE_OR_UPDATE: &str = "create_or_update";

/// Every metric the operator emits
pub struct Metrics {
    request_duration: Histogram<f64>,
    platform_status: Gauge<i64>,
    /// Inventory readiness gauges
    pub inventory: ResourceStatusGauges,
    /// Connection readiness gauges
    pub connection: ResourceStatusGauges,
}

impl Metrics {
    /// Register all instruments on `meter`
    pub fn new(meter: &Meter) -> Self {
        Self {
            request_duration: meter
                .f64_histogram("dbaas_request_duration_seconds")
                .with_description("Duration of upstream calls to provider operator/service endpoints")
                .with_unit("s")
                .build(),
            platform_status: meter
                .i64_gauge("dbaas_platform_status")
                .with_description("Status of an installation of provider operators")
                .build(),
            inventory: ResourceStatusGauges::new(meter, "inventory", "sync ready"),
            connection: ResourceStatusGauges::new(meter, "connection", "ready for binding"),
        }
    }

    /// Start timing a provider call
    pub fn execution(
        &self,
        provider_name: &str,
        instance_type: &str,
        instance_name: &str,
        action: &str,
    ) -> Execution<'_> {
        Execution {
            histogram: &self.request_duration,
            begin: Instant::now(),
            labels: vec![
                KeyValue::new("provider_name", provider_name.to_string()),
                KeyValue::new("instance_type", instance_type.to_string()),
                KeyValue::new("instance_name", instance_name.to_string()),
                KeyValue::new("action", action.to_string()),
            ],
        }
    }

    /// Record the installation status of a platform
    ///
    /// The current status reads 1 and every other status 0.
    pub fn set_platform_status(&self, platform: &str, status: InstallStatus) {
        for (label, value) in platform_status_values(status) {
            self.platform_status.record(
                value,
                &[
                    KeyValue::new("platform", platform.to_string()),
                    KeyValue::new("status", label),
                ],
            );
        }
    }
}

/// An in-flight provider call
pub struct Execution<'a> {
    histogram: &'a Histogram<f64>,
    begin: Instant,
    labels: Vec<KeyValue>,
}

impl Execution<'_> {
    /// Record duration and outcome of the call
    pub fn finish<T, E>(mut self, result: &Result<T, E>) {
        let outcome = if result.is_ok() {
            OUTCOME_SUCCESS
        } else {
            OUTCOME_FAILURE
        };
        self.labels.push(KeyValue::new("outcome", outcome));
        self.histogram
            .record(self.begin.elapsed().as_secs_f64(), &self.labels);
    }
}

// ============================================================================
// Readiness gauges
// ============================================================================

/// Ready, reason and time-to-ready gauges for one resource kind
pub struct ResourceStatusGauges {
    resource_label: &'static str,
    ready: Gauge<i64>,
    reason: Gauge<i64>,
    elapsed: Gauge<f64>,
    reasons: ProviderReasonsCache,
}

impl ResourceStatusGauges {
    fn new(meter: &Meter, resource: &'static str, ready_help: &str) -> Self {
        Self {
            resource_label: resource,
            ready: meter
                .i64_gauge(format!("dbaas_{}_status_ready", resource))
                .with_description(format!("DBaaS provider {} is {}", resource, ready_help))
                .build(),
            reason: meter
                .i64_gauge(format!("dbaas_{}_status_reason", resource))
                .with_description(format!("DBaaS {} status reason", resource))
                .build(),
            elapsed: meter
                .f64_gauge(format!("dbaas_{}_creation_ready_seconds", resource))
                .with_description(format!(
                    "Elapsed time from DBaaS provider {} creation to ready",
                    resource
                ))
                .with_unit("s")
                .build(),
            reasons: ProviderReasonsCache::default(),
        }
    }

    /// Record the managed condition of one resource
    ///
    /// The reason gauge is set to 1 for the current reason and 0 for every
    /// other reason seen for the provider, so stale series drop to zero.
    pub fn record(
        &self,
        provider: &str,
        name: &str,
        namespace: &str,
        created: Option<DateTime<Utc>>,
        condition: Option<&Condition>,
    ) {
        let labels = [
            KeyValue::new("provider", provider.to_string()),
            KeyValue::new(self.resource_label, name.to_string()),
            KeyValue::new("namespace", namespace.to_string()),
        ];

        let Some(condition) = condition else {
            self.ready.record(0, &labels);
            return;
        };

        self.ready.record(i64::from(condition.is_true()), &labels);

        if condition.is_true() {
            if let Some(created) = created {
                let elapsed = (condition.last_transition_time - created)
                    .to_std()
                    .unwrap_or_default();
                self.elapsed.record(elapsed.as_secs_f64(), &labels);
            }
        }

        self.reasons.set_provider_reason(provider, &condition.reason);
        for (reason, value) in reason_values(
            &self.reasons.provider_reasons(provider),
            &condition.reason,
        ) {
            let mut with_reason = labels.to_vec();
            with_reason.push(KeyValue::new("reason", reason));
            self.reason.record(value, &with_reason);
        }
    }
}

/// Gauge values for every known reason: 1 for `current`, 0 otherwise
fn platform_status_values(current: InstallStatus) -> Vec<(&'static str, i64)> {
    InstallStatus::ALL
        .iter()
        .map(|s| (s.as_str(), i64::from(*s == current)))
        .collect()
}

fn reason_values(known: &BTreeSet<String>, current: &str) -> Vec<(String, i64)> {
    known
        .iter()
        .map(|r| (r.clone(), i64::from(r == current)))
        .collect()
}

// ============================================================================
// Provider reasons cache
// ============================================================================

/// Every condition reason observed per provider.
///
/// Shared by concurrent reconciles. Entries are only ever added.
#[derive(Default)]
pub struct ProviderReasonsCache {
    reasons: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl ProviderReasonsCache {
    /// Remember that `provider` reported `reason`
    pub fn set_provider_reason(&self, provider: &str, reason: &str) {
        self.reasons
            .lock()
            .entry(provider.to_string())
            .or_default()
            .insert(reason.to_string());
    }

    /// Snapshot of the reasons seen for `provider`
    pub fn provider_reasons(&self, provider: &str) -> BTreeSet<String> {
        self.reasons
            .lock()
            .get(provider)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{reason, ConditionStatus, INVENTORY_READY_TYPE};

    fn metrics() -> Metrics {
        Metrics::new(&opentelemetry::global::meter("dbaas-operator-test"))
    }

    #[test]
    fn test_reasons_cache_accumulates_per_provider() {
        let cache = ProviderReasonsCache::default();
        cache.set_provider_reason("crunchy", reason::RECONCILE_IN_PROGRESS);
        cache.set_provider_reason("crunchy", reason::READY);
        cache.set_provider_reason("crunchy", reason::READY);
        cache.set_provider_reason("other", reason::PROVIDER_NOT_FOUND);

        let reasons = cache.provider_reasons("crunchy");
        assert_eq!(reasons.len(), 2);
        assert!(reasons.contains(reason::READY));
        assert!(cache.provider_reasons("missing").is_empty());
    }

    /// A snapshot does not change when the cache grows afterwards
    #[test]
    fn test_reasons_snapshot_is_detached() {
        let cache = ProviderReasonsCache::default();
        cache.set_provider_reason("crunchy", reason::READY);
        let snapshot = cache.provider_reasons("crunchy");
        cache.set_provider_reason("crunchy", reason::RECONCILE_IN_PROGRESS);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_reason_values_flag_only_current() {
        let known: BTreeSet<String> = [reason::READY, reason::RECONCILE_IN_PROGRESS]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let values = reason_values(&known, reason::READY);
        assert_eq!(
            values,
            vec![
                (reason::READY.to_string(), 1),
                (reason::RECONCILE_IN_PROGRESS.to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_platform_status_values_flag_only_current() {
        assert_eq!(
            platform_status_values(InstallStatus::Success),
            vec![("Success", 1), ("InProgress", 0), ("Failed", 0)]
        );
        assert_eq!(
            platform_status_values(InstallStatus::InProgress),
            vec![("Success", 0), ("InProgress", 1), ("Failed", 0)]
        );
        metrics().set_platform_status("crunchy-bridge", InstallStatus::Failed);
    }

    #[test]
    fn test_execution_finish_records_both_outcomes() {
        let metrics = metrics();
        let ok: Result<(), String> = Ok(());
        metrics
            .execution("crunchy", "CrunchyBridgeInstance", "db", ACTION_CREATE_OR_UPDATE)
            .finish(&ok);
        let err: Result<(), String> = Err("boom".to_string());
        metrics
            .execution("crunchy", "CrunchyBridgeInstance", "db", ACTION_CREATE_OR_UPDATE)
            .finish(&err);
    }

    #[test]
    fn test_record_status_tracks_reasons() {
        let metrics = metrics();
        let condition = Condition::new(
            INVENTORY_READY_TYPE,
            ConditionStatus::True,
            reason::READY,
            "",
        );
        metrics
            .inventory
            .record("crunchy", "inv", "team-a", Some(Utc::now()), Some(&condition));
        metrics.inventory.record("crunchy", "inv", "team-a", None, None);

        assert!(metrics
            .inventory
            .reasons
            .provider_reasons("crunchy")
            .contains(reason::READY));
        assert!(metrics.connection.reasons.provider_reasons("crunchy").is_empty());
    }
}
