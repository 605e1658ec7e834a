use std::sync::Arc;

use kube::discovery::ApiResource;
use kube::Resource;

use super::*;
use crate::crd::{
    DBaaSInventory, DBaaSInventorySpec, DBaaSProviderSpec, InventoryDetails, NamedRef,
    INVENTORY_READY_TYPE,
};
use crate::error::api_error;
use crate::gateway::memory::MemoryGateway;
use crate::gateway::MockResourceGateway;

const NS: &str = "team-a";

fn metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new(&opentelemetry::global::meter("engine-test")))
}

fn provider() -> DBaaSProvider {
    DBaaSProvider::new(
        "crunchy",
        DBaaSProviderSpec {
            inventory_kind: "CrunchyBridgeInventory".to_string(),
            instance_kind: "CrunchyBridgeInstance".to_string(),
            connection_kind: "CrunchyBridgeConnection".to_string(),
            ..Default::default()
        },
    )
}

fn inventory(credentials: &str) -> DBaaSInventory {
    let mut inv = DBaaSInventory::new(
        "inv",
        DBaaSInventorySpec {
            provider_ref: NamedRef {
                name: "crunchy".to_string(),
            },
            inventory: InventoryDetails {
                credentials_ref: NamedRef {
                    name: credentials.to_string(),
                },
            },
        },
    );
    inv.metadata.namespace = Some(NS.to_string());
    inv.metadata.uid = Some("inv-uid".to_string());
    inv.metadata.resource_version = Some("7".to_string());
    inv
}

fn provider_ar() -> ApiResource {
    provider_api_resource("CrunchyBridgeInventory")
}

fn intent_ar() -> ApiResource {
    ApiResource::erase::<DBaaSInventory>(&())
}

fn setup() -> (Arc<MemoryGateway>, ProviderReconciler) {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.add_provider(provider());
    let reconciler = ProviderReconciler::new(gateway.clone(), metrics());
    (gateway, reconciler)
}

fn managed(inv: &DBaaSInventory) -> Condition {
    find_condition(inv.conditions(), INVENTORY_READY_TYPE)
        .cloned()
        .expect("managed condition present")
}

fn provider_status(synced: &str) -> serde_json::Value {
    serde_json::json!({
        "conditions": [{
            "type": "SpecSynced",
            "status": synced,
            "reason": "SyncOK",
            "message": "",
            "lastTransitionTime": "2024-01-01T00:00:00Z"
        }],
        "instances": [{ "instanceID": "abc", "name": "db" }]
    })
}

/// Story: a fresh inventory creates its provider resource and waits; once
/// the provider reports the spec synced, the next pass flips it to ready.
#[tokio::test]
async fn test_two_passes_reach_ready() {
    let (gateway, reconciler) = setup();
    let mut inv = inventory("creds");

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;
    assert!(outcome.error.is_none());
    assert!(!outcome.requeue);

    let obj = gateway.object(&provider_ar(), NS, "inv").unwrap();
    assert_eq!(obj.data["spec"]["credentialsRef"]["name"], "creds");
    let refs = obj.metadata.owner_references.unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].uid, "inv-uid");
    assert_eq!(refs[0].controller, Some(true));

    let condition = managed(&inv);
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, reason::RECONCILE_IN_PROGRESS);
    let written = gateway.status(&intent_ar(), NS, "inv").unwrap();
    assert_eq!(written["conditions"][0]["reason"], "ReconcileInProgress");

    gateway.set_object_status(&provider_ar(), NS, "inv", provider_status("True"));
    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;
    assert!(outcome.error.is_none());

    let condition = managed(&inv);
    assert_eq!(condition.status, ConditionStatus::True);
    assert_eq!(condition.reason, reason::READY);
    assert_eq!(inv.status.as_ref().unwrap().instances[0].instance_id, "abc");
    let written = gateway.status(&intent_ar(), NS, "inv").unwrap();
    let conditions = written["conditions"].as_array().unwrap();
    assert!(conditions
        .iter()
        .any(|c| c["type"] == "InventoryReady" && c["status"] == "True"));
}

/// Story: when the provider stops reporting instances, the intent's status
/// loses them too instead of keeping the last non-empty list.
#[tokio::test]
async fn test_cleared_provider_status_clears_intent_status() {
    let (gateway, reconciler) = setup();
    let mut inv = inventory("creds");
    reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    gateway.set_object_status(&provider_ar(), NS, "inv", provider_status("True"));
    reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;
    let written = gateway.status(&intent_ar(), NS, "inv").unwrap();
    assert_eq!(written["instances"][0]["instanceID"], "abc");

    let mut emptied = provider_status("True");
    emptied["instances"] = serde_json::json!([]);
    gateway.set_object_status(&provider_ar(), NS, "inv", emptied);
    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;
    assert!(outcome.error.is_none());

    assert!(inv.status.as_ref().unwrap().instances.is_empty());
    let written = gateway.status(&intent_ar(), NS, "inv").unwrap();
    assert!(written.get("instances").is_none());
    assert_eq!(managed(&inv).status, ConditionStatus::True);
}

/// Story: reconciling an unchanged inventory again leaves the provider
/// resource untouched and keeps the condition's transition time.
#[tokio::test]
async fn test_second_pass_is_idempotent() {
    let (gateway, reconciler) = setup();
    let mut inv = inventory("creds");

    reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;
    let first_obj = gateway.object(&provider_ar(), NS, "inv").unwrap();
    let first_condition = managed(&inv);
    let writes = gateway.writes();

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;
    assert!(outcome.error.is_none());

    let second_obj = gateway.object(&provider_ar(), NS, "inv").unwrap();
    assert_eq!(
        serde_json::to_vec(&first_obj.data["spec"]).unwrap(),
        serde_json::to_vec(&second_obj.data["spec"]).unwrap()
    );
    assert_eq!(gateway.writes(), writes);
    assert_eq!(managed(&inv), first_condition);
    assert_eq!(inv.conditions().len(), 1);
}

#[tokio::test]
async fn test_changed_spec_overwrites_provider_spec() {
    let (gateway, reconciler) = setup();
    let mut inv = inventory("creds");
    reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    inv.spec.inventory.credentials_ref.name = "rotated".to_string();
    reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    let obj = gateway.object(&provider_ar(), NS, "inv").unwrap();
    assert_eq!(obj.data["spec"]["credentialsRef"]["name"], "rotated");
}

#[tokio::test]
async fn test_missing_provider_is_terminal() {
    let gateway = Arc::new(MemoryGateway::new());
    let reconciler = ProviderReconciler::new(gateway.clone(), metrics());
    let mut inv = inventory("creds");

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    let err = outcome.error.expect("error returned");
    assert!(matches!(err, Error::ProviderNotFound { .. }));
    assert!(!err.is_retryable());
    assert!(!outcome.requeue);
    assert_eq!(managed(&inv).reason, reason::PROVIDER_NOT_FOUND);
    assert!(gateway.object(&provider_ar(), NS, "inv").is_none());
    let written = gateway.status(&intent_ar(), NS, "inv").unwrap();
    assert_eq!(written["conditions"][0]["reason"], "ProviderNotFound");
}

/// Story: the status write loses a race after the pass already failed; the
/// pass requeues but still reports the original failure.
#[tokio::test]
async fn test_status_conflict_preserves_earlier_error() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.fail_status_writes(1);
    let reconciler = ProviderReconciler::new(gateway.clone(), metrics());
    let mut inv = inventory("creds");

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    assert!(outcome.requeue);
    let err = outcome.error.expect("error preserved");
    assert!(matches!(err, Error::ProviderNotFound { .. }));
    assert!(!err.is_conflict());
}

#[tokio::test]
async fn test_status_conflict_alone_requeues() {
    let (gateway, reconciler) = setup();
    gateway.fail_status_writes(1);
    let mut inv = inventory("creds");

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    assert!(outcome.requeue);
    assert!(outcome.error.is_none());
    assert!(gateway.status(&intent_ar(), NS, "inv").is_none());
}

/// Story: someone else updated the provider resource between our read and
/// write. The pass requeues without error and does not touch the condition.
#[tokio::test]
async fn test_provider_conflict_requeues_and_keeps_condition() {
    let (gateway, reconciler) = setup();
    let mut inv = inventory("creds");
    reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;
    gateway.set_object_status(&provider_ar(), NS, "inv", provider_status("True"));
    reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;
    let before = managed(&inv);
    assert!(before.is_true());

    inv.spec.inventory.credentials_ref.name = "rotated".to_string();
    gateway.fail_updates(1);
    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    assert!(outcome.requeue);
    assert!(outcome.error.is_none());
    assert_eq!(managed(&inv), before);
    let obj = gateway.object(&provider_ar(), NS, "inv").unwrap();
    assert_eq!(obj.data["spec"]["credentialsRef"]["name"], "creds");
}

#[tokio::test]
async fn test_unparsable_provider_status_is_terminal() {
    let (gateway, reconciler) = setup();
    let mut inv = inventory("creds");
    reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    gateway.set_object_status(
        &provider_ar(),
        NS,
        "inv",
        serde_json::json!({ "conditions": "not-a-list" }),
    );
    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    let err = outcome.error.expect("parse error");
    assert!(matches!(err, Error::ProviderParsing { .. }));
    assert!(!err.is_retryable());
    let condition = managed(&inv);
    assert_eq!(condition.reason, reason::PROVIDER_PARSING_ERROR);
    assert_eq!(condition.status, ConditionStatus::False);
}

/// A failed provider lookup still writes status exactly once and returns
/// the lookup error.
#[tokio::test]
async fn test_gateway_failure_propagates_and_writes_status() {
    let mut mock = MockResourceGateway::new();
    mock.expect_get_provider()
        .times(1)
        .returning(|_| Err(api_error(500, "InternalError")));
    mock.expect_replace_status()
        .times(1)
        .returning(|_, _, _, rv, _| {
            assert_eq!(rv.as_deref(), Some("7"));
            Ok(())
        });
    let reconciler = ProviderReconciler::new(Arc::new(mock), metrics());
    let mut inv = inventory("creds");

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    let err = outcome.error.expect("error returned");
    assert_eq!(err.api_code(), Some(500));
    assert_eq!(managed(&inv).reason, reason::RECONCILE_IN_PROGRESS);
}

/// Story: a provider whose CRD is not served yet fails the pass with an
/// error the controller retries, so the intent converges once the provider
/// operator finishes installing.
#[tokio::test]
async fn test_uninstalled_provider_kind_is_retried() {
    let mut mock = MockResourceGateway::new();
    mock.expect_get_provider()
        .returning(|_| Ok(Some(provider())));
    mock.expect_get()
        .returning(|_, _, _| Err(api_error(404, "NotFound")));
    mock.expect_create().times(0);
    mock.expect_replace_status()
        .times(1)
        .returning(|_, _, _, _, _| Ok(()));
    let reconciler = ProviderReconciler::new(Arc::new(mock), metrics());
    let mut inv = inventory("creds");

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    let err = outcome.error.expect("error returned");
    assert!(err.is_not_found());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_status_write_failure_does_not_mask_earlier_error() {
    let mut mock = MockResourceGateway::new();
    mock.expect_get_provider()
        .returning(|_| Ok(None));
    mock.expect_replace_status()
        .returning(|_, _, _, _, _| Err(api_error(500, "InternalError")));
    let reconciler = ProviderReconciler::new(Arc::new(mock), metrics());
    let mut inv = inventory("creds");

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    assert!(matches!(outcome.error, Some(Error::ProviderNotFound { .. })));
}

#[tokio::test]
async fn test_status_write_failure_reported_when_sync_succeeded() {
    let mut mock = MockResourceGateway::new();
    mock.expect_get_provider()
        .returning(|_| Ok(Some(provider())));
    mock.expect_get().returning(|_, _, _| Ok(None));
    mock.expect_create()
        .times(1)
        .returning(|_, obj| Ok(obj.clone()));
    mock.expect_replace_status()
        .returning(|_, _, _, _, _| Err(api_error(500, "InternalError")));
    let reconciler = ProviderReconciler::new(Arc::new(mock), metrics());
    let mut inv = inventory("creds");

    let outcome = reconciler
        .reconcile_provider_resource("crunchy", &mut inv, &InventoryAdapter)
        .await;

    assert!(!outcome.requeue);
    assert_eq!(outcome.error.map(|e| e.api_code()), Some(Some(500)));
}

#[test]
fn test_pass_outcome_into_action() {
    let requeue = Duration::from_secs(1);
    assert_eq!(
        PassOutcome::default().into_action(requeue).unwrap(),
        Action::await_change()
    );
    let outcome = PassOutcome {
        requeue: true,
        error: None,
    };
    assert_eq!(outcome.into_action(requeue).unwrap(), Action::requeue(requeue));
    assert!(PassOutcome::failed(Error::not_ready("x"))
        .into_action(requeue)
        .is_err());
}

#[test]
fn test_intent_kind_names() {
    assert_eq!(DBaaSInventory::kind(&()), "DBaaSInventory");
}
