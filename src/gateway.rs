//! Resource gateway
//!
//! The narrow set of API-server operations the engine, installers and
//! controllers need. Production code talks to the cluster through
//! [`KubeGateway`]; tests substitute mocks or the in-memory store.
//!
//! Conflicts (409) and missing objects (404) surface as `Error::Kube` and are
//! told apart with [`Error::is_conflict`] and [`Error::is_not_found`].

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::crd::{DBaaSInventory, DBaaSProvider};
use crate::{Error, FIELD_MANAGER};

/// Trait abstracting API-server access for the DBaaS operator
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    /// Fetch a DBaaSProvider by name; `None` if it does not exist
    async fn get_provider(&self, name: &str) -> Result<Option<DBaaSProvider>, Error>;

    /// Fetch a DBaaSInventory; `None` if it does not exist
    async fn get_inventory(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DBaaSInventory>, Error>;

    /// Fetch a dynamically typed object; `None` if it does not exist
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error>;

    /// Create an object, returning the stored copy
    async fn create(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, Error>;

    /// Replace an object, returning the stored copy
    ///
    /// Fails with a conflict when `obj` carries a stale resourceVersion.
    async fn update(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, Error>;

    /// Delete an object; a missing object is reported as not-found
    async fn delete(&self, ar: &ApiResource, namespace: &str, name: &str) -> Result<(), Error>;

    /// Replace the status subresource with `status`
    ///
    /// Fields absent from `status` are cleared. When `resource_version` is
    /// set the write is rejected with a conflict if the object changed since
    /// it was read.
    async fn replace_status(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        status: serde_json::Value,
    ) -> Result<(), Error>;

    /// Replace the finalizer list of an object
    ///
    /// Guarded by `resource_version` like [`ResourceGateway::replace_status`],
    /// so finalizers added by others since the read are never dropped.
    async fn set_finalizers(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        finalizers: Vec<String>,
    ) -> Result<(), Error>;

    /// List deployments in a namespace
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, Error>;

    /// Delete a deployment; a missing deployment is reported as not-found
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error>;
}

/// Real gateway implementation backed by a kube Client
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    /// Create a new KubeGateway wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic(&self, ar: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, ar)
    }
}

#[async_trait]
impl ResourceGateway for KubeGateway {
    async fn get_provider(&self, name: &str) -> Result<Option<DBaaSProvider>, Error> {
        let api: Api<DBaaSProvider> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn get_inventory(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DBaaSInventory>, Error> {
        let api: Api<DBaaSInventory> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        Ok(self.dynamic(ar, namespace).get_opt(name).await?)
    }

    async fn create(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, Error> {
        let namespace = object_namespace(obj)?;
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(self.dynamic(ar, namespace).create(&pp, obj).await?)
    }

    async fn update(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject, Error> {
        let namespace = object_namespace(obj)?;
        let name = object_name(obj)?;
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(self.dynamic(ar, namespace).replace(name, &pp, obj).await?)
    }

    async fn delete(&self, ar: &ApiResource, namespace: &str, name: &str) -> Result<(), Error> {
        self.dynamic(ar, namespace)
            .delete(name, &DeleteParams::background())
            .await?;
        debug!(kind = %ar.kind, namespace = %namespace, name = %name, "deleted resource");
        Ok(())
    }

    async fn replace_status(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        status: serde_json::Value,
    ) -> Result<(), Error> {
        let body = status_object(ar, namespace, name, resource_version, status);
        let data = serde_json::to_vec(&body)
            .map_err(|e| Error::serialization(format!("failed to encode status: {}", e)))?;
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.dynamic(ar, namespace)
            .replace_status(name, &pp, data)
            .await?;
        Ok(())
    }

    async fn set_finalizers(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        finalizers: Vec<String>,
    ) -> Result<(), Error> {
        let patch = finalizer_patch(resource_version, finalizers);
        self.dynamic(ar, namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::background()).await?;
        Ok(())
    }
}

/// Body of a status PUT: identity, optional resourceVersion and the status
fn status_object(
    ar: &ApiResource,
    namespace: &str,
    name: &str,
    resource_version: Option<String>,
    status: serde_json::Value,
) -> DynamicObject {
    let mut obj = DynamicObject::new(name, ar).within(namespace);
    obj.metadata.resource_version = resource_version;
    obj.data = serde_json::json!({ "status": status });
    obj
}

/// Merge patch replacing the finalizer list, guarded by resourceVersion
fn finalizer_patch(resource_version: Option<String>, finalizers: Vec<String>) -> serde_json::Value {
    let mut patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    if let Some(rv) = resource_version {
        patch["metadata"]["resourceVersion"] = serde_json::Value::String(rv);
    }
    patch
}

fn object_name(obj: &DynamicObject) -> Result<&str, Error> {
    obj.metadata
        .name
        .as_deref()
        .ok_or_else(|| Error::internal_with_context("gateway", "object has no name"))
}

fn object_namespace(obj: &DynamicObject) -> Result<&str, Error> {
    obj.metadata
        .namespace
        .as_deref()
        .ok_or_else(|| Error::internal_with_context("gateway", "object has no namespace"))
}

// =============================================================================
// Create or update
// =============================================================================

/// What `create_or_update` did to the stored object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    /// The object did not exist and was created
    Created,
    /// The object existed and the mutation changed it
    Updated,
    /// The object existed and the mutation was a no-op
    Unchanged,
}

/// Idempotently converge an object.
///
/// Fetches the object named by `desired`; if absent, applies `mutate` to
/// `desired` and creates it. Otherwise applies `mutate` to the stored copy
/// and writes it back only when the mutation changed something. The stored
/// resourceVersion is kept, so a concurrent writer produces a conflict.
///
/// Returns the operation performed and the object as stored afterwards.
pub async fn create_or_update<F>(
    gateway: &dyn ResourceGateway,
    ar: &ApiResource,
    desired: DynamicObject,
    mutate: F,
) -> Result<(OperationResult, DynamicObject), Error>
where
    F: FnOnce(&mut DynamicObject) -> Result<(), Error> + Send,
{
    let name = object_name(&desired)?.to_string();
    let namespace = object_namespace(&desired)?.to_string();

    match gateway.get(ar, &namespace, &name).await? {
        None => {
            let mut obj = desired;
            mutate(&mut obj)?;
            let created = gateway.create(ar, &obj).await?;
            Ok((OperationResult::Created, created))
        }
        Some(existing) => {
            let mut obj = existing.clone();
            mutate(&mut obj)?;
            if encode(&obj)? == encode(&existing)? {
                return Ok((OperationResult::Unchanged, existing));
            }
            let updated = gateway.update(ar, &obj).await?;
            Ok((OperationResult::Updated, updated))
        }
    }
}

fn encode(obj: &DynamicObject) -> Result<serde_json::Value, Error> {
    serde_json::to_value(obj)
        .map_err(|e| Error::serialization(format!("failed to encode object: {}", e)))
}

/// Delete an object, treating a missing object as already deleted
pub async fn delete_if_exists(
    gateway: &dyn ResourceGateway,
    ar: &ApiResource,
    namespace: &str,
    name: &str,
) -> Result<(), Error> {
    match gateway.delete(ar, namespace, name).await {
        Err(e) if e.is_not_found() => {
            debug!(kind = %ar.kind, namespace = %namespace, name = %name, "already deleted");
            Ok(())
        }
        other => other,
    }
}

// =============================================================================
// In-memory gateway for multi-pass tests
// =============================================================================


#[cfg(test)]
mod tests {
    use super::memory::MemoryGateway;
    use super::*;
    use crate::error::api_error;
    use crate::kube_utils::provider_api_resource;

    fn desired(ar: &ApiResource) -> DynamicObject {
        DynamicObject::new("db", ar).within("team-a")
    }

    fn set_spec(size: &'static str) -> impl FnOnce(&mut DynamicObject) -> Result<(), Error> + Send {
        move |obj| {
            obj.data["spec"] = serde_json::json!({ "size": size });
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_create_or_update_creates_then_noops() {
        let gateway = MemoryGateway::new();
        let ar = provider_api_resource("CrunchyBridgeInstance");

        let (op, stored) = create_or_update(&gateway, &ar, desired(&ar), set_spec("small"))
            .await
            .unwrap();
        assert_eq!(op, OperationResult::Created);
        assert_eq!(stored.data["spec"]["size"], "small");

        let (op, _) = create_or_update(&gateway, &ar, desired(&ar), set_spec("small"))
            .await
            .unwrap();
        assert_eq!(op, OperationResult::Unchanged);
        assert_eq!(gateway.writes(), 1);
    }

    #[tokio::test]
    async fn test_create_or_update_rewrites_changed_spec() {
        let gateway = MemoryGateway::new();
        let ar = provider_api_resource("CrunchyBridgeInstance");
        create_or_update(&gateway, &ar, desired(&ar), set_spec("small"))
            .await
            .unwrap();

        let (op, stored) = create_or_update(&gateway, &ar, desired(&ar), set_spec("large"))
            .await
            .unwrap();
        assert_eq!(op, OperationResult::Updated);
        assert_eq!(stored.data["spec"]["size"], "large");
    }

    #[tokio::test]
    async fn test_create_or_update_surfaces_conflict() {
        let gateway = MemoryGateway::new();
        let ar = provider_api_resource("CrunchyBridgeInstance");
        create_or_update(&gateway, &ar, desired(&ar), set_spec("small"))
            .await
            .unwrap();
        gateway.fail_updates(1);

        let err = create_or_update(&gateway, &ar, desired(&ar), set_spec("large"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_status_object_is_a_full_replacement_body() {
        let ar = ApiResource::erase::<DBaaSInventory>(&());
        let body = serde_json::to_value(status_object(
            &ar,
            "team-a",
            "inv",
            Some("7".to_string()),
            serde_json::json!({ "conditions": [] }),
        ))
        .unwrap();

        assert_eq!(body["apiVersion"], "dbaas.redhat.com/v1alpha1");
        assert_eq!(body["kind"], "DBaaSInventory");
        assert_eq!(body["metadata"]["name"], "inv");
        assert_eq!(body["metadata"]["namespace"], "team-a");
        assert_eq!(body["metadata"]["resourceVersion"], "7");
        assert_eq!(body["status"], serde_json::json!({ "conditions": [] }));
    }

    #[test]
    fn test_finalizer_patch_carries_resource_version() {
        let patch = finalizer_patch(Some("12".to_string()), vec!["a/b".to_string()]);
        assert_eq!(patch["metadata"]["resourceVersion"], "12");
        assert_eq!(patch["metadata"]["finalizers"][0], "a/b");

        let unguarded = finalizer_patch(None, vec![]);
        assert!(unguarded["metadata"].get("resourceVersion").is_none());
    }

    #[tokio::test]
    async fn test_stale_finalizer_write_conflicts() {
        let gateway = MemoryGateway::new();
        let ar = ApiResource::erase::<DBaaSInventory>(&());
        gateway.set_version(&ar, "team-a", "inv", "4");

        let err = gateway
            .set_finalizers(&ar, "team-a", "inv", Some("3".to_string()), vec![])
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        gateway
            .set_finalizers(&ar, "team-a", "inv", Some("4".to_string()), vec!["a/b".to_string()])
            .await
            .unwrap();
        assert_eq!(gateway.finalizers(&ar, "team-a", "inv"), vec!["a/b".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_if_exists_tolerates_missing() {
        let mut mock = MockResourceGateway::new();
        mock.expect_delete()
            .times(1)
            .returning(|_, _, _| Err(api_error(404, "NotFound")));
        let ar = provider_api_resource("CrunchyBridgeInstance");

        delete_if_exists(&mock, &ar, "team-a", "db").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_if_exists_propagates_other_errors() {
        let mut mock = MockResourceGateway::new();
        mock.expect_delete()
            .times(1)
            .returning(|_, _, _| Err(api_error(500, "InternalError")));
        let ar = provider_api_resource("CrunchyBridgeInstance");

        let err = delete_if_exists(&mock, &ar, "team-a", "db")
            .await
            .unwrap_err();
        assert_eq!(err.api_code(), Some(500));
    }
}
