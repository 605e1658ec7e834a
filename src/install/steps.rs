//! OLM-based installation of a provider operator

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use tracing::{debug, info};

use super::{run_steps, InstallStatus, InstallStep, PlatformInstaller};
use crate::gateway::{create_or_update, delete_if_exists, OperationResult, ResourceGateway};
use crate::kube_utils::HasApiResource;
use crate::olm::{
    to_dynamic, CatalogSource, CatalogSourceSpec, OlmMetadata, OperatorGroup, OperatorGroupSpec,
    Subscription, SubscriptionSpec,
};
use crate::Error;

/// Catalog sources are served over gRPC
pub const SOURCE_TYPE_GRPC: &str = "grpc";
/// Install plans are approved without user action
pub const APPROVAL_AUTOMATIC: &str = "Automatic";

/// Everything needed to install one provider operator through OLM
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorBundle {
    /// Platform name reported in DBaaSPlatform status
    pub platform: String,
    /// Namespace the subscription, group and operator live in
    pub install_namespace: String,
    /// Namespace of the catalog source
    pub catalog_namespace: String,
    /// CatalogSource name
    pub catalog_source: String,
    /// Catalog display name
    pub display_name: String,
    /// Catalog index image
    pub image: String,
    /// Subscription name
    pub subscription: String,
    /// Package to subscribe to
    pub package: String,
    /// Update channel
    pub channel: String,
    /// OperatorGroup name
    pub operator_group: String,
    /// Name of the operator's controller deployment
    pub deployment: String,
}

impl OperatorBundle {
    fn catalog_source(&self) -> CatalogSource {
        CatalogSource::new(
            OlmMetadata::new(&self.catalog_source, &self.catalog_namespace),
            CatalogSourceSpec {
                source_type: SOURCE_TYPE_GRPC.to_string(),
                image: self.image.clone(),
                display_name: self.display_name.clone(),
            },
        )
    }

    fn subscription(&self) -> Subscription {
        Subscription::new(
            OlmMetadata::new(&self.subscription, &self.install_namespace),
            SubscriptionSpec {
                source: self.catalog_source.clone(),
                source_namespace: self.catalog_namespace.clone(),
                name: self.package.clone(),
                channel: self.channel.clone(),
                install_plan_approval: APPROVAL_AUTOMATIC.to_string(),
            },
        )
    }

    fn operator_group(&self) -> OperatorGroup {
        OperatorGroup::new(
            OlmMetadata::new(&self.operator_group, &self.install_namespace),
            OperatorGroupSpec::default(),
        )
    }
}

/// Create or update `desired`, overwriting only its spec and labels
async fn converge(
    gateway: &dyn ResourceGateway,
    ar: &ApiResource,
    desired: DynamicObject,
) -> Result<InstallStatus, Error> {
    let spec = desired.data.get("spec").cloned().unwrap_or_default();
    let labels = desired.metadata.labels.clone();
    let name = desired.metadata.name.clone().unwrap_or_default();

    let (op, _) = create_or_update(gateway, ar, desired, move |obj| {
        obj.data["spec"] = spec;
        if let Some(labels) = labels {
            obj.metadata
                .labels
                .get_or_insert_with(Default::default)
                .extend(labels);
        }
        Ok(())
    })
    .await?;

    if op != OperationResult::Unchanged {
        info!(kind = %ar.kind, name = %name, operation = ?op, "converged OLM resource");
    }
    Ok(InstallStatus::Success)
}

/// Registers the catalog source
pub struct CatalogSourceStep {
    gateway: Arc<dyn ResourceGateway>,
    bundle: OperatorBundle,
}

#[async_trait]
impl InstallStep for CatalogSourceStep {
    fn name(&self) -> &'static str {
        "catalog-source"
    }

    async fn execute(&self) -> Result<InstallStatus, Error> {
        let desired = to_dynamic(&self.bundle.catalog_source())?;
        converge(self.gateway.as_ref(), &CatalogSource::api_resource(), desired).await
    }
}

/// Registers the subscription
pub struct SubscriptionStep {
    gateway: Arc<dyn ResourceGateway>,
    bundle: OperatorBundle,
}

#[async_trait]
impl InstallStep for SubscriptionStep {
    fn name(&self) -> &'static str {
        "subscription"
    }

    async fn execute(&self) -> Result<InstallStatus, Error> {
        let desired = to_dynamic(&self.bundle.subscription())?;
        converge(self.gateway.as_ref(), &Subscription::api_resource(), desired).await
    }
}

/// Registers the operator group
pub struct OperatorGroupStep {
    gateway: Arc<dyn ResourceGateway>,
    bundle: OperatorBundle,
}

#[async_trait]
impl InstallStep for OperatorGroupStep {
    fn name(&self) -> &'static str {
        "operator-group"
    }

    async fn execute(&self) -> Result<InstallStatus, Error> {
        let desired = to_dynamic(&self.bundle.operator_group())?;
        converge(self.gateway.as_ref(), &OperatorGroup::api_resource(), desired).await
    }
}

/// Waits for the operator deployment to have a ready replica
pub struct DeploymentReadyStep {
    gateway: Arc<dyn ResourceGateway>,
    bundle: OperatorBundle,
}

#[async_trait]
impl InstallStep for DeploymentReadyStep {
    fn name(&self) -> &'static str {
        "deployment-ready"
    }

    async fn execute(&self) -> Result<InstallStatus, Error> {
        let deployments = self
            .gateway
            .list_deployments(&self.bundle.install_namespace)
            .await?;

        let ready = deployments
            .iter()
            .filter(|d| d.metadata.name.as_deref() == Some(self.bundle.deployment.as_str()))
            .any(|d| {
                d.status
                    .as_ref()
                    .and_then(|s| s.ready_replicas)
                    .unwrap_or(0)
                    > 0
            });

        if ready {
            Ok(InstallStatus::Success)
        } else {
            debug!(
                deployment = %self.bundle.deployment,
                namespace = %self.bundle.install_namespace,
                "operator deployment not ready yet"
            );
            Ok(InstallStatus::InProgress)
        }
    }
}

/// [`PlatformInstaller`] that installs an operator through OLM
pub struct OperatorInstaller {
    gateway: Arc<dyn ResourceGateway>,
    bundle: OperatorBundle,
}

impl OperatorInstaller {
    /// Create an installer for `bundle`
    pub fn new(bundle: OperatorBundle, gateway: Arc<dyn ResourceGateway>) -> Self {
        Self { gateway, bundle }
    }

    fn steps(&self) -> Vec<Box<dyn InstallStep>> {
        vec![
            Box::new(CatalogSourceStep {
                gateway: self.gateway.clone(),
                bundle: self.bundle.clone(),
            }),
            Box::new(SubscriptionStep {
                gateway: self.gateway.clone(),
                bundle: self.bundle.clone(),
            }),
            Box::new(OperatorGroupStep {
                gateway: self.gateway.clone(),
                bundle: self.bundle.clone(),
            }),
            Box::new(DeploymentReadyStep {
                gateway: self.gateway.clone(),
                bundle: self.bundle.clone(),
            }),
        ]
    }
}

#[async_trait]
impl PlatformInstaller for OperatorInstaller {
    fn platform(&self) -> String {
        self.bundle.platform.clone()
    }

    async fn install(&self) -> Result<InstallStatus, Error> {
        let status = run_steps(&self.steps()).await.map_err(|e| {
            Error::installation(&self.bundle.platform, e.to_string())
        })?;
        info!(platform = %self.bundle.platform, status = %status, "installation pass finished");
        Ok(status)
    }

    async fn cleanup(&self) -> Result<InstallStatus, Error> {
        let gateway = self.gateway.as_ref();
        let bundle = &self.bundle;

        delete_if_exists(
            gateway,
            &Subscription::api_resource(),
            &bundle.install_namespace,
            &bundle.subscription,
        )
        .await?;

        delete_if_exists(
            gateway,
            &CatalogSource::api_resource(),
            &bundle.catalog_namespace,
            &bundle.catalog_source,
        )
        .await?;

        let deployments = gateway.list_deployments(&bundle.install_namespace).await?;
        for deployment in deployments
            .iter()
            .filter(|d| d.metadata.name.as_deref() == Some(bundle.deployment.as_str()))
        {
            match gateway
                .delete_deployment(&bundle.install_namespace, &bundle.deployment)
                .await
            {
                Err(e) if !e.is_not_found() => return Err(e),
                _ => debug!(name = ?deployment.metadata.name, "operator deployment removed"),
            }
        }

        info!(platform = %bundle.platform, "cleanup finished");
        Ok(InstallStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use mockall::Sequence;

    use super::*;
    use crate::config::OperatorConfig;
    use crate::error::api_error;
    use crate::gateway::memory::MemoryGateway;
    use crate::gateway::MockResourceGateway;
    use crate::install::crunchy_bridge_bundle;

    fn bundle() -> OperatorBundle {
        crunchy_bridge_bundle(&OperatorConfig::for_testing())
    }

    fn deployment(name: &str, ready: i32) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(DeploymentStatus {
                ready_replicas: Some(ready),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Story: a fresh cluster registers every OLM resource on the first
    /// pass, waits for the operator, then reports success once the
    /// deployment has a ready replica.
    #[tokio::test]
    async fn test_install_converges_across_passes() {
        let gateway = Arc::new(MemoryGateway::new());
        let installer = OperatorInstaller::new(bundle(), gateway.clone());
        let b = bundle();

        assert_eq!(installer.install().await.unwrap(), InstallStatus::InProgress);
        let catalog = gateway
            .object(&CatalogSource::api_resource(), &b.catalog_namespace, &b.catalog_source)
            .unwrap();
        assert_eq!(catalog.data["spec"]["sourceType"], "grpc");
        let sub = gateway
            .object(&Subscription::api_resource(), &b.install_namespace, &b.subscription)
            .unwrap();
        assert_eq!(sub.data["spec"]["name"], "crunchy-bridge-operator");
        assert_eq!(sub.data["spec"]["installPlanApproval"], "Automatic");
        assert!(gateway
            .object(&OperatorGroup::api_resource(), &b.install_namespace, &b.operator_group)
            .is_some());
        let writes = gateway.writes();

        gateway.add_deployment(&b.install_namespace, deployment(&b.deployment, 1));
        assert_eq!(installer.install().await.unwrap(), InstallStatus::Success);
        assert_eq!(gateway.writes(), writes, "converged steps must not rewrite");
    }

    #[tokio::test]
    async fn test_unready_deployment_is_in_progress() {
        let gateway = Arc::new(MemoryGateway::new());
        let b = bundle();
        gateway.add_deployment(&b.install_namespace, deployment(&b.deployment, 0));
        gateway.add_deployment(&b.install_namespace, deployment("unrelated", 3));

        let step = DeploymentReadyStep {
            gateway: gateway.clone(),
            bundle: b,
        };
        assert_eq!(step.execute().await.unwrap(), InstallStatus::InProgress);
    }

    #[tokio::test]
    async fn test_deployment_list_failure_fails_install() {
        let mut mock = MockResourceGateway::new();
        mock.expect_list_deployments()
            .returning(|_| Err(api_error(503, "ServiceUnavailable")));
        let step = DeploymentReadyStep {
            gateway: Arc::new(mock),
            bundle: bundle(),
        };
        assert!(step.execute().await.is_err());
    }

    #[tokio::test]
    async fn test_step_failure_surfaces_as_installation_error() {
        let mut mock = MockResourceGateway::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _, _| Err(api_error(500, "InternalError")));
        mock.expect_create().never();
        let installer = OperatorInstaller::new(bundle(), Arc::new(mock));

        let err = installer.install().await.unwrap_err();
        assert!(matches!(err, Error::Installation { .. }));
    }

    /// Story: cleanup removes the subscription before the catalog source and
    /// only then the operator deployment.
    #[tokio::test]
    async fn test_cleanup_runs_in_reverse_order() {
        let b = bundle();
        let mut seq = Sequence::new();
        let mut mock = MockResourceGateway::new();
        mock.expect_delete()
            .withf(|ar, _, _| ar.kind == "Subscription")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_delete()
            .withf(|ar, _, _| ar.kind == "CatalogSource")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        let name = b.deployment.clone();
        mock.expect_list_deployments()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(vec![deployment(&name, 1)]));
        mock.expect_delete_deployment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let installer = OperatorInstaller::new(b, Arc::new(mock));
        assert_eq!(installer.cleanup().await.unwrap(), InstallStatus::Success);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let gateway = Arc::new(MemoryGateway::new());
        let b = bundle();
        let installer = OperatorInstaller::new(b.clone(), gateway.clone());
        gateway.add_deployment(&b.install_namespace, deployment(&b.deployment, 1));
        installer.install().await.unwrap();

        assert_eq!(installer.cleanup().await.unwrap(), InstallStatus::Success);
        assert!(gateway
            .object(&Subscription::api_resource(), &b.install_namespace, &b.subscription)
            .is_none());
        assert_eq!(installer.cleanup().await.unwrap(), InstallStatus::Success);
    }

    #[tokio::test]
    async fn test_cleanup_propagates_unexpected_delete_error() {
        let mut mock = MockResourceGateway::new();
        mock.expect_delete()
            .returning(|_, _, _| Err(api_error(403, "Forbidden")));
        let installer = OperatorInstaller::new(bundle(), Arc::new(mock));
        assert!(installer.cleanup().await.is_err());
    }
}
