//! DBaaSPlatform controller
//!
//! Installs every supported provider operator and reports per-platform
//! progress. Deleting the DBaaSPlatform tears the operators down again; a
//! finalizer holds the object until every cleanup has finished.

use std::sync::Arc;
use std::time::Duration;

use kube::discovery::ApiResource;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use super::Context;
use crate::crd::{
    message, reason, set_condition, Condition, ConditionStatus, DBaaSPlatform, InstallStatus,
    IntentResource, PlatformStatus,
};
use crate::engine::write_status;
use crate::Error;

/// Finalizer guarding provider operator cleanup
pub const PLATFORM_FINALIZER: &str = "dbaas.redhat.com/platform-cleanup";

/// Reconcile a DBaaSPlatform
#[instrument(skip(platform, ctx), fields(platform = %platform.name_any()))]
pub async fn reconcile(platform: Arc<DBaaSPlatform>, ctx: Arc<Context>) -> Result<Action, Error> {
    let mut platform = (*platform).clone();

    if platform.metadata.deletion_timestamp.is_some() {
        return cleanup(&mut platform, &ctx).await;
    }

    if !platform.finalizers().iter().any(|f| f == PLATFORM_FINALIZER) {
        let mut finalizers = platform.finalizers().to_vec();
        finalizers.push(PLATFORM_FINALIZER.to_string());
        if set_finalizers(&platform, &ctx, finalizers).await? {
            debug!("added cleanup finalizer");
        }
        return Ok(Action::requeue(ctx.config.requeue.conflict));
    }

    info!("reconciling platform");
    let (overall, first_error) = install_all(&mut platform, &ctx).await;

    let condition = match overall {
        InstallStatus::Success => Condition::new(
            DBaaSPlatform::READY_TYPE,
            ConditionStatus::True,
            reason::READY,
            message::PLATFORMS_READY,
        ),
        InstallStatus::InProgress => Condition::new(
            DBaaSPlatform::READY_TYPE,
            ConditionStatus::False,
            reason::INSTALLATION_IN_PROGRESS,
            "Provider operator installation in progress",
        ),
        InstallStatus::Failed => Condition::new(
            DBaaSPlatform::READY_TYPE,
            ConditionStatus::False,
            reason::INSTALLATION_FAILED,
            first_error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "Provider operator installation failed".to_string()),
        ),
    };
    set_condition(platform.conditions_mut(), condition);

    if let Err(e) = write_status(ctx.gateway.as_ref(), &platform).await {
        if e.is_conflict() {
            debug!("platform modified, retry syncing status");
            return match first_error {
                Some(err) => Err(err),
                None => Ok(Action::requeue(ctx.config.requeue.conflict)),
            };
        }
        error!(error = %e, "failed to update status");
        return Err(first_error.unwrap_or(e));
    }

    match (overall, first_error) {
        (_, Some(err)) => Err(err),
        (InstallStatus::Failed, None) => Err(Error::installation(
            platform.name_any(),
            "provider operator installation failed",
        )),
        (InstallStatus::InProgress, None) => Ok(Action::requeue(ctx.config.requeue.installation)),
        (InstallStatus::Success, None) => Ok(Action::requeue(Duration::from_secs(
            platform.spec.sync_period_secs(),
        ))),
    }
}

/// Run every installer, recording one status entry per platform.
///
/// Returns the least advanced status and the first error seen.
async fn install_all(
    platform: &mut DBaaSPlatform,
    ctx: &Context,
) -> (InstallStatus, Option<Error>) {
    let mut overall = InstallStatus::Success;
    let mut first_error = None;

    for installer in &ctx.installers {
        let name = installer.platform();
        let (status, last_message) = match installer.install().await {
            Ok(status) => (status, None),
            Err(e) => {
                error!(platform = %name, error = %e, "provider operator installation failed");
                let msg = e.to_string();
                first_error.get_or_insert(e);
                (InstallStatus::Failed, Some(msg))
            }
        };
        debug!(platform = %name, status = %status, "platform installation status");

        ctx.metrics.set_platform_status(&name, status);
        platform
            .status
            .get_or_insert_with(Default::default)
            .set_platform_status(PlatformStatus {
                platform_name: name,
                platform_status: status,
                last_message,
            });
        overall = least_advanced(overall, status);
    }

    (overall, first_error)
}

fn least_advanced(a: InstallStatus, b: InstallStatus) -> InstallStatus {
    match (a, b) {
        (InstallStatus::Failed, _) | (_, InstallStatus::Failed) => InstallStatus::Failed,
        (InstallStatus::InProgress, _) | (_, InstallStatus::InProgress) => {
            InstallStatus::InProgress
        }
        _ => InstallStatus::Success,
    }
}

/// Tear down every provider operator, releasing the finalizer once all are gone
async fn cleanup(platform: &mut DBaaSPlatform, ctx: &Context) -> Result<Action, Error> {
    if !platform.finalizers().iter().any(|f| f == PLATFORM_FINALIZER) {
        return Ok(Action::await_change());
    }
    info!("cleaning up provider operators");

    let mut done = true;
    let mut first_error = None;
    for installer in &ctx.installers {
        let name = installer.platform();
        match installer.cleanup().await {
            Ok(InstallStatus::Success) => {
                info!(platform = %name, "provider operator removed");
            }
            Ok(status) => {
                warn!(platform = %name, status = %status, "provider operator cleanup not finished");
                done = false;
            }
            Err(e) => {
                error!(platform = %name, error = %e, "provider operator cleanup failed");
                first_error.get_or_insert(e);
                done = false;
            }
        }
    }

    if !done {
        set_condition(
            platform.conditions_mut(),
            Condition::new(
                DBaaSPlatform::READY_TYPE,
                ConditionStatus::False,
                reason::INSTALLATION_CLEANUP,
                first_error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "Provider operator cleanup in progress".to_string()),
            ),
        );
        if let Err(e) = write_status(ctx.gateway.as_ref(), platform).await {
            if !e.is_conflict() {
                error!(error = %e, "failed to update status");
                return Err(first_error.unwrap_or(e));
            }
        }
        return match first_error {
            Some(err) => Err(err),
            None => Ok(Action::requeue(ctx.config.requeue.installation)),
        };
    }

    let finalizers = platform
        .finalizers()
        .iter()
        .filter(|f| *f != PLATFORM_FINALIZER)
        .cloned()
        .collect();
    if !set_finalizers(platform, ctx, finalizers).await? {
        return Ok(Action::requeue(ctx.config.requeue.conflict));
    }
    info!("removed cleanup finalizer");
    Ok(Action::await_change())
}

/// Write the finalizer list guarded by the platform's resourceVersion.
///
/// Returns false when the platform changed since it was read.
async fn set_finalizers(
    platform: &DBaaSPlatform,
    ctx: &Context,
    finalizers: Vec<String>,
) -> Result<bool, Error> {
    let result = ctx
        .gateway
        .set_finalizers(
            &ApiResource::erase::<DBaaSPlatform>(&()),
            &platform.namespace().unwrap_or_default(),
            &platform.name_any(),
            platform.resource_version(),
            finalizers,
        )
        .await;
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_conflict() => {
            debug!("platform modified, retry updating finalizers");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
