//! Provider operator installation
//!
//! Bringing up a provider's operator is an ordered list of idempotent
//! [`InstallStep`]s:
//!
//! 1. Register the catalog source
//! 2. Register the subscription
//! 3. Register the operator group
//! 4. Wait for the operator deployment to report a ready replica
//!
//! [`run_steps`] runs them in order and stops at the first step that does not
//! report `Success`. `InProgress` is expected to be re-entered on a later
//! reconcile; the earlier steps are no-ops once converged.
//!
//! Cleanup runs in reverse and treats already-deleted targets as success.

mod crunchy_bridge;
mod steps;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, info};

use crate::config::OperatorConfig;
use crate::gateway::ResourceGateway;
use crate::Error;

pub use crate::crd::InstallStatus;
pub use crunchy_bridge::{crunchy_bridge_bundle, CRUNCHY_BRIDGE_PLATFORM};
pub use steps::{
    CatalogSourceStep, DeploymentReadyStep, OperatorBundle, OperatorGroupStep, OperatorInstaller,
    SubscriptionStep,
};

/// One idempotent unit of installation work
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InstallStep: Send + Sync {
    /// Step name for logging
    fn name(&self) -> &'static str;

    /// Converge this step once
    ///
    /// An `Err` is a hard failure and halts the sequence.
    async fn execute(&self) -> Result<InstallStatus, Error>;
}

/// Run `steps` in order, stopping at the first non-`Success` result.
///
/// Returns `Success` only when every step succeeded. Later steps are never
/// started after an earlier step reports `InProgress`, `Failed` or an error.
pub async fn run_steps(steps: &[Box<dyn InstallStep>]) -> Result<InstallStatus, Error> {
    for step in steps {
        let status = step.execute().await?;
        debug!(step = step.name(), status = %status, "install step finished");
        if status != InstallStatus::Success {
            return Ok(status);
        }
    }
    Ok(InstallStatus::Success)
}

/// Installs and removes one provider platform
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlatformInstaller: Send + Sync {
    /// Platform name recorded in the DBaaSPlatform status
    fn platform(&self) -> String;

    /// Advance the installation as far as it will go this pass
    async fn install(&self) -> Result<InstallStatus, Error>;

    /// Remove everything `install` created; safe to repeat
    async fn cleanup(&self) -> Result<InstallStatus, Error>;
}

/// Every platform the operator installs
pub fn platform_installers(
    config: &OperatorConfig,
    gateway: Arc<dyn ResourceGateway>,
) -> Vec<Arc<dyn PlatformInstaller>> {
    let installers: Vec<Arc<dyn PlatformInstaller>> = vec![Arc::new(OperatorInstaller::new(
        crunchy_bridge_bundle(config),
        gateway,
    ))];
    info!(count = installers.len(), "registered platform installers");
    installers
}
