//! Crunchy Bridge operator bundle

use super::OperatorBundle;
use crate::config::OperatorConfig;

/// Platform name of the Crunchy Bridge operator
pub const CRUNCHY_BRIDGE_PLATFORM: &str = "crunchy-bridge";

const CATALOG_SOURCE: &str = "crunchy-bridge-catalogsource";
const DISPLAY_NAME: &str = "Crunchy Bridge Operator";
const SUBSCRIPTION: &str = "crunchy-bridge-subscription";
const PACKAGE: &str = "crunchy-bridge-operator";
const CHANNEL: &str = "alpha";
const OPERATOR_GROUP: &str = "global-operators";
const DEPLOYMENT: &str = "crunchy-bridge-operator-controller-manager";

/// Bundle for the Crunchy Bridge operator
pub fn crunchy_bridge_bundle(config: &OperatorConfig) -> OperatorBundle {
    OperatorBundle {
        platform: CRUNCHY_BRIDGE_PLATFORM.to_string(),
        install_namespace: config.install_namespace.clone(),
        catalog_namespace: config.catalog_namespace.clone(),
        catalog_source: CATALOG_SOURCE.to_string(),
        display_name: DISPLAY_NAME.to_string(),
        image: config.crunchy_bridge_catalog_image.clone(),
        subscription: SUBSCRIPTION.to_string(),
        package: PACKAGE.to_string(),
        channel: CHANNEL.to_string(),
        operator_group: OPERATOR_GROUP.to_string(),
        deployment: DEPLOYMENT.to_string(),
    }
}
