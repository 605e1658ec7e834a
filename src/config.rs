//! Operator configuration
//!
//! Configuration comes from the process environment. Reading goes through
//! the [`EnvSource`] trait so tests never touch global state.

use std::time::Duration;

use crate::Error;

/// Environment variable naming the namespace provider operators install into
pub const INSTALL_NAMESPACE_ENV: &str = "INSTALL_NAMESPACE";
/// Environment variable naming the namespace catalog sources live in
pub const CATALOG_NAMESPACE_ENV: &str = "CATALOG_NAMESPACE";
/// Environment variable overriding the Crunchy Bridge catalog image
pub const CRUNCHY_BRIDGE_CATALOG_IMG_ENV: &str = "CRUNCHY_BRIDGE_CATALOG_IMG";

/// Default catalog source namespace on OpenShift
pub const DEFAULT_CATALOG_NAMESPACE: &str = "openshift-marketplace";
/// Default Crunchy Bridge catalog index image
pub const DEFAULT_CRUNCHY_BRIDGE_CATALOG_IMG: &str =
    "registry.developers.crunchydata.com/crunchydata/crunchy-bridge-operator-catalog:v0.0.1";

/// Trait for reading environment variables
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// Value of `key`, or `None` when unset
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment
#[derive(Clone, Default)]
pub struct OsEnv;

impl EnvSource for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Requeue intervals used by the controllers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequeueConfig {
    /// After a version conflict
    pub conflict: Duration,
    /// After a retryable error
    pub error: Duration,
    /// While a platform installation is in progress
    pub installation: Duration,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            conflict: Duration::from_secs(1),
            error: Duration::from_secs(5),
            installation: Duration::from_secs(30),
        }
    }
}

/// Runtime configuration for the operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace provider operators are installed into
    pub install_namespace: String,
    /// Namespace catalog sources are registered in
    pub catalog_namespace: String,
    /// Catalog index image for the Crunchy Bridge operator
    pub crunchy_bridge_catalog_image: String,
    /// Requeue intervals
    pub requeue: RequeueConfig,
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, Error> {
        Self::from_source(&OsEnv)
    }

    /// Load configuration from `env`
    ///
    /// `INSTALL_NAMESPACE` is required; everything else has a default.
    pub fn from_source(env: &dyn EnvSource) -> Result<Self, Error> {
        let install_namespace = env
            .var(INSTALL_NAMESPACE_ENV)
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| {
                Error::configuration(format!("{} must be set", INSTALL_NAMESPACE_ENV))
            })?;

        Ok(Self {
            install_namespace,
            catalog_namespace: env
                .var(CATALOG_NAMESPACE_ENV)
                .unwrap_or_else(|| DEFAULT_CATALOG_NAMESPACE.to_string()),
            crunchy_bridge_catalog_image: env
                .var(CRUNCHY_BRIDGE_CATALOG_IMG_ENV)
                .unwrap_or_else(|| DEFAULT_CRUNCHY_BRIDGE_CATALOG_IMG.to_string()),
            requeue: RequeueConfig::default(),
        })
    }

    /// Configuration for unit tests
    #[cfg(test)]
    pub(crate) fn for_testing() -> Self {
        Self {
            install_namespace: "openshift-dbaas-operator".to_string(),
            catalog_namespace: DEFAULT_CATALOG_NAMESPACE.to_string(),
            crunchy_bridge_catalog_image: DEFAULT_CRUNCHY_BRIDGE_CATALOG_IMG.to_string(),
            requeue: RequeueConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(vars: &'static [(&'static str, &'static str)]) -> MockEnvSource {
        let mut mock = MockEnvSource::new();
        mock.expect_var().returning(move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        });
        mock
    }

    #[test]
    fn test_missing_install_namespace_is_fatal() {
        let err = OperatorConfig::from_source(&env_with(&[])).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("INSTALL_NAMESPACE"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_install_namespace_is_fatal() {
        let env = env_with(&[(INSTALL_NAMESPACE_ENV, "")]);
        assert!(OperatorConfig::from_source(&env).is_err());
    }

    #[test]
    fn test_defaults_apply() {
        let env = env_with(&[(INSTALL_NAMESPACE_ENV, "dbaas")]);
        let config = OperatorConfig::from_source(&env).unwrap();
        assert_eq!(config.install_namespace, "dbaas");
        assert_eq!(config.catalog_namespace, DEFAULT_CATALOG_NAMESPACE);
        assert_eq!(
            config.crunchy_bridge_catalog_image,
            DEFAULT_CRUNCHY_BRIDGE_CATALOG_IMG
        );
        assert_eq!(config.requeue.conflict, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides_apply() {
        let env = env_with(&[
            (INSTALL_NAMESPACE_ENV, "dbaas"),
            (CATALOG_NAMESPACE_ENV, "olm"),
            (CRUNCHY_BRIDGE_CATALOG_IMG_ENV, "example.com/catalog:v2"),
        ]);
        let config = OperatorConfig::from_source(&env).unwrap();
        assert_eq!(config.catalog_namespace, "olm");
        assert_eq!(config.crunchy_bridge_catalog_image, "example.com/catalog:v2");
    }
}
