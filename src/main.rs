//! DBaaS operator - provider-neutral database intents on Kubernetes

mod controller_runner;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};

use dbaas_operator::config::OperatorConfig;
use dbaas_operator::controller::Context;
use dbaas_operator::crd::all_crds;
use dbaas_operator::gateway::KubeGateway;
use dbaas_operator::metrics::Metrics;
use dbaas_operator::telemetry::{init_telemetry, TelemetryConfig};
use dbaas_operator::FIELD_MANAGER;

use controller_runner::{build_controllers, ProviderKinds};

const SERVICE_NAME: &str = "dbaas-operator";

/// DBaaS operator - one intent API in front of many database providers
#[derive(Parser, Debug)]
#[command(name = "dbaas-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controllers (default mode)
    ///
    /// Watches DBaaSInventory, DBaaSInstance, DBaaSConnection and
    /// DBaaSPlatform resources and reconciles them.
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        for crd in all_crds() {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    init_telemetry(TelemetryConfig::from_env(SERVICE_NAME))?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller().await,
    }
}

/// Run every controller until shutdown
async fn run_controller() -> anyhow::Result<()> {
    let config = OperatorConfig::from_env()?;
    tracing::info!(
        install_namespace = %config.install_namespace,
        catalog_namespace = %config.catalog_namespace,
        "starting DBaaS operator"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let meter = opentelemetry::global::meter(SERVICE_NAME);
    let metrics = Arc::new(Metrics::new(&meter));
    let gateway = Arc::new(KubeGateway::new(client.clone()));
    let ctx = Arc::new(Context::new(gateway, metrics, config));

    let kinds = ProviderKinds::discover(&client)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list DBaaS providers: {}", e))?;

    tracing::info!("Starting controllers:");
    futures::future::join_all(build_controllers(client, ctx, &kinds)).await;

    tracing::info!("DBaaS operator shutting down");
    Ok(())
}

/// Install or update every CRD the operator serves
///
/// Server-side apply keeps the installed schemas in step with the binary.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for crd in all_crds() {
        let name = crd.name_any();
        tracing::info!(crd = %name, "installing CRD");
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("All DBaaS CRDs installed/updated");
    Ok(())
}
