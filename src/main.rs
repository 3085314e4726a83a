// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use zenith_sync::{
    cluster::KubeCluster,
    config::SyncConfig,
    context::Context,
    helm::HelmClient,
    ingress::AdapterRegistry,
    metrics,
    reconcilers::{run, TlsSecretMirror},
    source::FileSource,
};

/// Synchronise tunnelled services into Kubernetes.
#[derive(Debug, Parser)]
#[command(name = "zenith-sync", version, about)]
struct Cli {
    /// YAML configuration file; defaults apply when omitted
    #[arg(long, env = "ZENITH_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// YAML file listing the registered services
    #[arg(long, env = "ZENITH_SYNC_SERVICES", default_value = "/etc/zenith/services.yaml")]
    services: PathBuf,

    /// Override the metrics server address from the configuration
    #[arg(long, env = "ZENITH_SYNC_METRICS_ADDRESS")]
    metrics_address: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::load(path)?,
            None => SyncConfig::default(),
        };
        if let Some(address) = &self.metrics_address {
            config.metrics_address.clone_from(address);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("zenith-sync")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

fn init_tracing() {
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                Ok("SIGINT")
            }
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT")
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();
    info!("Starting Zenith sync controller");

    let config = Arc::new(cli.load_config()?);
    debug!(
        target_namespace = %config.target_namespace,
        base_domain = %config.ingress.base_domain,
        "Configuration loaded"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let ctx = Context::resolve(
        KubeCluster::new(client.clone()),
        HelmClient::new(config.helm_client.clone()),
        Arc::clone(&config),
        &AdapterRegistry::builtin(),
    )
    .await?;
    let mirror = TlsSecretMirror::new(KubeCluster::new(client), Arc::clone(&config));
    let source = FileSource::new(&cli.services);

    info!("Watching registrations in {}", cli.services.display());

    // The loops never exit under normal operation; if one does, the process exits
    tokio::select! {
        result = run(&ctx, &source) => {
            error!("CRITICAL: Service reconciler exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Service reconciler exited unexpectedly without error")
        }
        result = mirror.run() => {
            error!("CRITICAL: TLS secret mirror exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("TLS secret mirror exited unexpectedly without error")
        }
        result = metrics::serve(&config.metrics_address) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        signal = shutdown_signal() => {
            info!("Received {}, shutting down", signal?);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
