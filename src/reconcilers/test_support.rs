// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for reconciler tests.

use std::sync::Arc;

use crate::cluster::memory::MemoryCluster;
use crate::config::SyncConfig;
use crate::context::Context;
use crate::helm::recording::RecordingDeployer;
use crate::ingress::NginxAdapter;
use crate::model::{Endpoint, ServiceConfig, ServiceRegistration};

pub(crate) const NAMESPACE: &str = "services";
pub(crate) const BASE_DOMAIN: &str = "apps.example.org";

pub(crate) type TestContext = Context<MemoryCluster, RecordingDeployer>;

/// Configuration with test namespaces and domain, everything else default.
pub(crate) fn test_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.target_namespace = NAMESPACE.to_string();
    config.self_namespace = "zenith".to_string();
    config.ingress.base_domain = BASE_DOMAIN.to_string();
    config
}

/// Context over a fresh in-memory cluster and recording deployer.
pub(crate) fn context(config: SyncConfig) -> TestContext {
    Context::new(
        MemoryCluster::default(),
        RecordingDeployer::default(),
        Arc::new(config),
        Arc::new(NginxAdapter),
    )
}

/// Registration with a single endpoint.
pub(crate) fn registration(name: &str, config: ServiceConfig) -> ServiceRegistration {
    ServiceRegistration {
        name: name.to_string(),
        endpoints: vec![Endpoint {
            address: "10.0.0.1".to_string(),
            port: 31000,
        }],
        config,
    }
}
