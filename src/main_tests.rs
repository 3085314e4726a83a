// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - command line and shutdown handling

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["zenith-sync"]).unwrap();
        assert_eq!(cli.services, PathBuf::from("/etc/zenith/services.yaml"));
        assert!(cli.config.is_none());

        let config = cli.load_config().unwrap();
        assert_eq!(config.reconciliation_retries, 3);
    }

    #[test]
    fn test_cli_metrics_address_override() {
        let cli = Cli::try_parse_from(["zenith-sync", "--metrics-address", "127.0.0.1:9100"]).unwrap();
        assert_eq!(cli.load_config().unwrap().metrics_address, "127.0.0.1:9100");
    }

    #[test]
    fn test_cli_loads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "target_namespace: tenant\nreconciliation_retries: 5\n").unwrap();

        let cli = Cli::try_parse_from([
            "zenith-sync",
            "--config",
            path.to_str().unwrap(),
            "--services",
            "/tmp/services.yaml",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();

        assert_eq!(config.target_namespace, "tenant");
        assert_eq!(config.reconciliation_retries, 5);
        assert_eq!(cli.services, PathBuf::from("/tmp/services.yaml"));
    }

    #[test]
    fn test_cli_missing_config_file() {
        let cli = Cli::try_parse_from(["zenith-sync", "--config", "/nonexistent/config.yaml"]).unwrap();
        assert!(cli.load_config().is_err());
    }

    /// No signal is sent, so the shutdown future must stay pending
    #[tokio::test]
    async fn test_shutdown_signal_pending_without_signal() {
        let result = timeout(StdDuration::from_millis(100), shutdown_signal()).await;
        assert!(result.is_err());
    }
}
