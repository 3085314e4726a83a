// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `model.rs`

#[cfg(test)]
mod tests {
    use super::super::{Endpoint, ReconciliationEvent, ServiceConfig, ServiceRegistration};
    use serde_json::json;

    #[test]
    fn test_get_str_stringifies_scalars() {
        let config = ServiceConfig::default()
            .with("read-timeout", 30)
            .with("skip-auth", true)
            .with("auth-type", "oidc");
        assert_eq!(config.get_str("read-timeout").as_deref(), Some("30"));
        assert_eq!(config.get_str("skip-auth").as_deref(), Some("true"));
        assert_eq!(config.get_str("auth-type").as_deref(), Some("oidc"));
        assert_eq!(config.get_str("missing"), None);
    }

    #[test]
    fn test_get_bool_variants() {
        let config = ServiceConfig::default()
            .with("a", true)
            .with("b", "yes")
            .with("c", "False")
            .with("d", 0)
            .with("e", json!(null));
        assert!(config.get_bool("a", false));
        assert!(config.get_bool("b", false));
        assert!(!config.get_bool("c", true));
        assert!(!config.get_bool("d", true));
        assert!(config.get_bool("e", true));
        assert!(!config.get_bool("missing", false));
    }

    #[test]
    fn test_get_map() {
        let config = ServiceConfig::default()
            .with("auth-external-params", json!({"group": "admins", "level": 3}))
            .with("scalar", "x");
        let params = config.get_map("auth-external-params");
        assert_eq!(params.get("group").map(String::as_str), Some("admins"));
        assert_eq!(params.get("level").map(String::as_str), Some("3"));
        assert!(config.get_map("scalar").is_empty());
        assert!(config.get_map("missing").is_empty());
    }

    #[test]
    fn test_registration_deserializes_without_config() {
        let service: ServiceRegistration = serde_json::from_value(json!({
            "name": "web",
            "endpoints": [{"address": "10.0.0.1", "port": 31000}]
        }))
        .unwrap();
        assert_eq!(service.config, ServiceConfig::default());
        assert_eq!(service.endpoint_summary(), "10.0.0.1:31000");
    }

    #[test]
    fn test_endpoint_summary_lists_all() {
        let service = ServiceRegistration {
            name: "web".into(),
            endpoints: vec![
                Endpoint {
                    address: "10.0.0.1".into(),
                    port: 1,
                },
                Endpoint {
                    address: "10.0.0.2".into(),
                    port: 2,
                },
            ],
            config: ServiceConfig::default(),
        };
        assert_eq!(service.endpoint_summary(), "10.0.0.1:1, 10.0.0.2:2");
    }

    #[test]
    fn test_event_service_name() {
        let event = ReconciliationEvent::Deleted { name: "gone".into() };
        assert_eq!(event.service_name(), "gone");
    }
}
