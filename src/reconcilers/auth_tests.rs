// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `auth.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::SyncConfig;
    use crate::ingress::{IngressAdapter, NginxAdapter};
    use crate::model::ServiceConfig;
    use crate::reconcilers::test_support::{context, registration, test_config, NAMESPACE};
    use serde_json::json;

    const DOMAIN: &str = "web.apps.example.org";
    const NGINX: &str = "nginx.ingress.kubernetes.io/";

    fn intent() -> IngressIntent {
        IngressIntent::new("web", "nginx", DOMAIN)
    }

    fn oidc_service() -> ServiceConfig {
        ServiceConfig::default()
            .with("auth-type", "oidc")
            .with("auth-oidc-issuer", "https://idp.example.org")
            .with("auth-oidc-client-id", "static-client")
            .with("auth-oidc-client-secret", "static-secret")
    }

    fn external_config() -> SyncConfig {
        let mut config = test_config();
        config.ingress.external_auth.url = Some("http://auth.zenith.svc/verify".into());
        config.ingress.external_auth.signin_url = Some("https://portal.example.org/login".into());
        config
            .ingress
            .external_auth
            .request_headers
            .insert("X-Tenant".into(), "acme".into());
        config.ingress.external_auth.response_headers = vec!["X-Remote-User".into()];
        config
    }

    #[test]
    fn test_strategy_selection() {
        let strategy = |config: ServiceConfig| AuthStrategy::for_service(&registration("web", config));

        assert_eq!(strategy(ServiceConfig::default()), AuthStrategy::External);
        assert_eq!(
            strategy(ServiceConfig::default().with("auth-type", "oidc")),
            AuthStrategy::Oidc
        );
        assert_eq!(
            strategy(
                ServiceConfig::default()
                    .with("auth-type", "oidc")
                    .with("skip-auth", true)
            ),
            AuthStrategy::Skip
        );
        assert_eq!(
            strategy(ServiceConfig::default().with("auth-type", "saml")),
            AuthStrategy::Unknown
        );
    }

    #[test]
    fn test_oidc_delegation_targets_proxy() {
        let delegation = oidc_delegation("services", "svc.cluster.local", "web");

        assert_eq!(
            delegation.auth_url,
            "http://oidc-web.services.svc.cluster.local/_oidc/auth"
        );
        assert_eq!(
            delegation.signin_url.as_deref(),
            Some("https://$host/_oidc/start?rd=$escaped_request_uri&$args")
        );
        assert_eq!(
            delegation.response_headers,
            vec!["X-Remote-User", "X-Remote-Group", "X-Access-Token"]
        );
        assert_eq!(
            delegation.response_cookies,
            vec!["_oauth2_proxy_1", "_oauth2_proxy_2", "_oauth2_proxy_3"]
        );
    }

    #[test]
    fn test_external_delegation_prefixes_params() {
        let config = external_config();
        let service = registration(
            "web",
            ServiceConfig::default()
                .with("auth-external-params", json!({"group": "admins", "project": "p1"})),
        );

        let delegation = external_delegation(&config.ingress.external_auth, &service).unwrap();

        assert_eq!(delegation.auth_url, "http://auth.zenith.svc/verify");
        assert_eq!(delegation.next_url_param.as_deref(), Some("next"));
        assert_eq!(delegation.request_headers["X-Tenant"], "acme");
        assert_eq!(delegation.request_headers["X-Auth-group"], "admins");
        assert_eq!(delegation.request_headers["X-Auth-project"], "p1");
        assert!(delegation.response_cookies.is_empty());
    }

    #[test]
    fn test_external_delegation_drops_unsafe_params() {
        let config = external_config();
        let service = registration(
            "web",
            ServiceConfig::default().with(
                "auth-external-params",
                json!({
                    "group": "admins\";\n  proxy_pass http://evil.internal;\n#",
                    "bad name": "value",
                    "brace": "}",
                    "project": "p1",
                }),
            ),
        );

        let delegation = external_delegation(&config.ingress.external_auth, &service).unwrap();
        assert_eq!(delegation.request_headers.len(), 2);
        assert_eq!(delegation.request_headers["X-Tenant"], "acme");
        assert_eq!(delegation.request_headers["X-Auth-project"], "p1");

        let mut ingress = intent();
        NginxAdapter.configure_authentication(&mut ingress, &delegation);
        let snippet = ingress.annotation(&format!("{NGINX}auth-snippet")).unwrap();
        assert!(!snippet.contains("proxy_pass"));
        assert_eq!(snippet.lines().count(), 2);
    }

    #[test]
    fn test_external_delegation_requires_url() {
        let service = registration("web", ServiceConfig::default());
        assert!(external_delegation(&test_config().ingress.external_auth, &service).is_none());
    }

    #[tokio::test]
    async fn test_oidc_provisions_proxy_and_route() {
        let mut config = test_config();
        config.ingress.tls.enabled = true;
        config.ingress.tls.secret_name = Some("wildcard".into());
        config
            .ingress
            .annotations
            .insert("example.org/team".into(), "platform".into());
        let ctx = context(config);
        let service = registration("web", oidc_service());
        let mut ingress = intent();

        apply_auth(&ctx, &service, DOMAIN, &mut ingress).await.unwrap();

        assert!(ctx.deployer.release(NAMESPACE, "oidc-web").is_some());
        assert_eq!(
            ingress.annotation(&format!("{NGINX}auth-url")),
            Some("http://oidc-web.services.svc.cluster.local/_oidc/auth")
        );

        let route = ctx.cluster.get::<Ingress>(NAMESPACE, "oidc-web").unwrap();
        assert_eq!(route.metadata.labels.unwrap(), ctx.labels_for("web"));
        let annotations = route.metadata.annotations.unwrap();
        assert_eq!(annotations["example.org/team"], "platform");
        assert!(!annotations.contains_key(&format!("{NGINX}auth-url")));

        let spec = route.spec.unwrap();
        let tls = spec.tls.unwrap();
        assert_eq!(tls[0].secret_name.as_deref(), Some("wildcard"));
        let rule = &spec.rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some(DOMAIN));
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/_oidc"));
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "oidc-web");
        assert_eq!(backend.port.as_ref().unwrap().name.as_deref(), Some("http"));
    }

    #[tokio::test]
    async fn test_switching_away_from_oidc_tears_down_proxy() {
        let ctx = context(external_config());
        let mut ingress = intent();
        apply_auth(&ctx, &registration("web", oidc_service()), DOMAIN, &mut ingress)
            .await
            .unwrap();
        assert!(ctx.cluster.get::<Ingress>(NAMESPACE, "oidc-web").is_some());

        let mut ingress = intent();
        apply_auth(&ctx, &registration("web", ServiceConfig::default()), DOMAIN, &mut ingress)
            .await
            .unwrap();

        assert!(ctx.cluster.get::<Ingress>(NAMESPACE, "oidc-web").is_none());
        assert!(ctx.deployer.release(NAMESPACE, "oidc-web").is_none());
        assert_eq!(ctx.deployer.uninstalls(), vec!["oidc-web"]);
        assert_eq!(
            ingress.annotation(&format!("{NGINX}auth-url")),
            Some("http://auth.zenith.svc/verify")
        );
    }

    #[tokio::test]
    async fn test_skip_auth_leaves_route_open() {
        let ctx = context(external_config());
        let mut ingress = intent();
        let service = registration("web", ServiceConfig::default().with("skip-auth", true));

        apply_auth(&ctx, &service, DOMAIN, &mut ingress).await.unwrap();

        assert!(ingress.annotation(&format!("{NGINX}auth-url")).is_none());
        assert_eq!(ctx.deployer.uninstalls(), vec!["oidc-web"]);
    }

    #[tokio::test]
    async fn test_external_without_url_is_open() {
        let ctx = context(test_config());
        let mut ingress = intent();

        apply_auth(&ctx, &registration("web", ServiceConfig::default()), DOMAIN, &mut ingress)
            .await
            .unwrap();

        assert!(ingress.annotations().is_empty());
    }
}
