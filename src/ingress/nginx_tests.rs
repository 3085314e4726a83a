// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ingress/nginx.rs`

#[cfg(test)]
mod tests {
    use super::super::NginxAdapter;
    use crate::ingress::{AuthDelegation, IngressAdapter, IngressIntent};
    use std::collections::BTreeMap;

    fn intent() -> IngressIntent {
        IngressIntent::new("web", "nginx", "web.example.org")
    }

    #[test]
    fn test_defaults() {
        let mut ingress = intent();
        NginxAdapter.configure_defaults(&mut ingress);
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/proxy-body-size"),
            Some("0")
        );
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/proxy-buffer-size"),
            Some("16k")
        );
    }

    #[test]
    fn test_backend_protocol_is_upper_cased() {
        let mut ingress = intent();
        NginxAdapter.configure_backend_protocol(&mut ingress, "https");
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/backend-protocol"),
            Some("HTTPS")
        );
    }

    #[test]
    fn test_read_timeout_sets_read_and_send() {
        let mut ingress = intent();
        NginxAdapter.configure_read_timeout(&mut ingress, 600);
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/proxy-read-timeout"),
            Some("600")
        );
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/proxy-send-timeout"),
            Some("600")
        );
    }

    #[test]
    fn test_client_certificates() {
        let mut ingress = intent();
        NginxAdapter.configure_tls_client_certificates(&mut ingress, "services", "tls-client-ca-web");
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/auth-tls-verify-client"),
            Some("on")
        );
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/auth-tls-secret"),
            Some("services/tls-client-ca-web")
        );
    }

    #[test]
    fn test_minimal_authentication() {
        let mut ingress = intent();
        NginxAdapter.configure_authentication(
            &mut ingress,
            &AuthDelegation {
                auth_url: "http://auth.example.org/verify".into(),
                ..AuthDelegation::default()
            },
        );
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/auth-url"),
            Some("http://auth.example.org/verify")
        );
        assert_eq!(ingress.annotation("nginx.ingress.kubernetes.io/auth-signin"), None);
        assert_eq!(ingress.annotation("nginx.ingress.kubernetes.io/auth-snippet"), None);
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/configuration-snippet"),
            None
        );
    }

    #[test]
    fn test_full_authentication() {
        let mut ingress = intent();
        NginxAdapter.configure_authentication(
            &mut ingress,
            &AuthDelegation {
                auth_url: "http://auth.example.org/verify".into(),
                signin_url: Some("https://auth.example.org/login".into()),
                next_url_param: Some("next".into()),
                request_headers: BTreeMap::from([
                    ("X-Auth-Group".to_string(), "admins".to_string()),
                    ("X-Original-Host".to_string(), "$host".to_string()),
                ]),
                response_headers: vec!["X-Remote-User".into(), "X-Remote-Group".into()],
                response_cookies: vec!["_oauth2_proxy_1".into(), "_oauth2_proxy_2".into()],
            },
        );

        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/auth-signin"),
            Some("https://auth.example.org/login")
        );
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/auth-signin-redirect-param"),
            Some("next")
        );
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/auth-snippet"),
            Some("proxy_set_header X-Auth-Group \"admins\";\nproxy_set_header X-Original-Host \"$host\";\n")
        );
        assert_eq!(
            ingress.annotation("nginx.ingress.kubernetes.io/auth-response-headers"),
            Some("X-Remote-User,X-Remote-Group")
        );

        let snippet = ingress
            .annotation("nginx.ingress.kubernetes.io/configuration-snippet")
            .unwrap();
        assert!(snippet.contains("auth_request_set $auth_cookie__oauth2_proxy_1 $upstream_cookie__oauth2_proxy_1;"));
        assert!(snippet.contains("auth_request_set $auth_cookie__oauth2_proxy_2 $upstream_cookie__oauth2_proxy_2;"));
    }

    #[test]
    fn test_cookies_only_forwarded_when_set() {
        let mut ingress = intent();
        NginxAdapter.configure_authentication(
            &mut ingress,
            &AuthDelegation {
                auth_url: "http://oidc-web.services.svc.cluster.local/_oidc/auth".into(),
                response_cookies: vec![
                    "_oauth2_proxy_1".into(),
                    "_oauth2_proxy_2".into(),
                    "_oauth2_proxy_3".into(),
                ],
                ..AuthDelegation::default()
            },
        );

        let snippet = ingress
            .annotation("nginx.ingress.kubernetes.io/configuration-snippet")
            .unwrap();

        // An unconditional Set-Cookie would clear the session on every request
        assert!(!snippet.contains("add_header Set-Cookie"));
        assert!(snippet.contains("auth_request_set $auth_set_cookie $upstream_http_set_cookie;"));
        for cookie in ["_oauth2_proxy_1", "_oauth2_proxy_2", "_oauth2_proxy_3"] {
            let guarded = format!(
                "if (ngx.var.auth_cookie_{cookie} or \"\") ~= \"\" then table.insert(cookies, \"{cookie}=\""
            );
            assert!(snippet.contains(&guarded), "{cookie} is not guarded:\n{snippet}");
            assert_eq!(snippet.matches(&format!("table.insert(cookies, \"{cookie}=")).count(), 1);
        }
        // Attributes set by the proxy are kept on the forwarded cookies
        assert!(snippet.contains(".. \"; \" .. attributes)"));
        assert!(snippet.contains("if #cookies > 0 then ngx.header[\"Set-Cookie\"] = cookies end"));
    }
}
