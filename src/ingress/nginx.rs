// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Adapter for the community `ingress-nginx` controller.

use std::fmt::Write as _;

use super::adapter::{AuthDelegation, IngressAdapter};
use super::IngressIntent;

/// Controller identifier of `ingress-nginx`
pub const NGINX_CONTROLLER: &str = "k8s.io/ingress-nginx";

const ANNOTATION_PREFIX: &str = "nginx.ingress.kubernetes.io/";

/// Buffer size for response headers; OIDC tokens make them large
const PROXY_BUFFER_SIZE: &str = "16k";

/// Cookie attributes used when the auth response carries none
const DEFAULT_COOKIE_ATTRIBUTES: &str = "Path=/; HttpOnly";

fn key(name: &str) -> String {
    format!("{ANNOTATION_PREFIX}{name}")
}

/// [`IngressAdapter`] for `ingress-nginx`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NginxAdapter;

impl IngressAdapter for NginxAdapter {
    fn controller(&self) -> &'static str {
        NGINX_CONTROLLER
    }

    fn configure_defaults(&self, ingress: &mut IngressIntent) {
        // Uploads of any size are passed through to the backend
        ingress.annotate(&key("proxy-body-size"), "0");
        ingress.annotate(&key("proxy-buffer-size"), PROXY_BUFFER_SIZE);
    }

    fn configure_backend_protocol(&self, ingress: &mut IngressIntent, protocol: &str) {
        ingress.annotate(&key("backend-protocol"), protocol.to_uppercase());
    }

    fn configure_read_timeout(&self, ingress: &mut IngressIntent, seconds: u64) {
        let seconds = seconds.to_string();
        ingress.annotate(&key("proxy-read-timeout"), seconds.clone());
        ingress.annotate(&key("proxy-send-timeout"), seconds);
    }

    fn configure_tls_client_certificates(
        &self,
        ingress: &mut IngressIntent,
        namespace: &str,
        secret_name: &str,
    ) {
        ingress.annotate(&key("auth-tls-verify-client"), "on");
        ingress.annotate(&key("auth-tls-secret"), format!("{namespace}/{secret_name}"));
        ingress.annotate(&key("auth-tls-pass-certificate-to-upstream"), "true");
    }

    fn configure_authentication(&self, ingress: &mut IngressIntent, auth: &AuthDelegation) {
        ingress.annotate(&key("auth-url"), auth.auth_url.clone());
        if let Some(signin_url) = &auth.signin_url {
            ingress.annotate(&key("auth-signin"), signin_url.clone());
            if let Some(param) = &auth.next_url_param {
                ingress.annotate(&key("auth-signin-redirect-param"), param.clone());
            }
        }
        if !auth.request_headers.is_empty() {
            let snippet = auth
                .request_headers
                .iter()
                .fold(String::new(), |mut acc, (name, value)| {
                    let _ = writeln!(acc, "proxy_set_header {name} \"{value}\";");
                    acc
                });
            ingress.annotate(&key("auth-snippet"), snippet);
        }
        if !auth.response_headers.is_empty() {
            ingress.annotate(&key("auth-response-headers"), auth.response_headers.join(","));
        }
        if !auth.response_cookies.is_empty() {
            ingress.annotate(
                &key("configuration-snippet"),
                forward_cookies_snippet(&auth.response_cookies),
            );
        }
    }
}

/// Snippet copying the named cookies from the auth response to the client.
///
/// ingress-nginx only forwards one `Set-Cookie` from the auth response, so each
/// cookie value is captured into its own variable. A cookie is only sent when the
/// auth response set it, since an empty `Set-Cookie` would clear the client's
/// session. Attributes are taken from the auth response's first `Set-Cookie`.
fn forward_cookies_snippet(cookies: &[String]) -> String {
    let mut snippet = String::from("auth_request_set $auth_set_cookie $upstream_http_set_cookie;\n");
    for cookie in cookies {
        let _ = writeln!(
            snippet,
            "auth_request_set $auth_cookie_{cookie} $upstream_cookie_{cookie};"
        );
    }
    let names = cookies
        .iter()
        .map(|cookie| format!("\"{cookie}\""))
        .collect::<Vec<_>>()
        .join(", ");
    snippet.push_str("access_by_lua_block {\n");
    snippet.push_str("  local first = ngx.var.auth_set_cookie or \"\"\n");
    let _ = writeln!(snippet, "  for _, name in ipairs({{{names}}}) do");
    snippet.push_str("    local at = first:find(\"[;,]%s*\" .. name:gsub(\"%p\", \"%%%0\") .. \"=\")\n");
    snippet.push_str("    if at then first = first:sub(1, at - 1) end\n");
    snippet.push_str("  end\n");
    let _ = writeln!(
        snippet,
        "  local attributes = first:match(\"^[^;]*;%s*(.-)%s*$\") or \"{DEFAULT_COOKIE_ATTRIBUTES}\""
    );
    snippet.push_str("  local cookies = {}\n");
    for cookie in cookies {
        let _ = writeln!(
            snippet,
            "  if (ngx.var.auth_cookie_{cookie} or \"\") ~= \"\" then table.insert(cookies, \"{cookie}=\" .. ngx.var.auth_cookie_{cookie} .. \"; \" .. attributes) end"
        );
    }
    snippet.push_str("  if #cookies > 0 then ngx.header[\"Set-Cookie\"] = cookies end\n");
    snippet.push_str("}\n");
    snippet
}

#[cfg(test)]
#[path = "nginx_tests.rs"]
mod nginx_tests;
