//! HTTP plumbing for the appliance's REST services.
//!
//! One [`ApplianceClient`] is built per resolution run. Certificate identity,
//! TLS policy, and timeout are fixed at construction; the bearer token is
//! attached once authentication completes. The appliance exposes three
//! service roots under one host: the RSTS token service, the core API, and
//! the A2A retrieval service.

use crate::config::{ResolverConfig, TlsPolicy};
use crate::errors::{ResolverError, Result};
use crate::types::SecretString;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};

/// HTTP client bound to one appliance for one resolution run.
pub(crate) struct ApplianceClient {
    http: Client,
    base: String,
    api_version: String,
    bearer: Option<SecretString>,
}

impl ApplianceClient {
    /// Build the per-run HTTP client. Reads the certificate material once;
    /// fails with `ConfigError` before any network activity when the local
    /// inputs are unusable.
    pub(crate) fn connect(config: &ResolverConfig) -> Result<Self> {
        let pem = config.identity.load_pem()?;
        let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
            ResolverError::config(format!("invalid client certificate/key material: {e}"))
        })?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .identity(identity);

        match &config.tls {
            TlsPolicy::SystemRoots => {}
            TlsPolicy::CaBundle(path) => {
                let ca_pem = std::fs::read(path).map_err(|e| {
                    ResolverError::config(format!("failed to read CA bundle {}: {e}", path.display()))
                })?;
                let certificate = reqwest::Certificate::from_pem(&ca_pem).map_err(|e| {
                    ResolverError::config(format!("invalid CA bundle {}: {e}", path.display()))
                })?;
                builder = builder.add_root_certificate(certificate);
            }
            TlsPolicy::Disabled => {
                tracing::warn!(host = %config.host, "TLS server-certificate verification disabled by explicit configuration");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let http = builder
            .build()
            .map_err(|e| ResolverError::config(format!("failed to build HTTP client: {e}")))?;

        let base = base_url(&config.host);
        url::Url::parse(&base).map_err(|e| {
            ResolverError::config(format!("invalid host '{}': {e}", config.host))
        })?;

        Ok(Self { http, base, api_version: config.api_version.clone(), bearer: None })
    }

    /// Attach the bearer established by the authentication stage.
    pub(crate) fn set_bearer(&mut self, token: SecretString) {
        self.bearer = Some(token);
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Token endpoint of the RSTS security token service.
    pub(crate) fn rsts_token_url(&self) -> String {
        format!("{}/RSTS/oauth2/token", self.base)
    }

    pub(crate) fn core_url(&self, path: &str) -> String {
        format!("{}/service/core/{}/{path}", self.base, self.api_version)
    }

    pub(crate) fn a2a_url(&self, path: &str) -> String {
        format!("{}/service/a2a/{}/{path}", self.base, self.api_version)
    }

    /// Bearer-authenticated GET against the core service. Transport failures
    /// map to `Transport` with the endpoint path as context.
    pub(crate) async fn get_core(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = self.core_url(path);
        let mut request = self.http.get(&url).header(ACCEPT, "application/json");
        if let Some(bearer) = &self.bearer {
            request = request.bearer_auth(bearer.expose_secret());
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        request
            .send()
            .await
            .map_err(|e| ResolverError::transport(path, e.to_string()))
    }
}

/// Normalize the configured host into a base URL. Hosts are documented
/// scheme-less; an explicit scheme is passed through untouched.
fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_adds_scheme() {
        assert_eq!(base_url("spp.example.com"), "https://spp.example.com");
    }

    #[test]
    fn test_base_url_passes_explicit_scheme_through() {
        assert_eq!(base_url("http://127.0.0.1:9000"), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        assert_eq!(base_url("spp.example.com/"), "https://spp.example.com");
        assert_eq!(base_url(" spp.example.com "), "https://spp.example.com");
    }
}
