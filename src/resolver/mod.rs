//! End-to-end orchestration of one credential resolution run.
//!
//! Control flows strictly forward through four stages (authenticate,
//! resolve a registration scope, match the account, retrieve the secret)
//! with no automatic retries. Every run builds a fresh connection and
//! session; nothing persists between runs, and exactly one final record
//! (a [`Resolution`] or an error) is produced per invocation.

use crate::auth;
use crate::client::ApplianceClient;
use crate::config::ResolverConfig;
use crate::errors::Result;
use crate::events::{ProgressSink, StatusEvent, TracingSink};
use crate::identity;
use crate::matcher;
use crate::retrieval;
use crate::types::{SecretKind, SecretString};
use serde::Serialize;
use std::sync::Arc;

/// Shared per-run context handed to the resolution stages.
pub(crate) struct ResolutionContext<'a> {
    pub client: &'a ApplianceClient,
    pub config: &'a ResolverConfig,
    pub sink: &'a dyn ProgressSink,
}

/// What the caller wants for a matched account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieve {
    /// Stop once the API key is located.
    KeyOnly,
    /// Also exchange the API key for a secret of the given kind.
    Secret(SecretKind),
}

impl Default for Retrieve {
    fn default() -> Self {
        Self::Secret(SecretKind::Password)
    }
}

/// One credential lookup request.
#[derive(Debug, Clone)]
pub struct AccountRequest {
    /// Requested system/asset name.
    pub system: String,
    /// Requested account name.
    pub account: String,
    /// What to retrieve once matched. Defaults to the account password.
    pub retrieve: Retrieve,
}

impl AccountRequest {
    pub fn new(system: impl Into<String>, account: impl Into<String>) -> Self {
        Self { system: system.into(), account: account.into(), retrieve: Retrieve::default() }
    }

    /// Stop after locating the API key; skip the secret fetch.
    pub fn key_only(mut self) -> Self {
        self.retrieve = Retrieve::KeyOnly;
        self
    }

    /// Retrieve a secret of the given kind instead of the default password.
    pub fn secret_kind(mut self, kind: SecretKind) -> Self {
        self.retrieve = Retrieve::Secret(kind);
        self
    }
}

/// The single success record of a resolution run.
///
/// The API key and secret are [`SecretString`]s: accessible to the caller via
/// `expose_secret()`, redacted in Debug and serialization.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Registration the match was found under.
    pub registration_id: String,
    /// Application name of that registration, when the listing carried one.
    pub app_name: Option<String>,
    /// Matched asset name as returned by the appliance.
    pub asset: String,
    /// Matched account name as returned by the appliance.
    pub account: String,
    /// API key authorized to fetch this account's secret.
    pub api_key: SecretString,
    /// The retrieved secret, when one was requested.
    pub secret: Option<SecretString>,
}

/// Resolves credentials from a privileged-access-management appliance.
///
/// # Example
///
/// ```rust,ignore
/// use credgate::{AccountRequest, ClientIdentity, CredentialResolver, ResolverConfig};
///
/// let config = ResolverConfig::new(
///     "spp.example.com",
///     ClientIdentity::Split {
///         cert: "/etc/credgate/client.crt".into(),
///         key: "/etc/credgate/client.key".into(),
///     },
/// );
/// let resolver = CredentialResolver::new(config)?;
/// let resolution = resolver.resolve(&AccountRequest::new("db01", "svc_app")).await?;
/// let password = resolution.secret.unwrap();
/// ```
pub struct CredentialResolver {
    config: ResolverConfig,
    sink: Arc<dyn ProgressSink>,
}

impl CredentialResolver {
    /// Create a resolver, validating the configuration eagerly. No network
    /// activity happens here.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, sink: Arc::new(TracingSink) })
    }

    /// Replace the default tracing-backed progress sink.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Run the full resolution flow for one request.
    ///
    /// Builds a fresh connection, authenticates, resolves the registration
    /// scope, matches the account, and (unless the request is key-only)
    /// retrieves the secret. The bearer and connection are dropped when this
    /// call returns.
    pub async fn resolve(&self, request: &AccountRequest) -> Result<Resolution> {
        self.sink.emit(&StatusEvent::Start { host: self.config.host.clone() });

        let mut client = ApplianceClient::connect(&self.config)?;
        let bearer = auth::establish_session(&client, self.sink.as_ref(), &self.config.host).await?;
        client.set_bearer(bearer);

        let ctx = ResolutionContext {
            client: &client,
            config: &self.config,
            sink: self.sink.as_ref(),
        };

        let scope = identity::resolve_scope(&ctx).await?;
        let matched = matcher::find_account(&ctx, &scope, &request.system, &request.account).await?;

        let secret = match request.retrieve {
            Retrieve::KeyOnly => None,
            Retrieve::Secret(kind) => {
                Some(retrieval::fetch_secret(&ctx, &matched.api_key, kind).await?)
            }
        };

        tracing::info!(
            registration_id = %matched.registration.id,
            asset = %matched.asset,
            account = %matched.account,
            "credential resolved"
        );

        Ok(Resolution {
            registration_id: matched.registration.id,
            app_name: matched.registration.app_name,
            asset: matched.asset,
            account: matched.account,
            api_key: matched.api_key,
            secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = AccountRequest::new("db01", "svc_app");
        assert_eq!(request.retrieve, Retrieve::Secret(SecretKind::Password));

        let request = AccountRequest::new("db01", "svc_app").key_only();
        assert_eq!(request.retrieve, Retrieve::KeyOnly);

        let request = AccountRequest::new("db01", "svc_app").secret_kind(SecretKind::PrivateKey);
        assert_eq!(request.retrieve, Retrieve::Secret(SecretKind::PrivateKey));
    }

    #[test]
    fn test_resolution_serialization_redacts_secrets() {
        let resolution = Resolution {
            registration_id: "7".to_string(),
            app_name: Some("payments".to_string()),
            asset: "db01".to_string(),
            account: "svc_app".to_string(),
            api_key: SecretString::new("very-secret-key"),
            secret: Some(SecretString::new("hunter2")),
        };

        let json = serde_json::to_string(&resolution).unwrap();
        assert!(json.contains("db01"));
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("very-secret-key"));
        assert!(!json.contains("hunter2"));

        let debug = format!("{:?}", resolution);
        assert!(!debug.contains("very-secret-key"));
        assert!(!debug.contains("hunter2"));
    }
}
