//! Secret retrieval via the A2A service.
//!
//! The final call authenticates with the matched API key (not the session
//! bearer) while still presenting the client certificate. The header shape
//! is configurable because appliance deployments differ on it; the default is
//! `Authorization: A2A <key>`.

use crate::errors::{ResolverError, Result};
use crate::events::StatusEvent;
use crate::resolver::ResolutionContext;
use crate::types::{SecretKind, SecretString};
use reqwest::header::ACCEPT;

/// Fetch the secret of the requested kind for the matched API key.
///
/// The returned value is never logged; failures carry the HTTP status and a
/// truncated body, never the API key.
pub(crate) async fn fetch_secret(
    ctx: &ResolutionContext<'_>,
    api_key: &SecretString,
    kind: SecretKind,
) -> Result<SecretString> {
    ctx.sink.emit(&StatusEvent::SecretRequest { kind: kind.as_str().to_string() });

    let options = &ctx.config.retrieval;
    let header_value = if options.header_scheme.is_empty() {
        api_key.expose_secret().to_string()
    } else {
        format!("{} {}", options.header_scheme, api_key.expose_secret())
    };

    let response = ctx
        .client
        .http()
        .get(ctx.client.a2a_url("Credentials"))
        .header(ACCEPT, "application/json")
        .header(options.header_name.as_str(), header_value)
        .query(&[("type", kind.as_str())])
        .send()
        .await
        .map_err(|e| ResolverError::retrieval(format!("credential request failed: {e}")))?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(ResolverError::retrieval_http(status.as_u16(), &text));
    }

    // The endpoint returns the bare secret, usually as a JSON-encoded string.
    let secret = serde_json::from_str::<String>(&text).unwrap_or(text);

    ctx.sink.emit(&StatusEvent::SecretRetrieved);
    Ok(SecretString::new(secret))
}
