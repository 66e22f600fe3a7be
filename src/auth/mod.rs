//! Certificate-based session establishment.
//!
//! The appliance does not accept the client certificate as a session by
//! itself; it is exchanged for a bearer in two steps, both over mutual TLS:
//!
//! 1. `POST /RSTS/oauth2/token` with the certificate-provider scope yields an
//!    STS access token.
//! 2. `POST /service/core/{version}/Token/LoginResponse` exchanges that token
//!    for the `UserToken` bearer used by every subsequent core call.
//!
//! Any non-2xx response or malformed payload fails with `AuthError` carrying
//! the HTTP status and a truncated body preview.

use crate::client::ApplianceClient;
use crate::errors::{truncate_body, ResolverError, Result};
use crate::events::{ProgressSink, StatusEvent};
use crate::types::SecretString;
use reqwest::header::ACCEPT;
use serde_json::Value;

/// OAuth scope selecting the appliance's certificate identity provider.
const CERTIFICATE_SCOPE: &str = "rsts:sts:primaryproviderid:certificate";

/// Exchange the client certificate for a bearer session token.
pub(crate) async fn establish_session(
    client: &ApplianceClient,
    sink: &dyn ProgressSink,
    host: &str,
) -> Result<SecretString> {
    sink.emit(&StatusEvent::TokenExchange { host: host.to_string() });
    let sts_token = request_sts_token(client).await?;
    let bearer = exchange_login_response(client, &sts_token).await?;
    sink.emit(&StatusEvent::Authenticated);
    tracing::debug!(host = %host, "bearer session established");
    Ok(bearer)
}

async fn request_sts_token(client: &ApplianceClient) -> Result<SecretString> {
    let body = serde_json::json!({
        "grant_type": "client_credentials",
        "scope": CERTIFICATE_SCOPE,
    });

    let response = client
        .http()
        .post(client.rsts_token_url())
        .header(ACCEPT, "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| ResolverError::auth(format!("token endpoint request failed: {e}")))?;

    let payload = auth_json(response, "RSTS/oauth2/token").await?;
    payload
        .get("access_token")
        .and_then(Value::as_str)
        .map(SecretString::new)
        .ok_or_else(|| ResolverError::auth("token response missing access_token"))
}

async fn exchange_login_response(
    client: &ApplianceClient,
    sts_token: &SecretString,
) -> Result<SecretString> {
    let body = serde_json::json!({ "StsAccessToken": sts_token.expose_secret() });

    let response = client
        .http()
        .post(client.core_url("Token/LoginResponse"))
        .header(ACCEPT, "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| ResolverError::auth(format!("login exchange request failed: {e}")))?;

    let payload = auth_json(response, "Token/LoginResponse").await?;
    payload
        .get("UserToken")
        .and_then(Value::as_str)
        .map(SecretString::new)
        .ok_or_else(|| ResolverError::auth("login response missing UserToken"))
}

/// Read a response body as JSON, mapping non-2xx and non-JSON payloads to
/// `AuthError` with status + truncated body.
async fn auth_json(response: reqwest::Response, context: &str) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(ResolverError::auth_http(context, status.as_u16(), &text));
    }
    serde_json::from_str(&text).map_err(|_| ResolverError::Auth {
        message: format!("{context}: response was not valid JSON"),
        status: Some(status.as_u16()),
        body: Some(truncate_body(&text)),
    })
}
