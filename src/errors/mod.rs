//! # Error Handling
//!
//! Typed errors for the credential-resolution flow, one variant per failure
//! kind the appliance workflow can surface. Every error is terminal for the
//! current invocation; the only documented continuations are the ordered
//! registration-resolution fallback and the opt-in multi-registration sweep.
//!
//! Diagnostic bodies are truncated to a fixed preview size and never contain
//! secret material.

use serde::Serialize;
use thiserror::Error;

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Response-body bytes carried in error diagnostics.
const BODY_PREVIEW_BYTES: usize = 512;

/// Errors that can occur while resolving a credential.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Bad or missing local inputs: certificate paths, empty files, invalid
    /// settings. Raised before any network activity.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Authentication or authorization failure at any stage.
    #[error("Authentication failed: {message}")]
    Auth { message: String, status: Option<u16>, body: Option<String> },

    /// No resolution strategy produced a registration to query.
    #[error("Registration resolution failed; strategies attempted: {}", attempted.join(", "))]
    Resolution { attempted: Vec<String> },

    /// A registration or retrievable account could not be located.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The appliance returned an inconsistent record, e.g. a matched account
    /// with no API key.
    #[error("Data integrity error: {message}")]
    DataIntegrity { message: String },

    /// The final secret fetch failed.
    #[error("Secret retrieval failed: {message}")]
    Retrieval { message: String, status: Option<u16>, body: Option<String> },

    /// Network or protocol failure during discovery (outside the
    /// authentication and retrieval stages, which carry their own kinds).
    #[error("Request to {context} failed: {message}")]
    Transport { context: String, message: String, status: Option<u16>, body: Option<String> },
}

impl ResolverError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an authentication error without HTTP context.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into(), status: None, body: None }
    }

    /// Create an authentication error from a non-2xx HTTP response.
    pub fn auth_http(context: &str, status: u16, body: &str) -> Self {
        Self::Auth {
            message: format!("{context}: HTTP {status}"),
            status: Some(status),
            body: Some(truncate_body(body)),
        }
    }

    /// Create a not-found error for a missing (system, account) pair.
    pub fn not_found_account(system: &str, account: &str) -> Self {
        Self::NotFound {
            message: format!("no retrievable account matches system='{system}' account='{account}'"),
        }
    }

    /// Create a not-found error for an override that did not resolve.
    pub fn not_found_registration(reference: impl std::fmt::Display) -> Self {
        Self::NotFound { message: format!("registration '{reference}' did not resolve") }
    }

    /// Create a data-integrity error.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity { message: message.into() }
    }

    /// Create a retrieval error without HTTP context.
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval { message: message.into(), status: None, body: None }
    }

    /// Create a retrieval error from a non-2xx HTTP response.
    pub fn retrieval_http(status: u16, body: &str) -> Self {
        Self::Retrieval {
            message: format!("credentials endpoint: HTTP {status}"),
            status: Some(status),
            body: Some(truncate_body(body)),
        }
    }

    /// Create a transport error for a discovery-stage request.
    pub fn transport(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport { context: context.into(), message: message.into(), status: None, body: None }
    }

    /// Create a transport error from an unexpected HTTP status.
    pub fn transport_http(context: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Transport {
            context: context.into(),
            message: format!("HTTP {status}"),
            status: Some(status),
            body: Some(truncate_body(body)),
        }
    }

    /// The workflow-level kind name for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::Auth { .. } => "AuthError",
            Self::Resolution { .. } => "ResolutionError",
            Self::NotFound { .. } => "NotFoundError",
            Self::DataIntegrity { .. } => "DataIntegrityError",
            Self::Retrieval { .. } => "RetrievalError",
            Self::Transport { .. } => "TransportError",
        }
    }

    /// HTTP status attached to this error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::Retrieval { status, .. }
            | Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    fn body(&self) -> Option<&str> {
        match self {
            Self::Auth { body, .. }
            | Self::Retrieval { body, .. }
            | Self::Transport { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Build the serializable failure record for this error.
    pub fn to_report(&self) -> FailureReport {
        FailureReport {
            error: self.to_string(),
            kind: self.kind(),
            found: false,
            status: self.status(),
            body: self.body().map(str::to_string),
        }
    }
}

/// Serializable failure record: the single structured payload emitted when a
/// resolution run fails. Carries diagnostics only, never the API key or the
/// secret.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Human-readable error message.
    pub error: String,
    /// Workflow-level error kind, e.g. "NotFoundError".
    pub kind: &'static str,
    /// Always `false` on a failure record.
    pub found: bool,
    /// HTTP status, when the failure came from a response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Response-body preview, truncated to 512 bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Truncate a response body to the diagnostic preview size, respecting UTF-8
/// character boundaries.
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= BODY_PREVIEW_BYTES {
        return body.to_string();
    }
    let mut end = BODY_PREVIEW_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = ResolverError::config("missing certificate");
        assert!(matches!(err, ResolverError::Config { .. }));
        assert_eq!(err.kind(), "ConfigError");

        let err = ResolverError::auth_http("RSTS/oauth2/token", 401, "denied");
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("HTTP 401"));

        let err = ResolverError::not_found_account("db01", "svc_app");
        assert_eq!(err.kind(), "NotFoundError");
        assert!(err.to_string().contains("db01"));
        assert!(err.to_string().contains("svc_app"));
    }

    #[test]
    fn test_body_truncated_to_preview_size() {
        let long_body = "x".repeat(2048);
        let err = ResolverError::auth_http("Token/LoginResponse", 500, &long_body);
        let report = err.to_report();
        assert_eq!(report.body.unwrap().len(), 512);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // 3-byte characters straddling the 512-byte cut
        let body = "€".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.len() <= 512);
        assert!(body.starts_with(&truncated));
    }

    #[test]
    fn test_failure_report_shape() {
        let err = ResolverError::retrieval_http(502, "bad gateway");
        let report = err.to_report();
        assert!(!report.found);
        assert_eq!(report.kind, "RetrievalError");
        assert_eq!(report.status, Some(502));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["found"], serde_json::json!(false));
        assert_eq!(json["kind"], "RetrievalError");
    }

    #[test]
    fn test_resolution_error_lists_strategies() {
        let err = ResolverError::Resolution {
            attempted: vec!["explicit-override".into(), "identity-derived".into()],
        };
        let text = err.to_string();
        assert!(text.contains("explicit-override"));
        assert!(text.contains("identity-derived"));
    }
}
