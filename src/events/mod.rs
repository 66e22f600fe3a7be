//! Progress events emitted while a resolution run advances.
//!
//! Events are non-authoritative observability output: stage name plus
//! contextual fields, never secret material. The default sink forwards them
//! to `tracing`; callers that want the raw stream (e.g. to mirror them as
//! JSON lines) plug in their own [`ProgressSink`].

use serde::Serialize;

/// One progress event. Serializes with a `stage` tag so sinks can emit the
/// events as structured records directly.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StatusEvent {
    /// A resolution run started.
    Start { host: String },
    /// The certificate/token exchange began.
    TokenExchange { host: String },
    /// A bearer session was established.
    Authenticated,
    /// An identity endpoint is being probed.
    IdentityProbe { endpoint: String },
    /// A resolution strategy is being attempted.
    StrategyAttempted { strategy: String },
    /// A registration was selected for account enumeration.
    RegistrationResolved { registration_id: String },
    /// A page of the registration listing is being fetched (sweep only).
    RegistrationPage { page: usize },
    /// A page of one registration's retrievable accounts is being fetched.
    AccountPage { registration_id: String, page: usize },
    /// The requested (system, account) pair was matched.
    Matched { registration_id: String, asset: String, account: String },
    /// The secret-retrieval call is being made.
    SecretRequest { kind: String },
    /// The secret was retrieved.
    SecretRetrieved,
}

impl StatusEvent {
    /// Stage name for this event, matching the serialized `stage` tag.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::TokenExchange { .. } => "token_exchange",
            Self::Authenticated => "authenticated",
            Self::IdentityProbe { .. } => "identity_probe",
            Self::StrategyAttempted { .. } => "strategy_attempted",
            Self::RegistrationResolved { .. } => "registration_resolved",
            Self::RegistrationPage { .. } => "registration_page",
            Self::AccountPage { .. } => "account_page",
            Self::Matched { .. } => "matched",
            Self::SecretRequest { .. } => "secret_request",
            Self::SecretRetrieved => "secret_retrieved",
        }
    }
}

/// Receiver for progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &StatusEvent);
}

/// Default sink: forwards every event to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &StatusEvent) {
        tracing::info!(stage = event.stage(), detail = ?event, "resolver progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_stage_tag() {
        let event = StatusEvent::AccountPage { registration_id: "7".to_string(), page: 3 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "account_page");
        assert_eq!(json["registration_id"], "7");
        assert_eq!(json["page"], 3);
    }

    #[test]
    fn test_stage_names_match_serialized_tag() {
        let events = [
            StatusEvent::Start { host: "h".into() },
            StatusEvent::Authenticated,
            StatusEvent::Matched {
                registration_id: "1".into(),
                asset: "db01".into(),
                account: "svc_app".into(),
            },
            StatusEvent::SecretRetrieved,
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["stage"], event.stage());
        }
    }
}
