//! Registration resolution.
//!
//! Which registration may the authenticated session query? The appliance
//! offers several answers and authorizes them inconsistently across
//! deployments, so resolution is a fixed, ordered chain of strategies behind
//! one trait; first success wins:
//!
//! 1. Explicit override (registration id or listing index).
//! 2. Identity-derived: probe the who-am-I endpoints, extract a candidate id
//!    from an ordered field list, then direct-fetch or filter-query.
//! 3. Multi-registration sweep (explicit opt-in): defer scoping to the
//!    account matcher, which walks every visible registration.
//!
//! The ordering is an invariant. Server-side authorization may silently
//! return empty or forbidden for some strategies while permitting others, so
//! a later strategy must never run before an earlier one has been exhausted.

use crate::errors::{ResolverError, Result};
use crate::events::StatusEvent;
use crate::resolver::ResolutionContext;
use crate::types::{scalar_id, Registration};
use crate::config::RegistrationOverride;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

/// Identity endpoints probed in order; 404 and 401/403 mean "try the next".
const WHOAMI_ENDPOINTS: [&str; 3] = ["Token/WhoAmI", "Me", "Users/Me"];

/// Filter relations tried in order against the registration listing.
const FILTER_RELATIONS: [&str; 3] = ["Owner", "RegisteredBy", "Application"];

/// Scope handed to the account matcher.
#[derive(Debug, Clone)]
pub(crate) enum RegistrationScope {
    /// Enumerate one registration.
    Single(Registration),
    /// Walk every registration visible to the session.
    Sweep,
}

/// One resolution strategy: attempt to produce a scope, or report "nothing
/// here, try the next one" with `Ok(None)`. Errors are terminal.
#[async_trait]
trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn attempt(&self, ctx: &ResolutionContext<'_>) -> Result<Option<RegistrationScope>>;
}

/// Run the strategy chain in order. Fails with `ResolutionError` naming the
/// attempted strategies when none produces a scope.
pub(crate) async fn resolve_scope(ctx: &ResolutionContext<'_>) -> Result<RegistrationScope> {
    let mut chain: Vec<Box<dyn ResolutionStrategy>> =
        vec![Box::new(ExplicitOverride), Box::new(IdentityDerived)];
    if ctx.config.multi_registration_sweep {
        chain.push(Box::new(SweepAll));
    }

    let mut attempted = Vec::new();
    for strategy in chain {
        ctx.sink.emit(&StatusEvent::StrategyAttempted { strategy: strategy.name().to_string() });
        if let Some(scope) = strategy.attempt(ctx).await? {
            if let RegistrationScope::Single(registration) = &scope {
                ctx.sink.emit(&StatusEvent::RegistrationResolved {
                    registration_id: registration.id.clone(),
                });
            }
            return Ok(scope);
        }
        attempted.push(strategy.name().to_string());
    }

    Err(ResolverError::Resolution { attempted })
}

/// Strategy 1: the caller named a registration. Nothing else is consulted;
/// an override that does not resolve is terminal.
struct ExplicitOverride;

#[async_trait]
impl ResolutionStrategy for ExplicitOverride {
    fn name(&self) -> &'static str {
        "explicit-override"
    }

    async fn attempt(&self, ctx: &ResolutionContext<'_>) -> Result<Option<RegistrationScope>> {
        match &ctx.config.registration {
            None => Ok(None),
            Some(RegistrationOverride::Id(id)) => fetch_by_id(ctx, id).await.map(Some),
            Some(RegistrationOverride::Index(index)) => {
                select_by_index(ctx, *index).await.map(Some)
            }
        }
    }
}

async fn fetch_by_id(ctx: &ResolutionContext<'_>, id: &str) -> Result<RegistrationScope> {
    let path = format!("A2ARegistrations/{id}");
    let response = ctx.client.get_core(&path, &[]).await?;
    if response.status() != StatusCode::OK {
        return Err(ResolverError::not_found_registration(id));
    }
    let value: Value = response
        .json()
        .await
        .map_err(|e| ResolverError::transport(path, format!("non-JSON registration: {e}")))?;
    let registration = Registration::from_value(&value)
        .unwrap_or_else(|| Registration { id: id.to_string(), app_name: None });
    Ok(RegistrationScope::Single(registration))
}

async fn select_by_index(ctx: &ResolutionContext<'_>, index: usize) -> Result<RegistrationScope> {
    let response = ctx.client.get_core("A2ARegistrations", &[]).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ResolverError::transport_http("A2ARegistrations", status.as_u16(), &body));
    }
    let value: Value = response
        .json()
        .await
        .map_err(|e| ResolverError::transport("A2ARegistrations", format!("non-JSON listing: {e}")))?;
    let entries = value
        .as_array()
        .ok_or_else(|| ResolverError::transport("A2ARegistrations", "listing was not an array"))?;
    let entry = entries
        .get(index)
        .ok_or_else(|| ResolverError::not_found_registration(format!("index {index} (listing has {} entries)", entries.len())))?;
    let registration = Registration::from_value(entry).ok_or_else(|| {
        ResolverError::data_integrity(format!("registration at index {index} has no id"))
    })?;
    Ok(RegistrationScope::Single(registration))
}

/// Strategy 2: derive a candidate id from the session's own identity, then
/// resolve it to a registration by direct fetch or filter query.
struct IdentityDerived;

#[async_trait]
impl ResolutionStrategy for IdentityDerived {
    fn name(&self) -> &'static str {
        "identity-derived"
    }

    async fn attempt(&self, ctx: &ResolutionContext<'_>) -> Result<Option<RegistrationScope>> {
        let identity = match probe_identity(ctx).await? {
            Some(identity) => identity,
            None if ctx.config.multi_registration_sweep => {
                // The caller opted into the sweep; a forbidden identity
                // surface degrades to it instead of failing the run.
                tracing::warn!("identity endpoints exhausted, deferring to registration sweep");
                return Ok(None);
            }
            None => {
                return Err(ResolverError::auth(format!(
                    "no identity endpoint accepted the session (tried {})",
                    WHOAMI_ENDPOINTS.join(", ")
                )))
            }
        };

        let Some(candidate) = candidate_id(&identity) else {
            tracing::debug!("identity payload carried no usable id field");
            return Ok(None);
        };

        // Direct fetch first: the candidate may itself be a registration id.
        let path = format!("A2ARegistrations/{candidate}");
        let response = ctx.client.get_core(&path, &[]).await?;
        if response.status() == StatusCode::OK {
            if let Ok(value) = response.json::<Value>().await {
                if let Some(registration) = Registration::from_value(&value) {
                    return Ok(Some(RegistrationScope::Single(registration)));
                }
            }
        }

        // Filter queries over the listing; first non-empty result wins.
        for relation in FILTER_RELATIONS {
            let filter = format!("{relation}/Id eq {candidate}");
            let response = ctx
                .client
                .get_core("A2ARegistrations", &[("filter", filter), ("limit", "1".to_string())])
                .await?;
            if !response.status().is_success() {
                // Authorization may forbid individual relations; keep going.
                continue;
            }
            let Ok(value) = response.json::<Value>().await else { continue };
            if let Some(registration) =
                value.as_array().and_then(|list| list.first()).and_then(Registration::from_value)
            {
                return Ok(Some(RegistrationScope::Single(registration)));
            }
        }

        Ok(None)
    }
}

/// Probe the who-am-I endpoints in order. `Ok(None)` means every endpoint
/// answered 404/401/403.
async fn probe_identity(ctx: &ResolutionContext<'_>) -> Result<Option<Value>> {
    for endpoint in WHOAMI_ENDPOINTS {
        ctx.sink.emit(&StatusEvent::IdentityProbe { endpoint: endpoint.to_string() });
        let response = ctx.client.get_core(endpoint, &[]).await?;
        match response.status() {
            status if status.is_success() => {
                let value = response.json::<Value>().await.map_err(|e| {
                    ResolverError::transport(endpoint, format!("non-JSON identity payload: {e}"))
                })?;
                return Ok(Some(value));
            }
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => continue,
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(ResolverError::transport_http(endpoint, status.as_u16(), &body));
            }
        }
    }
    Ok(None)
}

/// First non-null candidate from the ordered identity field list: a direct
/// id, the nested application id, then the flat application/owner ids.
fn candidate_id(identity: &Value) -> Option<String> {
    if let Some(id) = identity.get("Id").and_then(scalar_id) {
        return Some(id);
    }
    if let Some(id) = identity.get("UserId").and_then(scalar_id) {
        return Some(id);
    }
    if let Some(id) = identity.get("Application").and_then(|app| app.get("Id")).and_then(scalar_id) {
        return Some(id);
    }
    if let Some(id) = identity.get("ApplicationId").and_then(scalar_id) {
        return Some(id);
    }
    identity.get("AppId").and_then(scalar_id)
}

/// Strategy 3 (opt-in): hand the matcher a sweep scope over every visible
/// registration.
struct SweepAll;

#[async_trait]
impl ResolutionStrategy for SweepAll {
    fn name(&self) -> &'static str {
        "registration-sweep"
    }

    async fn attempt(&self, _ctx: &ResolutionContext<'_>) -> Result<Option<RegistrationScope>> {
        Ok(Some(RegistrationScope::Sweep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_id_ordering() {
        // Direct id wins over everything else
        let identity = json!({"Id": 5, "UserId": 9, "ApplicationId": 12});
        assert_eq!(candidate_id(&identity).as_deref(), Some("5"));

        // UserId before the application fields
        let identity = json!({"UserId": 9, "ApplicationId": 12});
        assert_eq!(candidate_id(&identity).as_deref(), Some("9"));

        // Nested application id before the flat one
        let identity = json!({"Application": {"Id": 3}, "ApplicationId": 12});
        assert_eq!(candidate_id(&identity).as_deref(), Some("3"));

        let identity = json!({"AppId": "app-7"});
        assert_eq!(candidate_id(&identity).as_deref(), Some("app-7"));

        assert!(candidate_id(&json!({"DisplayName": "cert user"})).is_none());
    }

    #[test]
    fn test_candidate_id_skips_nulls() {
        let identity = json!({"Id": null, "UserId": 42});
        assert_eq!(candidate_id(&identity).as_deref(), Some("42"));
    }
}
