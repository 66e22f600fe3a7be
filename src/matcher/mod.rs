//! Retrievable-account enumeration and matching.
//!
//! Pages are fetched with a zero-based `page` index and a fixed `limit`;
//! enumeration stops as soon as a page is not a non-empty JSON list. The
//! first entry whose normalized (asset, account) names equal the requested
//! pair wins; no further pages or registrations are consulted.

use crate::errors::{ResolverError, Result};
use crate::events::StatusEvent;
use crate::identity::RegistrationScope;
use crate::config::ForbiddenPolicy;
use crate::resolver::ResolutionContext;
use crate::types::{named_field, Registration, SecretString};
use reqwest::StatusCode;
use serde_json::Value;

/// Per-identity registration enumeration endpoint, consulted first during
/// the sweep.
const SECONDARY_LISTING: &str = "Me/A2ARegistrations";

/// Primary registration listing endpoint.
const PRIMARY_LISTING: &str = "A2ARegistrations";

/// A matched retrievable account, API key included.
pub(crate) struct MatchedAccount {
    pub registration: Registration,
    pub asset: String,
    pub account: String,
    pub api_key: SecretString,
}

/// Locate the retrievable account matching (system, account) within the
/// resolved scope.
pub(crate) async fn find_account(
    ctx: &ResolutionContext<'_>,
    scope: &RegistrationScope,
    system: &str,
    account: &str,
) -> Result<MatchedAccount> {
    match scope {
        RegistrationScope::Single(registration) => {
            enumerate_registration(ctx, registration, system, account)
                .await?
                .ok_or_else(|| ResolverError::not_found_account(system, account))
        }
        RegistrationScope::Sweep => sweep_registrations(ctx, system, account).await,
    }
}

/// Walk one registration's retrievable accounts page by page. Returns
/// `Ok(None)` when every page is exhausted without a match.
async fn enumerate_registration(
    ctx: &ResolutionContext<'_>,
    registration: &Registration,
    system: &str,
    account: &str,
) -> Result<Option<MatchedAccount>> {
    let path = format!("A2ARegistrations/{}/RetrievableAccounts", registration.id);
    let limit = ctx.config.page_size.to_string();
    let mut page = 0usize;

    loop {
        ctx.sink.emit(&StatusEvent::AccountPage {
            registration_id: registration.id.clone(),
            page,
        });

        let query = [("page", page.to_string()), ("limit", limit.clone())];
        let response = ctx.client.get_core(&path, &query).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolverError::auth_http(&path, status.as_u16(), &body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolverError::transport_http(&path, status.as_u16(), &body));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ResolverError::transport(&path, format!("non-JSON page: {e}")))?;

        // Pagination invariant: anything but a non-empty list ends the walk.
        let Some(entries) = value.as_array().filter(|entries| !entries.is_empty()) else {
            return Ok(None);
        };

        for entry in entries {
            if let Some(matched) = match_entry(ctx, registration, entry, system, account)? {
                return Ok(Some(matched));
            }
        }

        page += 1;
    }
}

/// Compare one payload entry against the requested pair under the configured
/// match policy.
fn match_entry(
    ctx: &ResolutionContext<'_>,
    registration: &Registration,
    entry: &Value,
    system: &str,
    account: &str,
) -> Result<Option<MatchedAccount>> {
    let Some(asset_name) = named_field(entry, "AssetName", "Asset") else {
        return Ok(None);
    };
    let Some(account_name) = named_field(entry, "AccountName", "Account") else {
        return Ok(None);
    };

    let policy = ctx.config.match_policy;
    if !policy.matches(&asset_name, system) || !policy.matches(&account_name, account) {
        return Ok(None);
    }

    // A match with no API key is a server-side inconsistency, not a miss.
    let api_key = entry
        .get("ApiKey")
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ResolverError::data_integrity(format!(
                "matched account '{account_name}' on '{asset_name}' has no ApiKey (registration {})",
                registration.id
            ))
        })?;

    ctx.sink.emit(&StatusEvent::Matched {
        registration_id: registration.id.clone(),
        asset: asset_name.clone(),
        account: account_name.clone(),
    });

    Ok(Some(MatchedAccount {
        registration: registration.clone(),
        asset: asset_name,
        account: account_name,
        api_key: SecretString::new(api_key),
    }))
}

/// Walk every registration visible to the session, enumerating each one's
/// accounts until the first match.
async fn sweep_registrations(
    ctx: &ResolutionContext<'_>,
    system: &str,
    account: &str,
) -> Result<MatchedAccount> {
    let limit = ctx.config.page_size.to_string();
    let mut endpoint = SECONDARY_LISTING;
    let mut page = 0usize;

    loop {
        ctx.sink.emit(&StatusEvent::RegistrationPage { page });

        let query = [("page", page.to_string()), ("limit", limit.clone())];
        let value = match fetch_listing(ctx, endpoint, &query).await {
            Ok(value) => value,
            Err(err) if page == 0 && endpoint == SECONDARY_LISTING => {
                tracing::debug!(error = %err, "per-identity registration listing unavailable, falling back to primary");
                endpoint = PRIMARY_LISTING;
                fetch_listing(ctx, endpoint, &query).await?
            }
            Err(err) => return Err(err),
        };

        let Some(entries) = value.as_array().filter(|entries| !entries.is_empty()) else {
            break;
        };

        for entry in entries {
            let Some(registration) = Registration::from_value(entry) else {
                continue;
            };
            match enumerate_registration(ctx, &registration, system, account).await {
                Ok(Some(matched)) => return Ok(matched),
                Ok(None) => {}
                Err(err @ ResolverError::Auth { .. })
                    if ctx.config.forbidden == ForbiddenPolicy::SkipRegistration =>
                {
                    tracing::warn!(
                        registration_id = %registration.id,
                        error = %err,
                        "skipping forbidden registration"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        page += 1;
    }

    Err(ResolverError::not_found_account(system, account))
}

async fn fetch_listing(
    ctx: &ResolutionContext<'_>,
    endpoint: &str,
    query: &[(&str, String)],
) -> Result<Value> {
    let response = ctx.client.get_core(endpoint, query).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ResolverError::transport_http(endpoint, status.as_u16(), &body));
    }
    response
        .json()
        .await
        .map_err(|e| ResolverError::transport(endpoint, format!("non-JSON listing: {e}")))
}
