//! Shared mock-appliance helpers for the resolver integration tests.
//!
//! Stands up a wiremock server that speaks the appliance's REST dialect:
//! the RSTS token endpoint, the core login exchange, registration listings,
//! retrievable-accounts pages, and the A2A credentials endpoint. The client
//! certificate is an ephemeral self-signed pair generated per test.

use std::io::Write;

use credgate::{ClientIdentity, ResolverConfig};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STS_TOKEN: &str = "sts-token-abc";
pub const USER_TOKEN: &str = "user-token-xyz";

/// A mock appliance plus the certificate material a resolver needs to talk
/// to it.
pub struct MockAppliance {
    pub server: MockServer,
    _combined_pem: NamedTempFile,
    pub config: ResolverConfig,
}

impl MockAppliance {
    /// Start the server and mount the standard auth endpoints.
    pub async fn start() -> Self {
        let appliance = Self::start_without_auth().await;
        mount_auth(&appliance.server).await;
        appliance
    }

    /// Start the server with no auth endpoints mounted; the test supplies
    /// its own token-exchange responses.
    pub async fn start_without_auth() -> Self {
        init_tracing();
        let server = MockServer::start().await;

        let mut pem_file = NamedTempFile::new().unwrap();
        let generated = rcgen::generate_simple_self_signed(vec!["credgate-test".to_string()])
            .expect("generate test certificate");
        let pem = format!("{}{}", generated.cert.pem(), generated.key_pair.serialize_pem());
        write!(pem_file, "{pem}").unwrap();
        pem_file.flush().unwrap();

        let config = ResolverConfig::new(
            server.uri(),
            ClientIdentity::Combined { pem: pem_file.path().to_path_buf() },
        );

        Self { server, _combined_pem: pem_file, config }
    }

    /// Mount a who-am-I payload on `Token/WhoAmI`.
    pub async fn mount_whoami(&self, identity: Value) {
        Mock::given(method("GET"))
            .and(path("/service/core/v4/Token/WhoAmI"))
            .respond_with(ResponseTemplate::new(200).set_body_json(identity))
            .mount(&self.server)
            .await;
    }

    /// Mount a direct registration fetch.
    pub async fn mount_registration(&self, id: &str, registration: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/service/core/v4/A2ARegistrations/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(registration))
            .mount(&self.server)
            .await;
    }

    /// Mount one page of a registration's retrievable accounts.
    pub async fn mount_accounts_page(&self, reg_id: &str, page: usize, entries: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/service/core/v4/A2ARegistrations/{reg_id}/RetrievableAccounts")))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(entries))
            .mount(&self.server)
            .await;
    }

    /// Same as [`MockAppliance::mount_accounts_page`] but with an expected
    /// call count, verified when the server drops.
    pub async fn mount_accounts_page_expect(
        &self,
        reg_id: &str,
        page: usize,
        entries: Value,
        expected_calls: u64,
    ) {
        Mock::given(method("GET"))
            .and(path(format!("/service/core/v4/A2ARegistrations/{reg_id}/RetrievableAccounts")))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(entries))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Mount the A2A credentials endpoint for a given API key and kind.
    pub async fn mount_credentials(&self, api_key: &str, kind: &str, secret: &str) {
        Mock::given(method("GET"))
            .and(path("/service/a2a/v4/Credentials"))
            .and(query_param("type", kind))
            .and(header("Authorization", format!("A2A {api_key}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(secret)))
            .mount(&self.server)
            .await;
    }

    /// Number of received requests whose URL contains `needle`, handy for
    /// asserting an endpoint was never consulted.
    pub async fn requests_containing(&self, needle: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.as_str().contains(needle))
            .count()
    }
}

/// Initialize test logging once; respects `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();
}

/// Mount the standard certificate → STS → bearer exchange.
pub async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/RSTS/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": STS_TOKEN,
            "token_type": "Bearer",
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/service/core/v4/Token/LoginResponse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Status": "Success",
            "UserToken": USER_TOKEN,
        })))
        .mount(server)
        .await;
}

/// A retrievable-account entry in the flat field shape.
pub fn flat_account(asset: &str, account: &str, api_key: &str) -> Value {
    json!({
        "AssetName": asset,
        "AccountName": account,
        "ApiKey": api_key,
    })
}

/// A retrievable-account entry in the nested sub-object shape.
pub fn nested_account(asset: &str, account: &str, api_key: &str) -> Value {
    json!({
        "Asset": { "Name": asset },
        "Account": { "Name": account },
        "ApiKey": api_key,
    })
}
