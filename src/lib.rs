//! # credgate
//!
//! Credential resolution against a privileged-access-management appliance
//! using client-certificate authentication. One call walks the full
//! workflow:
//!
//! ```text
//! client cert/key → bearer session → registration scope → account match → secret
//!    Authenticator    IdentityResolver      AccountMatcher      SecretRetriever
//! ```
//!
//! Control flows strictly forward; no stage is retried automatically, and a
//! run produces exactly one final record: a [`Resolution`] on success, or a
//! typed [`ResolverError`] (with a serializable [`FailureReport`] view)
//! otherwise.
//!
//! ## Example
//!
//! ```rust,ignore
//! use credgate::{AccountRequest, ClientIdentity, CredentialResolver, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> credgate::Result<()> {
//!     let config = ResolverConfig::new(
//!         "spp.example.com",
//!         ClientIdentity::Split {
//!             cert: "/etc/credgate/client.crt".into(),
//!             key: "/etc/credgate/client.key".into(),
//!         },
//!     );
//!
//!     let resolver = CredentialResolver::new(config)?;
//!     let resolution = resolver.resolve(&AccountRequest::new("db01", "svc_app")).await?;
//!
//!     println!(
//!         "matched {}/{} under registration {}",
//!         resolution.asset, resolution.account, resolution.registration_id
//!     );
//!     // resolution.api_key / resolution.secret expose the sensitive values
//!     // explicitly and redact everywhere else.
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! - API keys, bearer tokens, and secrets travel in [`SecretString`]:
//!   redacted in Debug/Display/serialization, zeroed on drop.
//! - Error payloads carry HTTP status and a truncated body preview, never
//!   secret material.
//! - Disabling TLS server-certificate verification is an explicit
//!   configuration variant, never a default.

pub mod config;
pub mod errors;
pub mod events;
pub mod resolver;
pub mod types;

mod auth;
mod client;
mod identity;
mod matcher;
mod retrieval;

// Re-export commonly used types
pub use config::{
    ClientIdentity, ForbiddenPolicy, MatchPolicy, RegistrationOverride, ResolverConfig,
    RetrievalOptions, TlsPolicy,
};
pub use errors::{FailureReport, ResolverError, Result};
pub use events::{ProgressSink, StatusEvent, TracingSink};
pub use resolver::{AccountRequest, CredentialResolver, Resolution, Retrieve};
pub use types::{Registration, SecretKind, SecretString};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
