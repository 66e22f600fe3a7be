//! Core types shared across the resolution stages: redacting secret wrapper,
//! secret kinds, registration records, and payload field normalization.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string wrapper that redacts its contents in Debug, Display, and
/// serialization.
///
/// Bearer tokens, API keys, and retrieved secrets all travel through this
/// type. The actual value can only be accessed via explicit method calls, and
/// the underlying memory is zeroed when the value is dropped.
///
/// # Example
///
/// ```rust,ignore
/// use credgate::SecretString;
///
/// let secret = SecretString::new("my-api-key");
/// println!("{:?}", secret);           // SecretString([REDACTED])
/// let raw = secret.expose_secret();   // explicit access only
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Never serialize the actual secret value.
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(SecretString(value))
    }
}

impl SecretString {
    /// Creates a new SecretString from a string value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying secret value.
    ///
    /// Only call this where the value is actually needed (request headers,
    /// handing the result to the caller). Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Consumes the SecretString and returns the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    /// Returns the length of the secret without exposing the value.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The type of credential fetched by the retrieval stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretKind {
    /// Account password (the default).
    #[default]
    Password,
    /// SSH/TLS private key material.
    PrivateKey,
    /// A further API key held by the account.
    ApiKey,
}

impl SecretKind {
    /// Wire value for the retrieval endpoint's `type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "Password",
            Self::PrivateKey => "PrivateKey",
            Self::ApiKey => "ApiKey",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-integration registration as returned by the listing endpoints.
///
/// Registrations are read-only to this crate; only the fields the flow needs
/// are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration id, normalized to a string (the wire form is an integer
    /// or a string depending on appliance version).
    pub id: String,
    /// Application display name, when the listing carries one.
    pub app_name: Option<String>,
}

impl Registration {
    /// Extract a registration from a raw listing entry. Entries without a
    /// usable id yield `None` and are skipped by callers.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = ["Id", "ID", "id"].iter().find_map(|key| scalar_id(value.get(*key)?))?;
        let app_name = value.get("AppName").and_then(Value::as_str).map(str::to_string);
        Some(Self { id, app_name })
    }
}

/// Normalize a scalar id (integer or string on the wire) to a string.
pub(crate) fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flat-field-first name extraction: `entry[flat]` wins, otherwise
/// `entry[nested]["Name"]`.
///
/// Retrievable-account payloads carry asset/account names either as flat
/// fields (`AssetName`) or nested under a sub-object (`Asset.Name`) depending
/// on appliance version; both shapes must normalize identically.
pub(crate) fn named_field(entry: &Value, flat: &str, nested: &str) -> Option<String> {
    if let Some(value) = entry.get(flat) {
        if let Some(name) = value.as_str() {
            return Some(name.to_string());
        }
    }
    entry.get(nested)?.get("Name")?.as_str().map(str::to_string)
}
