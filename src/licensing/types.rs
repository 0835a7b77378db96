use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::licensing::config::DEFAULT_API_URL;

/// Local credential record persisted in the config document
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct CredentialRecord {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_id: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for CredentialRecord {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            license_id: None,
        }
    }
}

impl CredentialRecord {
    /// Both token and license id are stored
    pub fn has_credential(&self) -> bool {
        self.token.is_some() && self.license_id.is_some()
    }

    /// Store a freshly activated credential. Both fields change together.
    pub fn set_credential(&mut self, token: String, license_id: String) {
        self.token = Some(token);
        self.license_id = Some(license_id);
    }

    /// Drop the stored credential. Both fields change together.
    pub fn clear_credential(&mut self) {
        self.token = None;
        self.license_id = None;
    }

    /// A document holding only one half of the credential is treated as holding none.
    pub(crate) fn normalize(mut self) -> Self {
        if self.token.is_some() != self.license_id.is_some() {
            self.clear_credential();
        }
        self
    }
}

/// Result of a license check
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Server confirmed the license; carries the license id
    Valid(String),
    /// Server rejected the credential, or none is stored
    Invalid(String),
    /// Could not reach a decision (network failure, ambiguous reply)
    Unknown(String),
}

impl LicenseStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, LicenseStatus::Valid(_))
    }

    pub fn license_id(&self) -> Option<&str> {
        match self {
            LicenseStatus::Valid(id) => Some(id),
            _ => None,
        }
    }
}

/// Machine standing as reported by the server before token activation
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub enum MachineStatus {
    Allowed,
    Blocked(String),
}

/// Token issued by the server during activation
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct TokenInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
}

/// Expiry metadata for the stored license token
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenExpiry {
    pub remaining_days: Option<i64>,
    pub is_expired: Option<bool>,
    pub expiry_date: Option<String>,
}

impl TokenExpiry {
    /// Parsed expiry date, if the server sent an RFC 3339 timestamp
    pub fn expiry_date_parsed(&self) -> Option<DateTime<Utc>> {
        self.expiry_date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc))
    }
}

/// Transport-level failures. These never say anything about the credential itself.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("failed to parse response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Error types for licensing operations
#[derive(thiserror::Error, Debug)]
pub enum LicenseError {
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("{message}")]
    Server { code: String, message: String },

    #[error("Activation code must not be empty")]
    EmptyActivationCode,

    #[error("Machine is blocked: {0}")]
    MachineBlocked(String),

    #[error("No tokens available")]
    NoTokensAvailable,

    #[error("Incomplete response: {0}")]
    IncompleteResponse(String),

    #[error("Token could not be refreshed after {0} attempts")]
    RefreshFailed(u32),

    #[error("No license found")]
    NoLicense,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LicenseError {
    /// True for failures that say nothing about the credential and may be retried later
    pub fn is_transport(&self) -> bool {
        matches!(self, LicenseError::Network(_))
    }
}

impl From<reqwest::Error> for LicenseError {
    fn from(e: reqwest::Error) -> Self {
        LicenseError::Network(e.into())
    }
}

impl Serialize for LicenseError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
