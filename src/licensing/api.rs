use std::time::Duration;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::licensing::config::{endpoints, REQUEST_TIMEOUT_SECS};
use crate::licensing::device::Fingerprint;
use crate::licensing::types::{
    LicenseError, MachineStatus, TokenExpiry, TokenInfo, TransportError,
};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Common Response Envelope
// ============================================================================

/// Envelope wrapping every server reply
#[derive(Deserialize, Debug, Clone)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ApiEnvelope {
    fn application_error(&self) -> LicenseError {
        LicenseError::Server {
            code: self
                .code
                .clone()
                .unwrap_or_else(|| "UNKNOWN_ERROR".to_string()),
            message: self
                .message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
        }
    }

    /// Split into payload or application error
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, LicenseError> {
        if !self.success {
            return Err(self.application_error());
        }

        let data = self.data.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(data)
            .map_err(|e| TransportError::Decode(format!("unexpected payload: {}", e)).into())
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Serialize)]
pub struct TokenRequest<'a> {
    pub token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseIdRequest<'a> {
    pub license_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateLicenseRequest<'a> {
    pub activation_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateTokenRequest<'a> {
    pub token: &'a str,
    pub license_id: &'a str,
    pub machine_code: &'a str,
}

// ============================================================================
// Payloads
// ============================================================================

/// Data returned by `license/activate`
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LicenseActivation {
    pub token: Option<String>,
    pub license_id: Option<String>,
}

/// One entry of `token/list/by-jwt`
#[derive(Deserialize, Debug, Clone)]
pub struct TokenEntry {
    pub token: String,
}

#[derive(Deserialize, Debug)]
struct TokenList {
    #[serde(default)]
    tokens: Option<Vec<TokenEntry>>,
}

#[derive(Deserialize, Debug, Default)]
struct MachineStatusData {
    status: Option<String>,
    reason: Option<String>,
}

/// Data returned by `token/activate`
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenActivation {
    pub token: TokenInfo,
    pub today_usage_count: Option<u64>,
    pub max_daily_limit: Option<u64>,
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client for the license server API. No retries happen at this layer.
#[derive(Clone, Debug)]
pub struct LicenseClient {
    client: reqwest::Client,
    base_url: String,
}

impl LicenseClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LicenseError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LicenseError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and read the envelope. Anything but HTTP 200 is a transport error.
    async fn envelope(&self, request: reqwest::RequestBuilder) -> Result<ApiEnvelope, LicenseError> {
        let response = request.send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            debug!(status = status.as_u16(), "license server returned non-200");
            return Err(TransportError::Status(status.as_u16()).into());
        }

        response
            .json::<ApiEnvelope>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()).into())
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, LicenseError> {
        self.envelope(request).await?.into_result()
    }

    /// Expiry metadata for a license token
    pub async fn check_token_expiry(&self, token: &str) -> Result<TokenExpiry, LicenseError> {
        debug!("checking token expiry");
        let request = self
            .client
            .post(endpoints::token_expiry(&self.base_url))
            .json(&TokenRequest { token });
        self.call(request).await
    }

    /// Verify a license token
    pub async fn verify_token(&self, token: &str) -> Result<(), LicenseError> {
        debug!("verifying token");
        let request = self
            .client
            .post(endpoints::license_verify(&self.base_url))
            .json(&TokenRequest { token });
        self.call::<IgnoredAny>(request).await.map(|_| ())
    }

    /// Verify a license by id
    pub async fn verify_license_id(&self, license_id: &str) -> Result<(), LicenseError> {
        debug!(license_id, "verifying license id");
        let request = self
            .client
            .post(endpoints::license_verify(&self.base_url))
            .json(&LicenseIdRequest { license_id });
        self.call::<IgnoredAny>(request).await.map(|_| ())
    }

    /// Exchange an activation code for a license token
    pub async fn activate_license(&self, activation_code: &str) -> Result<LicenseActivation, LicenseError> {
        debug!("activating license");
        let request = self
            .client
            .post(endpoints::license_activate(&self.base_url))
            .json(&ActivateLicenseRequest { activation_code });
        self.call(request).await
    }

    /// Tokens available under a license token. A reply without a token list is an empty list.
    pub async fn list_tokens(&self, token: &str) -> Result<Vec<TokenEntry>, LicenseError> {
        debug!("listing tokens");
        let request = self
            .client
            .get(endpoints::token_list(&self.base_url))
            .json(&TokenRequest { token });
        let list: Option<TokenList> = self.call(request).await?;
        Ok(list.and_then(|l| l.tokens).unwrap_or_default())
    }

    /// Whether the server lets this machine activate tokens
    pub async fn machine_status(&self, fingerprint: &Fingerprint) -> Result<MachineStatus, LicenseError> {
        debug!(fingerprint = %fingerprint, "querying machine status");
        let request = self
            .client
            .get(endpoints::machine_status(&self.base_url, fingerprint.as_str()));
        let envelope = self.envelope(request).await?;

        let data: MachineStatusData = envelope
            .data
            .clone()
            .and_then(|d| serde_json::from_value(d).ok())
            .unwrap_or_default();

        // A blocked verdict stands even when the envelope reports failure.
        if data.status.as_deref() == Some("blocked") {
            return Ok(MachineStatus::Blocked(
                data.reason.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        if !envelope.success {
            return Err(envelope.application_error());
        }

        Ok(MachineStatus::Allowed)
    }

    /// Bind a token to this machine
    pub async fn activate_token(
        &self,
        token: &str,
        license_id: &str,
        fingerprint: &Fingerprint,
    ) -> Result<TokenActivation, LicenseError> {
        debug!(license_id, "activating token");
        let request = self
            .client
            .post(endpoints::token_activate(&self.base_url))
            .json(&ActivateTokenRequest {
                token,
                license_id,
                machine_code: fingerprint.as_str(),
            });
        self.call(request).await
    }
}
