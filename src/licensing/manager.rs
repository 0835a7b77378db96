use tracing::{error, info, warn};

use crate::licensing::activator::{CredentialSink, TokenActivator};
use crate::licensing::api::LicenseClient;
use crate::licensing::config::EXPIRY_WARNING_DAYS;
use crate::licensing::device::Fingerprint;
use crate::licensing::storage::ConfigStore;
use crate::licensing::types::{CredentialRecord, LicenseError, LicenseStatus};

/// Outcome of the expiry step of a license check
#[derive(Debug, Clone, PartialEq, Eq)]
enum ExpiryCheck {
    Current,
    Expired(String),
    Unreachable,
}

/// Owns the credential record and drives license check, activation and token refresh.
pub struct AuthManager<S> {
    store: ConfigStore,
    record: CredentialRecord,
    client: LicenseClient,
    activator: TokenActivator<S>,
    fingerprint: Fingerprint,
}

impl<S: CredentialSink> AuthManager<S> {
    /// Load the record from `store` and talk to `api_url`, or to the persisted URL when `None`.
    /// The override is not written back to the document.
    pub fn new(store: ConfigStore, api_url: Option<&str>, sink: S) -> Result<Self, LicenseError> {
        let record = store.load();
        let client = LicenseClient::new(api_url.unwrap_or(&record.api_url))?;
        Ok(Self::with_parts(store, record, client, sink, Fingerprint::compute()))
    }

    /// Assemble from explicit parts. A half credential in `record` is dropped.
    pub fn with_parts(
        store: ConfigStore,
        record: CredentialRecord,
        client: LicenseClient,
        sink: S,
        fingerprint: Fingerprint,
    ) -> Self {
        let activator = TokenActivator::new(client.clone(), sink);
        Self {
            store,
            record: record.normalize(),
            client,
            activator,
            fingerprint,
        }
    }

    pub fn record(&self) -> &CredentialRecord {
        &self.record
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn activator(&self) -> &TokenActivator<S> {
        &self.activator
    }

    /// Pause between failed refresh attempts
    pub fn with_retry_delay(mut self, delay: std::time::Duration) -> Self {
        self.activator = self.activator.with_retry_delay(delay);
        self
    }

    /// Write the record through. A failed write is logged and reported but the
    /// in-memory record keeps its new value.
    fn persist(&self) -> Result<(), LicenseError> {
        self.store.save(&self.record).map_err(|e| {
            error!(error = %e, "failed to save config");
            e
        })
    }

    fn invalidate(&mut self) {
        self.record.clear_credential();
        let _ = self.persist();
    }

    /// Clear the stored credential (explicit reset)
    pub fn reset(&mut self) -> Result<(), LicenseError> {
        info!("clearing stored license");
        self.record.clear_credential();
        self.persist()
    }

    async fn check_token_expiry(&self, token: &str) -> ExpiryCheck {
        let expiry = match self.client.check_token_expiry(token).await {
            Ok(expiry) => expiry,
            Err(LicenseError::Server { message, .. }) => {
                error!(%message, "expiry check rejected");
                return ExpiryCheck::Expired(message);
            }
            Err(e) => {
                error!(error = %e, "failed to check token expiry");
                return ExpiryCheck::Unreachable;
            }
        };

        let (Some(remaining_days), Some(is_expired)) = (expiry.remaining_days, expiry.is_expired)
        else {
            error!("token expiry information incomplete");
            return ExpiryCheck::Unreachable;
        };

        if is_expired {
            warn!("token expired");
            return ExpiryCheck::Expired("token expired".to_string());
        }

        if remaining_days <= EXPIRY_WARNING_DAYS {
            warn!(remaining_days, expiry_date = ?expiry.expiry_date_parsed(), "token expires soon");
        } else {
            info!(remaining_days, "token still valid");
        }
        ExpiryCheck::Current
    }

    /// Check the stored license against the server.
    pub async fn check_license(&mut self) -> LicenseStatus {
        let (Some(token), Some(license_id)) =
            (self.record.token.clone(), self.record.license_id.clone())
        else {
            return LicenseStatus::Invalid("no license found".to_string());
        };

        info!(%license_id, "checking license status");

        // Expiry first; an expired token is never sent for verification
        match self.check_token_expiry(&token).await {
            ExpiryCheck::Current => {}
            ExpiryCheck::Unreachable => {
                return LicenseStatus::Unknown("network failure".to_string());
            }
            ExpiryCheck::Expired(reason) => {
                self.invalidate();
                return LicenseStatus::Invalid(reason);
            }
        }

        // Verify with server
        match self.client.verify_token(&token).await {
            Ok(()) => {
                info!(%license_id, "license is valid");
                LicenseStatus::Valid(license_id)
            }
            Err(LicenseError::Server { message, .. }) => {
                warn!(%message, "license rejected");
                self.invalidate();
                LicenseStatus::Invalid(message)
            }
            Err(e) => {
                error!(error = %e, "license check failed");
                LicenseStatus::Unknown(e.to_string())
            }
        }
    }

    /// Exchange an activation code for a license and store it.
    pub async fn activate_new_license(&mut self, activation_code: &str) -> Result<String, LicenseError> {
        let activation_code = activation_code.trim();
        if activation_code.is_empty() {
            return Err(LicenseError::EmptyActivationCode);
        }

        // Exchange code for license
        info!("activating license");
        let activation = self.client.activate_license(activation_code).await?;

        let (Some(token), Some(license_id)) = (activation.token, activation.license_id) else {
            return Err(LicenseError::IncompleteResponse(
                "activation reply lacks token or license id".to_string(),
            ));
        };

        // Save updated state
        self.record.set_credential(token, license_id.clone());
        if self.persist().is_ok() {
            info!(%license_id, "license saved");
        }
        Ok(license_id)
    }

    /// First token available under the stored license. Does not touch local state.
    pub async fn get_unused_token(&self) -> Result<String, LicenseError> {
        let token = self.record.token.as_deref().ok_or(LicenseError::NoLicense)?;
        let tokens = self.client.list_tokens(token).await?;
        tokens
            .into_iter()
            .next()
            .map(|entry| entry.token)
            .ok_or(LicenseError::NoTokensAvailable)
    }

    /// Full flow: make sure a license is held, fetch a token, activate it on this machine.
    ///
    /// `activation_code` is only consulted when the stored license is not valid.
    pub async fn process<F>(&mut self, activation_code: F) -> bool
    where
        F: FnOnce() -> String,
    {
        // Make sure a license is held
        let license_id = match self.check_license().await {
            LicenseStatus::Valid(license_id) => license_id,
            status => {
                info!(?status, "no valid license, activating");
                match self.activate_new_license(&activation_code()).await {
                    Ok(license_id) => license_id,
                    Err(e) => {
                        error!(error = %e, "license activation failed");
                        return false;
                    }
                }
            }
        };

        // Pick a token from the pool
        let token = match self.get_unused_token().await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "failed to get token");
                return false;
            }
        };

        // Bind it to this machine
        match self
            .activator
            .activate_token(&token, &license_id, &self.fingerprint)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "token activation failed");
                false
            }
        }
    }

    /// Drop the stored license, then run the full flow with a fresh activation code.
    pub async fn reactivate<F>(&mut self, activation_code: F) -> bool
    where
        F: FnOnce() -> String,
    {
        if let Err(e) = self.reset() {
            warn!(error = %e, "continuing with an unsaved reset");
        }
        self.process(activation_code).await
    }

    /// Keep an activated token usable without a new activation code.
    pub async fn refresh(&self, token: &str, max_attempts: u32) -> Result<String, LicenseError> {
        let license_id = self
            .record
            .license_id
            .as_deref()
            .ok_or(LicenseError::NoLicense)?;
        self.activator
            .auto_refresh(token, license_id, &self.fingerprint, max_attempts)
            .await
            .ok_or(LicenseError::RefreshFailed(max_attempts))
    }
}
