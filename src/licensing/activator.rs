use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::licensing::api::LicenseClient;
use crate::licensing::config::DEFAULT_DAILY_LIMIT;
use crate::licensing::device::Fingerprint;
use crate::licensing::types::{LicenseError, MachineStatus};

/// Credential store owned by the host application
pub trait CredentialSink {
    /// Persist the credentials. Returns false if they could not be stored.
    fn update_auth(&self, email: &str, access_token: &str, refresh_token: &str) -> bool;
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl CredentialSink for NoopSink {
    fn update_auth(&self, email: &str, _access_token: &str, _refresh_token: &str) -> bool {
        info!(email, "credentials received (not persisted)");
        true
    }
}

/// Sink writing the credentials to a JSON document
#[derive(Debug, Clone)]
pub struct FileCredentialSink {
    path: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredAuth<'a> {
    email: &'a str,
    access_token: &'a str,
    refresh_token: &'a str,
}

impl FileCredentialSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write(&self, auth: &StoredAuth<'_>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(auth)?;
        std::fs::write(&self.path, json)
    }
}

impl CredentialSink for FileCredentialSink {
    fn update_auth(&self, email: &str, access_token: &str, refresh_token: &str) -> bool {
        let auth = StoredAuth {
            email,
            access_token,
            refresh_token,
        };
        match self.write(&auth) {
            Ok(()) => true,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to write credentials");
                false
            }
        }
    }
}

/// Binds tokens to this machine and keeps them fresh
pub struct TokenActivator<S> {
    client: LicenseClient,
    sink: S,
    retry_delay: Duration,
}

impl<S: CredentialSink> TokenActivator<S> {
    pub fn new(client: LicenseClient, sink: S) -> Self {
        Self {
            client,
            sink,
            retry_delay: Duration::ZERO,
        }
    }

    /// Pause between failed refresh attempts. Zero retries immediately.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Ask the server whether this machine may activate tokens. Errors pass through;
    /// callers must not read them as `Allowed`.
    pub async fn check_machine_status(&self, fingerprint: &Fingerprint) -> Result<MachineStatus, LicenseError> {
        self.client.machine_status(fingerprint).await
    }

    /// Activate `token` for this machine and hand the issued credential to the sink.
    pub async fn activate_token(
        &self,
        token: &str,
        license_id: &str,
        fingerprint: &Fingerprint,
    ) -> Result<(), LicenseError> {
        // Machine gate; anything but an explicit allow stops here
        match self.check_machine_status(fingerprint).await {
            Ok(MachineStatus::Allowed) => {}
            Ok(MachineStatus::Blocked(reason)) => {
                error!(%reason, "machine is blocked");
                return Err(LicenseError::MachineBlocked(reason));
            }
            Err(e) => {
                error!(error = %e, "machine status check failed");
                return Err(e);
            }
        }

        // Activate with server
        let activation = self
            .client
            .activate_token(token, license_id, fingerprint)
            .await
            .map_err(|e| {
                error!(error = %e, "token activation failed");
                e
            })?;

        let issued = &activation.token;
        // The service issues a single token; it doubles as the refresh token.
        if self.sink.update_auth(&issued.email, &issued.token, &issued.token) {
            info!("local credential store updated");
            info!(
                "usage today: {}/{}",
                activation.today_usage_count.unwrap_or(0),
                activation.max_daily_limit.unwrap_or(DEFAULT_DAILY_LIMIT)
            );
        } else {
            warn!("token activated but the local credential store could not be updated");
        }

        Ok(())
    }

    /// Whether the server still accepts `token`
    pub async fn verify_token(&self, token: &str) -> bool {
        match self.client.verify_token(token).await {
            Ok(()) => {
                info!("token is valid");
                true
            }
            Err(e) => {
                warn!(error = %e, "token verification failed");
                false
            }
        }
    }

    /// Keep `token` usable: verify it, otherwise re-activate, at most `max_attempts` times.
    /// `None` means a fresh activation code is needed.
    pub async fn auto_refresh(
        &self,
        token: &str,
        license_id: &str,
        fingerprint: &Fingerprint,
        max_attempts: u32,
    ) -> Option<String> {
        for attempt in 1..=max_attempts {
            // Still accepted, nothing to do
            if self.verify_token(token).await {
                return Some(token.to_string());
            }

            if self.activate_token(token, license_id, fingerprint).await.is_ok() {
                info!(attempt, "token activated");
                return Some(token.to_string());
            }

            if attempt < max_attempts {
                info!(attempt, "refresh attempt failed, retrying");
                if !self.retry_delay.is_zero() {
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        error!(max_attempts, "all activation attempts failed");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_writes_camel_case_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host").join("auth.json");
        let sink = FileCredentialSink::new(&path);

        assert!(sink.update_auth("user@example.com", "tok", "tok"));

        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["email"], "user@example.com");
        assert_eq!(stored["accessToken"], "tok");
        assert_eq!(stored["refreshToken"], "tok");
    }

    #[test]
    fn test_file_sink_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail.
        let sink = FileCredentialSink::new(dir.path());
        assert!(!sink.update_auth("user@example.com", "tok", "tok"));
    }

    #[test]
    fn test_noop_sink_accepts() {
        assert!(NoopSink.update_auth("a@b.c", "t", "t"));
    }

    #[tokio::test]
    async fn test_zero_attempts_gives_up_without_network() {
        // Unroutable base URL: any request would fail, but none should be made.
        let client = LicenseClient::new("http://127.0.0.1:9/api").unwrap();
        let activator = TokenActivator::new(client, NoopSink);
        let fp = Fingerprint::new("abc");
        assert_eq!(activator.auto_refresh("tok", "L1", &fp, 0).await, None);
    }
}
