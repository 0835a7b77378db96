#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use license_activator_lib::licensing::{
    AuthManager, ConfigStore, CredentialRecord, CredentialSink, Fingerprint, LicenseClient,
};
use serde_json::{json, Value};
use wiremock::{MockServer, ResponseTemplate};

pub const FINGERPRINT: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f0";

/// Base URL of the mock license API
pub fn api_url(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

pub fn client(server: &MockServer) -> LicenseClient {
    LicenseClient::with_timeout(api_url(server), Duration::from_millis(500)).unwrap()
}

pub fn fingerprint() -> Fingerprint {
    Fingerprint::new(FINGERPRINT)
}

/// `{success: true, data}`
pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

/// `{success: false, message, code}`
pub fn fail(message: &str, code: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": false,
        "message": message,
        "code": code,
    }))
}

/// Sink that records every call
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub reject: bool,
}

impl RecordingSink {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CredentialSink for RecordingSink {
    fn update_auth(&self, email: &str, access_token: &str, refresh_token: &str) -> bool {
        self.calls.lock().unwrap().push((
            email.to_string(),
            access_token.to_string(),
            refresh_token.to_string(),
        ));
        !self.reject
    }
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("User").join("config.json");
        Self { dir, config_path }
    }

    pub fn store(&self) -> ConfigStore {
        ConfigStore::at(&self.config_path)
    }

    /// Persist a credential before the manager is built
    pub fn with_credential(self, token: &str, license_id: &str) -> Self {
        let mut record = CredentialRecord::default();
        record.set_credential(token.to_string(), license_id.to_string());
        self.store().save(&record).unwrap();
        self
    }

    pub fn manager(&self, server: &MockServer) -> AuthManager<RecordingSink> {
        let store = self.store();
        let record = store.load();
        AuthManager::with_parts(store, record, client(server), RecordingSink::default(), fingerprint())
    }

    pub fn config_bytes(&self) -> Vec<u8> {
        std::fs::read(&self.config_path).unwrap()
    }
}
