// Licensing system module
// License check, activation and token refresh against the license server

pub mod types;
pub mod config;
pub mod device;
pub mod storage;
pub mod api;
pub mod activator;
pub mod manager;

pub use types::*;
pub use activator::{CredentialSink, FileCredentialSink, NoopSink, TokenActivator};
pub use api::LicenseClient;
pub use device::Fingerprint;
pub use manager::AuthManager;
pub use storage::ConfigStore;
