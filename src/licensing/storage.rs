use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::licensing::config::{config_dir, CONFIG_FILE_NAME};
use crate::licensing::types::{CredentialRecord, LicenseError};

/// Load/save of the credential record. Holds no state besides the document path.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at the platform config location
    pub fn new() -> Result<Self, LicenseError> {
        let dir = config_dir()
            .ok_or_else(|| LicenseError::Storage("Failed to get config dir".to_string()))?;
        Ok(Self::at(dir.join(CONFIG_FILE_NAME)))
    }

    /// Store at an explicit document path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record. Missing or unreadable documents load as an empty record.
    pub fn load(&self) -> CredentialRecord {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no config document, using defaults");
            return CredentialRecord::default();
        }

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read config");
                return CredentialRecord::default();
            }
        };

        match serde_json::from_str::<CredentialRecord>(&contents) {
            Ok(record) => record.normalize(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to parse config");
                CredentialRecord::default()
            }
        }
    }

    /// Save the full record, writing a sibling temp file and renaming it over the document.
    pub fn save(&self, record: &CredentialRecord) -> Result<(), LicenseError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LicenseError::Storage(format!("Failed to create config dir: {}", e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| LicenseError::Storage(format!("Failed to serialize config: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| LicenseError::Storage(format!("Failed to write config: {}", e)))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            LicenseError::Storage(format!("Failed to replace config: {}", e))
        })?;

        Ok(())
    }

    /// Delete the document (explicit reset)
    pub fn delete(&self) -> Result<(), LicenseError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| LicenseError::Storage(format!("Failed to delete config: {}", e)))?;
        }
        Ok(())
    }
}
