use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::licensing::config::get_platform;

/// Length of a fingerprint in hex characters
pub const FINGERPRINT_LEN: usize = 32;

/// Opaque per-machine identifier sent to the license server as the machine code
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Debug)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of the current machine
    pub fn compute() -> Self {
        Self::from_attributes(&MachineAttributes::collect())
    }

    /// Hash a fixed set of attributes. Pure.
    pub fn from_attributes(attrs: &MachineAttributes) -> Self {
        let combined = [
            attrs.hostname.as_str(),
            attrs.arch.as_str(),
            attrs.processor.as_str(),
            attrs.node_id.as_str(),
            attrs.platform.as_str(),
        ]
        .concat();

        let digest = Sha256::digest(combined.as_bytes());
        Self(hex::encode(&digest[..FINGERPRINT_LEN / 2]))
    }

    /// Wrap a known machine code, e.g. one recorded by another tool
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// System attributes the fingerprint is derived from
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct MachineAttributes {
    pub hostname: String,
    pub arch: String,
    pub processor: String,
    pub node_id: String,
    pub platform: String,
}

impl MachineAttributes {
    /// Read attributes from the host. Unavailable values fall back, never fail.
    pub fn collect() -> Self {
        Self {
            hostname: get_hostname(),
            arch: std::env::consts::ARCH.to_string(),
            processor: get_processor(),
            node_id: get_node_id(),
            platform: format!(
                "{}-{}-{}",
                get_platform(),
                std::env::consts::FAMILY,
                get_os_version()
            ),
        }
    }
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_default()
}

fn get_processor() -> String {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split_once(':'))
                    .map(|(_, v)| v.trim().to_string())
            })
            .unwrap_or_default()
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sysctl")
            .args(["-n", "machdep.cpu.brand_string"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        std::env::var("PROCESSOR_IDENTIFIER").unwrap_or_default()
    }
}

fn get_os_version() -> String {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("VERSION_ID="))
                    .map(|l| l.trim_start_matches("VERSION_ID=").trim_matches('"').to_string())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        "unknown".to_string()
    }
}

/// Hardware node id. The random fallback is generated once per process so the
/// fingerprint stays stable for the process lifetime.
fn get_node_id() -> String {
    static FALLBACK: OnceLock<String> = OnceLock::new();

    hardware_id().unwrap_or_else(|| {
        FALLBACK
            .get_or_init(|| uuid::Uuid::new_v4().simple().to_string())
            .clone()
    })
}

#[cfg(not(any(target_os = "ios", target_os = "android")))]
fn hardware_id() -> Option<String> {
    use machineid_rs::{Encryption, HWIDComponent, IdBuilder};

    IdBuilder::new(Encryption::SHA256)
        .add_component(HWIDComponent::SystemID)
        .build("license-activator")
        .ok()
}

#[cfg(any(target_os = "ios", target_os = "android"))]
fn hardware_id() -> Option<String> {
    None
}
