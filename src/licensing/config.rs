use std::path::PathBuf;

/// License server URL used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Environment variable overriding the license server URL
pub const API_URL_ENV: &str = "LICENSE_API_URL";

/// Per-request deadline
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remaining days at or below which an expiry warning is logged
pub const EXPIRY_WARNING_DAYS: i64 = 7;

/// Token refresh configuration
pub const DEFAULT_MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Daily activation limit assumed when the server omits it
pub const DEFAULT_DAILY_LIMIT: u64 = 5;

/// Local storage layout
pub const APP_DIR_NAME: &str = "LicenseActivator";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const SINK_FILE_NAME: &str = "auth.json";

/// Directory holding the per-user config document
///
/// `~/Library/Application Support/<app>/User` on macOS, `%APPDATA%\<app>\User` on
/// Windows, `~/.config/<app>/User` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("User"))
}

/// Pick the effective API base URL. Later sources win.
pub fn resolve_api_url(persisted: &str, env: Option<String>, flag: Option<&str>) -> String {
    let url = flag
        .map(str::to_string)
        .or_else(|| env.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| persisted.to_string());
    url.trim_end_matches('/').to_string()
}

/// API endpoints
pub mod endpoints {
    pub fn token_expiry(base: &str) -> String {
        format!("{}/token/jwt-expiry", base)
    }

    pub fn license_verify(base: &str) -> String {
        format!("{}/license/verify", base)
    }

    pub fn license_activate(base: &str) -> String {
        format!("{}/license/activate", base)
    }

    pub fn token_list(base: &str) -> String {
        format!("{}/token/list/by-jwt", base)
    }

    pub fn machine_status(base: &str, fingerprint: &str) -> String {
        format!(
            "{}/token/machine-status/{}",
            base,
            urlencoding::encode(fingerprint)
        )
    }

    pub fn token_activate(base: &str) -> String {
        format!("{}/token/activate", base)
    }
}

/// Get current platform string
pub fn get_platform() -> &'static str {
    #[cfg(target_os = "windows")]
    return "windows";

    #[cfg(target_os = "macos")]
    return "macos";

    #[cfg(target_os = "linux")]
    return "linux";

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    return "unknown";
}
