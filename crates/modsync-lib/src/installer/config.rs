//! Centralized installer settings.
//! Static constants plus the few values sourced from the environment.

use crate::utils::hardware::processing_units;

pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Identifying header sent with every request
pub const USER_AGENT: &str = concat!("modsync/", env!("CARGO_PKG_VERSION"));

// URL Constants
pub const CURSEFORGE_API_URL: &str = "https://api.curseforge.com";

/// Environment variable holding the CurseForge API key
pub const CURSEFORGE_API_KEY_ENV: &str = "CF_API_KEY";

pub fn current_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS)
}

/// CurseForge API key from the environment, else the key baked in at build time
pub fn curseforge_api_key() -> Option<String> {
    std::env::var(CURSEFORGE_API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            option_env!("CF_API_KEY")
                .filter(|k| !k.trim().is_empty())
                .map(str::to_string)
        })
}

/// Width of every bounded concurrent group
pub fn default_concurrency() -> usize {
    processing_units()
}

/// Normalise a `<host>:<port>` proxy into a URL reqwest accepts
pub fn proxy_url(proxy: &str) -> String {
    let proxy = proxy.trim();
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}
