use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Request body size limit in bytes for the status API
    /// Env: REQUEST_BODY_LIMIT (default: 16384 = 16KB)
    pub request_body_limit: usize,

    /// Request timeout in seconds for the status API
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Status API port
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Watch file holding tracked players, notification channel and check interval
    /// Env: WATCH_FILE (default: "ddtrack.json")
    pub watch_file: String,

    /// Discord API Token
    /// Env: DISCORD_TOKEN (required by the binary, checked at startup)
    pub discord_token: Option<String>,

    /// DDNet master server list
    /// Env: MASTER_URL (default: "https://master1.ddnet.org/ddnet/15/servers.json")
    pub master_url: String,

    /// Base URL for map previews and skins
    /// Env: DDNET_BASE_URL (default: "https://ddnet.org")
    pub ddnet_base_url: String,

    /// TrueType font used to draw player names on the image
    /// Env: FONT_PATH (optional, names are not drawn without it)
    pub font_path: Option<String>,

    /// Timeout for fetching the master server list
    /// Env: FETCH_TIMEOUT_SECS (default: 10)
    pub fetch_timeout: Duration,

    /// Timeout for each render/send/edit/delete call
    /// Env: CALL_TIMEOUT_SECS (default: 15)
    pub call_timeout: Duration,

    /// How many recent channel messages are checked by the startup purge
    /// Env: PURGE_LOOKBACK (default: 50, max 100)
    pub purge_lookback: u8,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            request_body_limit: env_or_default("REQUEST_BODY_LIMIT", 16 * 1024),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            port: env_or_default("PORT", 3000),
            watch_file: env_or_default_string("WATCH_FILE", "ddtrack.json"),
            discord_token: var("DISCORD_TOKEN").ok(),
            master_url: env_or_default_string(
                "MASTER_URL",
                "https://master1.ddnet.org/ddnet/15/servers.json",
            ),
            ddnet_base_url: env_or_default_string("DDNET_BASE_URL", "https://ddnet.org"),
            font_path: var("FONT_PATH").ok(),
            fetch_timeout: Duration::from_secs(env_or_default("FETCH_TIMEOUT_SECS", 10)),
            call_timeout: Duration::from_secs(env_or_default("CALL_TIMEOUT_SECS", 15)),
            // Discord returns at most 100 messages per history request
            purge_lookback: env_or_default("PURGE_LOOKBACK", 50u8).min(100),
        }
    }

    /// Create configuration with all default values
    pub fn default() -> Self {
        Self {
            request_body_limit: 16 * 1024, // 16 KB
            request_timeout: Duration::from_secs(30),
            port: 3000,
            watch_file: "ddtrack.json".to_string(),
            discord_token: None,
            master_url: "https://master1.ddnet.org/ddnet/15/servers.json".to_string(),
            ddnet_base_url: "https://ddnet.org".to_string(),
            font_path: None,
            fetch_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(15),
            purge_lookback: 50,
        }
    }

    /// Options for the tick driver.
    pub fn tracker_options(&self) -> ddtrack_core::TrackerOptions {
        ddtrack_core::TrackerOptions {
            fetch_timeout: self.fetch_timeout,
            call_timeout: self.call_timeout,
            purge_lookback: self.purge_lookback,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
