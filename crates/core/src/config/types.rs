use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::routine::RoutineConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub routine: RoutineConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub show_api: ShowApiConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("presale.db")
}

/// Clock synchronisation against a time authority.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Per-query timeout in milliseconds.
    #[serde(default = "default_clock_timeout_ms")]
    pub timeout_ms: u64,
    /// SNTP servers as `host:port`, tried in order.
    #[serde(default = "default_ntp_servers")]
    pub ntp_servers: Vec<String>,
    /// HTTP endpoint returning the platform timestamp, tried before NTP.
    #[serde(default)]
    pub authority_url: Option<String>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval_secs: default_sync_interval_secs(),
            timeout_ms: default_clock_timeout_ms(),
            ntp_servers: default_ntp_servers(),
            authority_url: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sync_interval_secs() -> u64 {
    60
}

fn default_clock_timeout_ms() -> u64 {
    3000
}

fn default_ntp_servers() -> Vec<String> {
    vec!["ntp.aliyun.com:123".to_string()]
}

/// Supervisor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupervisorConfig {
    /// Register a scheduler task for every intent. When false routines only
    /// run on force-start.
    #[serde(default = "default_true")]
    pub auto_schedule: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            auto_schedule: true,
        }
    }
}

/// Ticketing API client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShowApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Cookie header sent with every request.
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ShowApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie: None,
            timeout_secs: default_api_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://show.bilibili.com".to_string()
}

fn default_api_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

/// Notification configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub backend: NotifyBackend,
    /// Gotify-specific configuration (required when backend = "gotify")
    #[serde(default)]
    pub gotify: Option<GotifyConfig>,
}

/// Available notification backends
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifyBackend {
    #[default]
    None,
    Gotify,
}

/// Gotify push configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GotifyConfig {
    /// Gotify server URL (e.g., "https://push.example.com")
    pub url: String,
    /// Application token
    pub token: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    8
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub clock: ClockConfig,
    pub routine: RoutineConfig,
    pub supervisor: SupervisorConfig,
    pub show_api: SanitizedShowApiConfig,
    pub notify: SanitizedNotifyConfig,
}

/// Sanitized ticketing API config (cookie hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedShowApiConfig {
    pub base_url: String,
    pub cookie_configured: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifyConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gotify: Option<SanitizedGotifyConfig>,
}

/// Sanitized Gotify config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGotifyConfig {
    pub url: String,
    pub token_configured: bool,
    pub priority: u8,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            clock: config.clock.clone(),
            routine: config.routine.clone(),
            supervisor: config.supervisor.clone(),
            show_api: SanitizedShowApiConfig {
                base_url: config.show_api.base_url.clone(),
                cookie_configured: config
                    .show_api
                    .cookie
                    .as_ref()
                    .is_some_and(|c| !c.is_empty()),
                timeout_secs: config.show_api.timeout_secs,
            },
            notify: SanitizedNotifyConfig {
                backend: match config.notify.backend {
                    NotifyBackend::None => "none".to_string(),
                    NotifyBackend::Gotify => "gotify".to_string(),
                },
                gotify: config.notify.gotify.as_ref().map(|g| SanitizedGotifyConfig {
                    url: g.url.clone(),
                    token_configured: !g.token.is_empty(),
                    priority: g.priority,
                }),
            },
        }
    }
}
