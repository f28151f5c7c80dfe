//! Shared configuration shape. `rdesk-server` and `rdesk-client` each load
//! their own `config.yaml` through the `config` crate, layering environment
//! variables and CLI flags on top of the file's defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_screen_port() -> u16 {
    5000
}

const fn default_input_port() -> u16 {
    5001
}

const fn default_auth_port() -> u16 {
    5002
}

fn default_db_path() -> String {
    "users.json".to_owned()
}

const fn default_monitor_index() -> usize {
    0
}

fn default_connection_log_dir() -> String {
    "connection_logs".to_owned()
}

const fn default_session_lifetime() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

const fn default_frame_interval() -> Duration {
    Duration::from_millis(30)
}

const fn default_max_auth_connections() -> usize {
    256
}

/// Server-side configuration, loaded from an optional YAML file and
/// overridden by `RDESK_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_screen_port")]
    pub screen_port: u16,
    #[serde(default = "default_input_port")]
    pub input_port: u16,
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_monitor_index")]
    pub monitor_index: usize,
    #[serde(default = "default_connection_log_dir")]
    pub connection_log_dir: String,
    #[serde(default = "default_session_lifetime", with = "humantime_serde")]
    pub session_lifetime: Duration,
    #[serde(default = "default_frame_interval", with = "humantime_serde")]
    pub frame_interval: Duration,
    #[serde(default = "default_max_auth_connections")]
    pub max_auth_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            screen_port: default_screen_port(),
            input_port: default_input_port(),
            auth_port: default_auth_port(),
            db_path: default_db_path(),
            monitor_index: default_monitor_index(),
            connection_log_dir: default_connection_log_dir(),
            session_lifetime: default_session_lifetime(),
            frame_interval: default_frame_interval(),
            max_auth_connections: default_max_auth_connections(),
        }
    }
}

/// Client-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_screen_port")]
    pub screen_port: u16,
    #[serde(default = "default_input_port")]
    pub input_port: u16,
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_owned()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            screen_port: default_screen_port(),
            input_port: default_input_port(),
            auth_port: default_auth_port(),
        }
    }
}
