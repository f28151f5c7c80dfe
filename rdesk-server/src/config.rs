//! Layered config loading: file → `RDESK_*` environment overrides. A
//! missing file is not an error — every field has a default, so
//! `rdesk-server` runs out of the box with no config.yaml.

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use rdesk_common::config::ServerConfig;
use std::path::Path;
use tracing::info;

use crate::cli::Cli;

pub fn load_config(path: &Path) -> Result<ServerConfig> {
    let mut builder = Config::builder();
    if path.exists() {
        builder = builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Yaml));
    }
    let config: ServerConfig = builder
        .add_source(Environment::with_prefix("RDESK").separator("_"))
        .build()?
        .try_deserialize()?;

    info!(
        host = %config.host,
        screen_port = config.screen_port,
        input_port = config.input_port,
        auth_port = config.auth_port,
        "loaded server configuration"
    );
    Ok(config)
}

/// Applies the server CLI's explicit `--host`/`--db`/`--*-port` flags on
/// top of a loaded config, highest-precedence layer above the file and
/// `RDESK_*` environment variables. A flag left unset leaves the
/// underlying config value untouched.
pub fn apply_cli_overrides(config: &mut ServerConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(db) = &cli.db {
        config.db_path = db.to_string_lossy().into_owned();
    }
    if let Some(port) = cli.screen_port {
        config.screen_port = port;
    }
    if let Some(port) = cli.input_port {
        config.input_port = port;
    }
    if let Some(port) = cli.auth_port {
        config.auth_port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/config.yaml")).unwrap();
        assert_eq!(config.auth_port, 5002);
        assert_eq!(config.screen_port, 5000);
    }

    #[test]
    fn file_values_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "auth_port: 6002\nmonitor_index: 1\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.auth_port, 6002);
        assert_eq!(config.monitor_index, 1);
        // Fields absent from the file still fall back to their defaults.
        assert_eq!(config.screen_port, 5000);
    }

    #[test]
    fn cli_overrides_only_apply_when_set() {
        let mut config = ServerConfig::default();
        let cli = Cli::parse_from([
            "rdesk-server",
            "--host",
            "10.0.0.1",
            "--auth-port",
            "7002",
        ]);
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.auth_port, 7002);
        // Untouched by any flag: still the default.
        assert_eq!(config.screen_port, 5000);
    }
}
