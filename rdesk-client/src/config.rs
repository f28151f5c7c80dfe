//! Layered config loading for the client, mirroring `rdesk-server`'s
//! `config.rs` (itself grounded in `warpgate/src/config.rs::load_config`).

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use rdesk_common::config::ClientConfig;
use std::path::Path;
use tracing::info;

use crate::cli::Cli;

pub fn load_config(path: &Path) -> Result<ClientConfig> {
    let mut builder = Config::builder();
    if path.exists() {
        builder = builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Yaml));
    }
    let config: ClientConfig = builder
        .add_source(Environment::with_prefix("RDESK").separator("_"))
        .build()?
        .try_deserialize()?;

    info!(
        server_host = %config.server_host,
        screen_port = config.screen_port,
        input_port = config.input_port,
        auth_port = config.auth_port,
        "loaded client configuration"
    );
    Ok(config)
}

/// Applies the client CLI's explicit `--server`/`--*-port` flags on top of
/// a loaded config, highest-precedence layer above the file and `RDESK_*`
/// environment variables. A flag left unset leaves the underlying config
/// value untouched.
pub fn apply_cli_overrides(config: &mut ClientConfig, cli: &Cli) {
    if let Some(server) = &cli.server {
        config.server_host = server.clone();
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
        let config = load_config(Path::new("/nonexistent/client.yaml")).unwrap();
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.auth_port, 5002);
    }

    #[test]
    fn file_values_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(&path, "server_host: \"10.0.0.5\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.server_host, "10.0.0.5");
        assert_eq!(config.screen_port, 5000);
    }

    #[test]
    fn cli_overrides_only_apply_when_set() {
        let mut config = ClientConfig::default();
        let cli = Cli::parse_from(["rdesk-client", "--server", "10.0.0.9", "--auth-port", "7002"]);
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.server_host, "10.0.0.9");
        assert_eq!(config.auth_port, 7002);
        // Untouched by any flag: still the default.
        assert_eq!(config.screen_port, 5000);
    }
}
