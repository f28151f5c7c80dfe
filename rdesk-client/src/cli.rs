//! Command-line flags, mirrored from `rdesk-server`'s `cli.rs`, itself
//! grounded in `warpgate-cli/src/main.rs` and `warpgate/src/main.rs`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Remote desktop client", long_about = None)]
pub struct Cli {
    /// Path to the client's config.yaml.
    #[arg(short, long, default_value = "client.yaml", env = "RDESK_CONFIG")]
    pub config: PathBuf,

    /// Session token to use instead of interactively logging in.
    #[arg(long, env = "RDESK_TOKEN")]
    pub token: Option<String>,

    /// Username to log in with when `--token` is not supplied.
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password to log in with when `--token` is not supplied.
    #[arg(short, long)]
    pub password: Option<String>,

    /// Increase log verbosity (-d, -dd, -ddd).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Override the server host from client.yaml.
    #[arg(long, env = "RDESK_SERVER")]
    pub server: Option<String>,

    /// Override the screen channel's port.
    #[arg(long, env = "RDESK_SCREEN_PORT")]
    pub screen_port: Option<u16>,

    /// Override the input channel's port.
    #[arg(long, env = "RDESK_INPUT_PORT")]
    pub input_port: Option<u16>,

    /// Override the auth service's port.
    #[arg(long, env = "RDESK_AUTH_PORT")]
    pub auth_port: Option<u16>,
}
