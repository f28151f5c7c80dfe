//! Command-line flags, grounded in `warpgate-cli/src/main.rs`'s
//! derive-based `clap::Parser` and `warpgate/src/main.rs`'s `-d`/`-dd`
//! verbosity counter.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Remote desktop server", long_about = None)]
pub struct Cli {
    /// Path to the server's config.yaml.
    #[arg(short, long, default_value = "config.yaml", env = "RDESK_CONFIG")]
    pub config: PathBuf,

    /// Increase log verbosity (-d, -dd, -ddd).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Override the bind host from config.yaml.
    #[arg(long, env = "RDESK_HOST")]
    pub host: Option<String>,

    /// Override the user/session store path from config.yaml.
    #[arg(long, env = "RDESK_DB_PATH")]
    pub db: Option<PathBuf>,

    /// Override the screen channel's listening port.
    #[arg(long, env = "RDESK_SCREEN_PORT")]
    pub screen_port: Option<u16>,

    /// Override the input channel's listening port.
    #[arg(long, env = "RDESK_INPUT_PORT")]
    pub input_port: Option<u16>,

    /// Override the auth service's listening port.
    #[arg(long, env = "RDESK_AUTH_PORT")]
    pub auth_port: Option<u16>,
}
