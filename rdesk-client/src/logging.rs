//! Tracing initialization, identical in shape to `rdesk-server`'s
//! `logging.rs` (itself grounded in `warpgate/src/logging.rs`'s
//! verbosity-to-`RUST_LOG` mapping).

use anyhow::Result;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cli::Cli;

pub fn init_logging(cli: &Cli) -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        let level = match cli.debug {
            0 => "rdesk_client=info",
            1 => "rdesk_client=debug",
            _ => "debug",
        };
        std::env::set_var("RUST_LOG", level);
    }

    let env_filter = EnvFilter::from_default_env();
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(env_filter);

    tracing_subscriber::registry().with(fmt_layer).init();
    Ok(())
}
