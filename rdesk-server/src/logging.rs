//! Tracing initialization, grounded in `warpgate/src/logging.rs`'s
//! verbosity-to-`RUST_LOG` mapping, trimmed down from its database/JSON
//! logger layers (this process has neither) to a single `fmt` layer driven
//! by `EnvFilter`.

use anyhow::Result;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cli::Cli;

pub fn init_logging(cli: &Cli) -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        let level = match cli.debug {
            0 => "rdesk_server=info,rdesk_core=info",
            1 => "rdesk_server=debug,rdesk_core=debug",
            _ => "debug",
        };
        std::env::set_var("RUST_LOG", level);
    }

    let env_filter = EnvFilter::from_default_env();
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(env_filter);

    tracing_subscriber::registry().with(fmt_layer).init();
    Ok(())
}
