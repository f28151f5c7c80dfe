//! Remote desktop server entry point: loads config, opens the user store,
//! and fans out the auth/screen/input listeners as independent tasks until
//! a shutdown signal arrives. Shaped after
//! `warpgate/src/commands/run.rs`'s `FuturesUnordered` fan-out over
//! per-protocol listeners, generalized from "N configurable protocol
//! servers" down to this suite's fixed three channels.

mod auth_listener;
mod cli;
mod config;
mod input;
mod logging;
mod screen;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use rdesk_core::{ConnectionLog, Shutdown, UserStore};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli)?;

    let mut config = config::load_config(&cli.config)?;
    config::apply_cli_overrides(&mut config, &cli);

    let store = Arc::new(RwLock::new(UserStore::open(
        config.db_path.clone().into(),
        config.session_lifetime,
    )?));
    let connection_log = Arc::new(ConnectionLog::new(config.connection_log_dir.clone()));

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown.clone().listen_for_signal());

    let auth_listener = TcpListener::bind((config.host.as_str(), config.auth_port))
        .await
        .with_context(|| format!("failed to bind auth port {}", config.auth_port))?;
    let screen_listener = TcpListener::bind((config.host.as_str(), config.screen_port))
        .await
        .with_context(|| format!("failed to bind screen port {}", config.screen_port))?;
    let input_listener = TcpListener::bind((config.host.as_str(), config.input_port))
        .await
        .with_context(|| format!("failed to bind input port {}", config.input_port))?;

    info!(
        auth_port = config.auth_port,
        screen_port = config.screen_port,
        input_port = config.input_port,
        "remote desktop server starting"
    );

    let mut tasks = FuturesUnordered::new();
    tasks.push(tokio::spawn(auth_listener::run(
        auth_listener,
        config.max_auth_connections,
        store.clone(),
        connection_log.clone(),
        shutdown.clone(),
    )));
    tasks.push(tokio::spawn(screen::run(
        screen_listener,
        screen::ScreenChannelConfig {
            frame_interval: config.frame_interval,
            monitor_index: config.monitor_index,
        },
        store.clone(),
        connection_log.clone(),
        shutdown.clone(),
    )));
    tasks.push(tokio::spawn(input::run(
        input_listener,
        store.clone(),
        connection_log.clone(),
        shutdown.clone(),
    )));

    while let Some(result) = tasks.next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(%err, "a channel listener exited with an error"),
            Err(err) => error!(%err, "a channel listener task panicked"),
        }
    }

    info!("remote desktop server exiting");
    Ok(())
}
