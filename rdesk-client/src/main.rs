//! Remote desktop client entry point: logs in (or reuses a supplied
//! token), then runs the screen reader and input listener as two
//! independent concurrent workers, bridging monitor info from the screen
//! channel into the input client's coordinate mapper.

mod auth_client;
mod cli;
mod config;
mod input_client;
mod logging;
mod screen_client;

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rdesk_common::coords::RemoteDisplay;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::input_client::InputClientState;
use crate::screen_client::{FrameRenderer, ScreenClientState};

/// Default renderer: no GUI is built into this crate, so the default
/// implementation just logs frame metadata. A real frontend would
/// implement [`FrameRenderer`] over its own paint path instead.
struct LoggingRenderer;

impl FrameRenderer for LoggingRenderer {
    fn on_frame(&self, frame: &image::RgbImage) {
        tracing::trace!(width = frame.width(), height = frame.height(), "frame received");
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {host}:{port}"))?
        .next()
        .with_context(|| format!("no address found for {host}:{port}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli)?;

    let mut config = config::load_config(&cli.config)?;
    config::apply_cli_overrides(&mut config, &cli);

    let auth_addr = resolve(&config.server_host, config.auth_port)?;
    let screen_addr = resolve(&config.server_host, config.screen_port)?;
    let input_addr = resolve(&config.server_host, config.input_port)?;

    let token = match &cli.token {
        Some(token) => token.clone(),
        None => {
            let username = cli
                .username
                .as_deref()
                .context("either --token or --username/--password must be supplied")?;
            let password = cli
                .password
                .as_deref()
                .context("either --token or --username/--password must be supplied")?;
            auth_client::login(auth_addr, username, password).await?
        }
    };

    let screen_state = ScreenClientState::new();
    let input_state = InputClientState::new();
    let renderer: Arc<dyn FrameRenderer> = Arc::new(LoggingRenderer);

    let screen_task = {
        let screen_state = screen_state.clone();
        let input_state = input_state.clone();
        let token = token.clone();
        tokio::spawn(async move {
            screen_client::run(screen_addr, &token, screen_state, renderer, move |info| {
                input_state.set_display(RemoteDisplay {
                    width: info.width,
                    height: info.height,
                });
            })
            .await
        })
    };

    let input_task = {
        let input_state = input_state.clone();
        let token = token.clone();
        tokio::spawn(async move { input_client::run(input_addr, &token, input_state).await })
    };

    let (screen_result, input_result) = tokio::join!(screen_task, input_task);

    if let Err(err) = screen_result.context("screen client task panicked")? {
        warn!(%err, "screen client ended with an error");
    }
    if let Err(err) = input_result.context("input client task panicked")? {
        warn!(%err, "input client ended with an error");
    }

    info!("remote desktop client exiting");
    Ok(())
}
