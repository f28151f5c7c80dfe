//! Auth-channel client: one-shot connect/request/response round trips for
//! `login`, `register`, and `logout`, grounded in
//! `original_source/auth_client.py::AuthClient`.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use rdesk_common::framing::{self, MAX_AUTH_FRAME};
use rdesk_common::AuthResponse;
use serde_json::json;
use tokio::net::TcpStream;
use tracing::info;

async fn send_request(addr: SocketAddr, request: serde_json::Value) -> Result<AuthResponse> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to auth service at {addr}"))?;

    framing::write_text_frame(&mut stream, &request.to_string())
        .await
        .context("failed to send auth request")?;

    let response_text = framing::read_text_frame(&mut stream, MAX_AUTH_FRAME, None)
        .await
        .context("failed to read auth response")?;

    serde_json::from_str(&response_text).context("malformed auth response")
}

/// Logs in and returns the session token on success.
pub async fn login(addr: SocketAddr, username: &str, password: &str) -> Result<String> {
    let response = send_request(
        addr,
        json!({ "action": "login", "username": username, "password": password }),
    )
    .await?;

    if !response.success {
        bail!(response.message);
    }
    let token = response
        .token
        .context("login succeeded but the server returned no token")?;
    info!(username, "logged in");
    Ok(token)
}

pub async fn register(
    addr: SocketAddr,
    username: &str,
    password: &str,
    email: &str,
    fullname: Option<&str>,
) -> Result<()> {
    let response = send_request(
        addr,
        json!({
            "action": "register",
            "username": username,
            "password": password,
            "email": email,
            "fullname": fullname,
        }),
    )
    .await?;

    if !response.success {
        bail!(response.message);
    }
    info!(username, "registered");
    Ok(())
}

pub async fn logout(addr: SocketAddr, token: &str) -> Result<()> {
    let response = send_request(addr, json!({ "action": "logout", "token": token })).await?;
    if !response.success {
        bail!(response.message);
    }
    info!("logged out");
    Ok(())
}
