//! The authentication channel's connection handler: accepts a connection,
//! reads one JSON request frame, dispatches to the store, writes one JSON
//! response frame. One task is spawned per accepted connection, bounded by
//! a semaphore rather than an unbounded spawn loop.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use rdesk_common::framing::{self, MAX_AUTH_FRAME};
use rdesk_common::{AuthRequest, AuthResponse};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{RwLock, Semaphore};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::connection_log::ConnectionLog;
use crate::error::StoreError;
use crate::store::UserStore;

/// How long a connected-but-silent client is given to send its request
/// before being dropped.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on concurrently in-flight auth connections. The listener
/// accepts the connection but drops it immediately if no permit is free,
/// rather than queuing it indefinitely.
pub fn auth_semaphore(max_auth_connections: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(max_auth_connections))
}

/// Handles one accepted auth connection end-to-end: reads the request with
/// a hard timeout, dispatches it against the store, and writes back a
/// response frame. Never propagates an error to the caller — any failure
/// (timeout, malformed JSON, oversized frame) is logged and the connection
/// simply closes, matching the original server's "never let one bad client
/// kill the listener" posture.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    store: Arc<RwLock<UserStore>>,
    connection_log: Arc<ConnectionLog>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = match timeout(
        REQUEST_READ_TIMEOUT,
        framing::read_text_frame(&mut stream, MAX_AUTH_FRAME, None::<&AtomicBool>),
    )
    .await
    {
        Ok(Ok(text)) => text,
        Ok(Err(err)) => {
            debug!(%peer, %err, "auth connection closed before a full request arrived");
            return;
        }
        Err(_) => {
            debug!(%peer, "auth connection timed out waiting for a request");
            return;
        }
    };

    let request: AuthRequest = match serde_json::from_str(&request) {
        Ok(request) => request,
        Err(err) => {
            warn!(%peer, %err, "malformed auth request");
            let _ = write_response(
                &mut stream,
                &AuthResponse::err(format!("Malformed request: {err}")),
            )
            .await;
            return;
        }
    };

    let (response, log_user, log_status) = dispatch(&store, request).await;

    connection_log
        .record("auth", &log_user, &peer.ip().to_string(), &log_status)
        .await;

    let _ = write_response(&mut stream, &response).await;
}

async fn dispatch(
    store: &Arc<RwLock<UserStore>>,
    request: AuthRequest,
) -> (AuthResponse, String, String) {
    match request.action.as_str() {
        "register" => {
            let (Some(username), Some(password), Some(email)) =
                (request.username, request.password, request.email)
            else {
                return missing_field_response("register");
            };
            let mut store = store.write().await;
            match store.register_user(&username, &password, &email, request.fullname) {
                Ok(()) => (
                    AuthResponse::ok("Registration successful"),
                    username,
                    "registered".to_string(),
                ),
                Err(err) => (
                    AuthResponse::err(err.to_string()),
                    username,
                    format!("register failed: {err}"),
                ),
            }
        }
        "login" => {
            let (Some(username), Some(password)) = (request.username, request.password) else {
                return missing_field_response("login");
            };
            let mut store = store.write().await;
            match store.authenticate(&username, &password) {
                Ok(token) => {
                    let mut response = AuthResponse::ok("Login successful");
                    response.token = Some(token);
                    response.user = store.get_user_info(&username);
                    (response, username, "login".to_string())
                }
                Err(err) => (
                    AuthResponse::err(err.to_string()),
                    username,
                    "login failed".to_string(),
                ),
            }
        }
        "logout" => {
            let Some(token) = request.token else {
                return missing_field_response("logout");
            };
            let mut store = store.write().await;
            match store.invalidate_session(&token) {
                Ok(()) => (
                    AuthResponse::ok("Logged out"),
                    "-".to_string(),
                    "logout".to_string(),
                ),
                Err(err) => (
                    AuthResponse::err(err.to_string()),
                    "-".to_string(),
                    "logout failed".to_string(),
                ),
            }
        }
        "validate" => {
            let Some(token) = request.token else {
                return missing_field_response("validate");
            };
            let mut store = store.write().await;
            match store.validate_session(&token) {
                Ok(user) => {
                    let mut response = AuthResponse::ok("Session is valid");
                    response.user = Some(user.to_public_info());
                    (response, user.username, "validated".to_string())
                }
                Err(err) => (
                    AuthResponse::err(err.to_string()),
                    "-".to_string(),
                    validate_failure_status(&err),
                ),
            }
        }
        other => (
            AuthResponse::err(format!("Unknown action: {other}")),
            "-".to_string(),
            format!("unknown action: {other}"),
        ),
    }
}

fn missing_field_response(action: &str) -> (AuthResponse, String, String) {
    (
        AuthResponse::err(format!("Malformed request: missing required field for '{action}'")),
        "-".to_string(),
        format!("{action} failed: missing required field"),
    )
}

fn validate_failure_status(err: &StoreError) -> String {
    format!("validate failed: {err}")
}

/// Writes the response frame, falling back to a minimal hand-built JSON
/// error if `response` itself somehow fails to serialize — a response
/// write should never panic.
async fn write_response<S: AsyncWrite + Unpin>(
    stream: &mut S,
    response: &AuthResponse,
) -> Result<(), rdesk_common::ProtocolError> {
    let body = serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"success":false,"message":"internal serialization error"}"#.to_string()
    });
    framing::write_text_frame(stream, &body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tokio::io::duplex;

    async fn new_store() -> Arc<RwLock<UserStore>> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::mem::forget(dir);
        Arc::new(RwLock::new(
            UserStore::open(path, StdDuration::from_secs(86400)).unwrap(),
        ))
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let store = new_store().await;
        let log = Arc::new(ConnectionLog::new(tempfile::tempdir().unwrap().into_path()));
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();

        let (mut client, server) = duplex(8192);
        let store2 = store.clone();
        let log2 = log.clone();
        let handle = tokio::spawn(async move {
            handle_connection(server, peer, store2, log2).await;
        });

        let req = serde_json::json!({
            "action": "register",
            "username": "alice",
            "password": "hunter2",
            "email": "alice@example.com",
        });
        framing::write_text_frame(&mut client, &req.to_string())
            .await
            .unwrap();
        let resp_text = framing::read_text_frame(&mut client, MAX_AUTH_FRAME, None)
            .await
            .unwrap();
        let resp: AuthResponse = serde_json::from_str(&resp_text).unwrap();
        assert!(resp.success);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_request_gets_error_response_not_a_panic() {
        let store = new_store().await;
        let log = Arc::new(ConnectionLog::new(tempfile::tempdir().unwrap().into_path()));
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();

        let (mut client, server) = duplex(8192);
        let handle = tokio::spawn(async move {
            handle_connection(server, peer, store, log).await;
        });

        framing::write_text_frame(&mut client, "not json")
            .await
            .unwrap();
        let resp_text = framing::read_text_frame(&mut client, MAX_AUTH_FRAME, None)
            .await
            .unwrap();
        let resp: AuthResponse = serde_json::from_str(&resp_text).unwrap();
        assert!(!resp.success);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_action_is_distinguishable_from_malformed_json() {
        let store = new_store().await;
        let log = Arc::new(ConnectionLog::new(tempfile::tempdir().unwrap().into_path()));
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();

        let (mut client, server) = duplex(8192);
        let handle = tokio::spawn(async move {
            handle_connection(server, peer, store, log).await;
        });

        let req = serde_json::json!({ "action": "teleport" });
        framing::write_text_frame(&mut client, &req.to_string())
            .await
            .unwrap();
        let resp_text = framing::read_text_frame(&mut client, MAX_AUTH_FRAME, None)
            .await
            .unwrap();
        let resp: AuthResponse = serde_json::from_str(&resp_text).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.message, "Unknown action: teleport");
        handle.await.unwrap();
    }
}
