//! Store- and auth-level error taxonomy. These never cross a channel
//! boundary; the auth service renders them into the uniform `{success,
//! message}` wire shape and every other caller just checks
//! `Result::is_ok()`.

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Username already exists")]
    UsernameExists,
    #[error("Email already exists")]
    EmailExists,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Account is deactivated")]
    AccountDeactivated,
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session is inactive")]
    SessionInactive,
    #[error("Session has expired")]
    SessionExpired,
    #[error("User not found")]
    UserNotFound,
    #[error("Session not found")]
    SessionNotFound,
    #[error("storage error: {0}")]
    Io(#[from] anyhow::Error),
}
