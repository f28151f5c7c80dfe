//! Wire-level data types shared between the server and the client:
//! monitor geometry, input commands, and the public user projection
//! returned by the auth service.

use serde::{Deserialize, Serialize};

/// Immutable `{width, height}` pair captured once at server start.
///
/// Framed on the wire as two 4-byte big-endian unsigned integers with no
/// surrounding container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorInfo {
    pub width: u32,
    pub height: u32,
}

impl MonitorInfo {
    pub fn to_bytes(self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.width.to_be_bytes());
        buf[4..8].copy_from_slice(&self.height.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 8 {
            return None;
        }
        let width = u32::from_be_bytes(bytes[0..4].try_into().ok()?);
        let height = u32::from_be_bytes(bytes[4..8].try_into().ok()?);
        Some(Self { width, height })
    }

    pub fn aspect_ratio(self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// A mouse/keyboard command in the `action,arg,arg` wire shape. Parsing
/// never panics: a malformed or unknown command is reported as `None`,
/// which the caller logs and drops rather than treating as an error that
/// closes the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    Move { x: i32, y: i32 },
    Click { x: i32, y: i32 },
    RightClick { x: i32, y: i32 },
    Scroll { dx: i32, dy: i32 },
    KeyPress { key: String },
    KeyRelease { key: String },
}

impl InputCommand {
    /// Parses one `action,arg,arg` command line. Returns `None` for an
    /// unknown action or an unparseable integer coordinate — the caller
    /// logs and drops rather than treating this as a protocol error.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split(',');
        let action = parts.next()?;
        let parse_int = |s: Option<&str>| -> Option<i32> { s?.trim().parse::<f64>().ok().map(|v| v as i32) };
        match action {
            "move" => Some(InputCommand::Move {
                x: parse_int(parts.next())?,
                y: parse_int(parts.next())?,
            }),
            "click" => Some(InputCommand::Click {
                x: parse_int(parts.next())?,
                y: parse_int(parts.next())?,
            }),
            "right_click" => Some(InputCommand::RightClick {
                x: parse_int(parts.next())?,
                y: parse_int(parts.next())?,
            }),
            "scroll" => Some(InputCommand::Scroll {
                dx: parse_int(parts.next())?,
                dy: parse_int(parts.next())?,
            }),
            "key_press" => Some(InputCommand::KeyPress {
                key: parts.next()?.to_string(),
            }),
            "key_release" => Some(InputCommand::KeyRelease {
                key: parts.next()?.to_string(),
            }),
            _ => None,
        }
    }

    pub fn to_wire(&self) -> String {
        match self {
            InputCommand::Move { x, y } => format!("move,{x},{y}"),
            InputCommand::Click { x, y } => format!("click,{x},{y}"),
            InputCommand::RightClick { x, y } => format!("right_click,{x},{y}"),
            InputCommand::Scroll { dx, dy } => format!("scroll,{dx},{dy}"),
            InputCommand::KeyPress { key } => format!("key_press,{key}"),
            InputCommand::KeyRelease { key } => format!("key_release,{key}"),
        }
    }
}

/// Public projection of a user returned by the auth service: no password
/// hash, timestamps rendered as ISO-8601 strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    pub email: String,
    pub fullname: Option<String>,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// Request body for the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    pub action: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Response body for the auth service. Always `{success, message, ...}`;
/// `token`/`user` are populated only on the successful paths that need
/// them.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

impl AuthResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Response body for the channel handshake: `{success, message}` only, no
/// token/user fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_info_round_trips() {
        let info = MonitorInfo {
            width: 1920,
            height: 1080,
        };
        let bytes = info.to_bytes();
        assert_eq!(MonitorInfo::from_bytes(&bytes), Some(info));
    }

    #[test]
    fn parses_every_command_shape() {
        assert_eq!(
            InputCommand::parse("move,10,20"),
            Some(InputCommand::Move { x: 10, y: 20 })
        );
        assert_eq!(
            InputCommand::parse("click,1,2"),
            Some(InputCommand::Click { x: 1, y: 2 })
        );
        assert_eq!(
            InputCommand::parse("right_click,1,2"),
            Some(InputCommand::RightClick { x: 1, y: 2 })
        );
        assert_eq!(
            InputCommand::parse("scroll,-1,3"),
            Some(InputCommand::Scroll { dx: -1, dy: 3 })
        );
        assert_eq!(
            InputCommand::parse("key_press,a"),
            Some(InputCommand::KeyPress { key: "a".into() })
        );
        assert_eq!(
            InputCommand::parse("key_release,a"),
            Some(InputCommand::KeyRelease { key: "a".into() })
        );
    }

    #[test]
    fn drops_unknown_or_malformed_commands() {
        assert_eq!(InputCommand::parse("teleport,1,2"), None);
        assert_eq!(InputCommand::parse("move,notanumber,2"), None);
        assert_eq!(InputCommand::parse("move,1"), None);
    }
}
