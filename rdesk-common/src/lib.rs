//! Shared wire types, framing codec, coordinate mapper, and configuration
//! structs used by both `rdesk-server` and `rdesk-client`.

pub mod config;
pub mod coords;
pub mod error;
pub mod framing;
pub mod types;

pub use error::ProtocolError;
pub use types::{AuthRequest, AuthResponse, HandshakeResponse, InputCommand, MonitorInfo, UserInfo};
