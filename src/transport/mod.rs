//! Transport layer for SQL job connections
//!
//! Handles the low-level WebSocket communication with the server. The
//! [`Transport`] trait is the seam between the session and the socket: one
//! text frame out, one text frame back, blocking.

mod ws;

pub use ws::WsTransport;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Trait for transport implementations
pub trait Transport: Send {
    /// Send one text frame to the server
    fn send(&mut self, frame: &str) -> Result<()>;

    /// Block until one text frame arrives from the server
    fn receive(&mut self) -> Result<String>;

    /// Close the connection
    fn close(&mut self) -> Result<()>;
}

/// Websocket scheme for connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    /// Plain websocket
    Ws,
    /// TLS-secured websocket
    #[default]
    Wss,
}

impl Scheme {
    /// Check if this scheme uses TLS
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Wss)
    }

    /// Get the scheme string for URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ws" => Ok(Scheme::Ws),
            "wss" | "ssl" | "tls" => Ok(Scheme::Wss),
            _ => Err(Error::InvalidScheme(s.to_string())),
        }
    }
}
