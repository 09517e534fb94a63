//! Crate-wide error types
//!
//! Most failures in this crate are logged and absorbed at the point they
//! occur (unknown player numbers, gated revives, viewer disconnects). The
//! variants here cover the ones that must propagate: transport and
//! persistence failures have no defined recovery and are surfaced to the
//! caller instead of being swallowed.

use std::fmt;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for device, persistence and session operations
#[derive(Debug)]
pub enum Error {
    /// Serial device could not be opened or configured
    DeviceOpen {
        path: String,
        source: serialport::Error,
    },
    /// Serial control-line or port-level failure after open
    Serial(serialport::Error),
    /// Filesystem or socket I/O failure
    Io(std::io::Error),
    /// JSON encode/decode failure
    Json(serde_json::Error),
    /// Websocket transport failure that is not a normal close
    WebSocket(tokio_tungstenite::tungstenite::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DeviceOpen { path, source } => {
                write!(f, "Failed to open serial device {}: {}", path, source)
            }
            Error::Serial(e) => write!(f, "Serial port error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::WebSocket(e) => write!(f, "Websocket error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DeviceOpen { source, .. } => Some(source),
            Error::Serial(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::WebSocket(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        Error::Serial(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}
