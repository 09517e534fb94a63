//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::constants::DEFAULT_BAUD_RATE;

/// Default number of players when no snapshot exists
pub const DEFAULT_PLAYER_COUNT: u32 = 456;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Serial device path (required)
    pub device_path: String,

    /// Address the viewer channel listens on
    pub bind_addr: SocketAddr,

    /// Roster snapshot file, rewritten after every accepted change
    pub snapshot_path: PathBuf,

    /// Players in a freshly generated roster
    pub player_count: u32,

    /// Whether revive requests are honored
    pub allow_revive: bool,

    /// Suppress all detonate transmissions (roster and broadcasts still run)
    pub disable_kills: bool,

    /// Serial baud rate
    pub baud_rate: u32,

    /// Interval of the periodic detonate re-send
    pub resend_interval: Duration,
}

impl ServerConfig {
    /// Create a config for the given serial device, with defaults elsewhere
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            bind_addr: "0.0.0.0:8765".parse().unwrap(),
            snapshot_path: PathBuf::from("state.json"),
            player_count: DEFAULT_PLAYER_COUNT,
            allow_revive: false,
            disable_kills: false,
            baud_rate: DEFAULT_BAUD_RATE,
            resend_interval: Duration::from_secs(1),
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the snapshot path
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    /// Set the default player count
    pub fn player_count(mut self, count: u32) -> Self {
        self.player_count = count;
        self
    }

    /// Allow or disallow revive requests
    pub fn allow_revive(mut self, allow: bool) -> Self {
        self.allow_revive = allow;
        self
    }

    /// Suppress or enable detonate transmissions
    pub fn disable_kills(mut self, disable: bool) -> Self {
        self.disable_kills = disable;
        self
    }

    /// Set the serial baud rate
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the periodic re-send interval
    pub fn resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval = interval;
        self
    }
}
