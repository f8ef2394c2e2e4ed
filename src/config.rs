use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Serialize;

use crate::error::{RcmpError, RcmpResult};

pub const DEFAULT_PREFIX: &str = "/rcmp";
pub const DEFAULT_PORT: u16 = 7000;
pub const DEFAULT_IP: &str = "127.0.0.1";

#[derive(Clone, Debug, Serialize)]
/// Runtime settings for the player, filled in from the command line
pub struct PlayerConfig {
    /// Address the OSC server binds to
    pub ip: String,
    /// UDP port of the OSC server
    pub port: u16,
    /// Path prefix every OSC command must start with
    pub prefix: String,
    /// MIDI output, either a position in the device list or an exact name
    pub output: String,
    /// Start playback of the selected file immediately
    pub play: bool,
    /// Exit after the first file finishes playing
    pub auto_exit: bool,
    /// Pause between note-offs when releasing stuck notes, in milliseconds
    pub note_off_spacing_ms: u64,
    /// Pause after every 10 keys during a full device reset, in milliseconds
    pub reset_throttle_ms: u64,
    /// OSC socket read timeout, bounds how long shutdown waits on the socket
    pub receive_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            ip: DEFAULT_IP.to_string(),
            port: DEFAULT_PORT,
            prefix: DEFAULT_PREFIX.to_string(),
            output: "0".to_string(),
            play: false,
            auto_exit: false,
            note_off_spacing_ms: 1,
            reset_throttle_ms: 1,
            receive_timeout_ms: 100,
        }
    }
}

impl PlayerConfig {
    /// Socket address of the OSC server
    pub fn osc_address(&self) -> RcmpResult<SocketAddr> {
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|_| RcmpError::BadArgument(format!("invalid ip address '{}'", self.ip)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn note_off_spacing(&self) -> Duration {
        Duration::from_millis(self.note_off_spacing_ms)
    }

    pub fn reset_throttle(&self) -> Duration {
        Duration::from_millis(self.reset_throttle_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        // A zero read timeout is rejected by the socket, keep at least 1ms
        Duration::from_millis(self.receive_timeout_ms.max(1))
    }
}

/// Normalize an OSC prefix to exactly one leading '/' and no trailing '/'
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_PREFIX.to_string();
    }
    format!("/{}", trimmed)
}
