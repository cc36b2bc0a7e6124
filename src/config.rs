//! Server configuration
//!
//! Command line flags with environment variable fallbacks, validated and
//! converted into the per-connection [`ConnectionSettings`].

use std::time::Duration;

use clap::Parser;

use crate::error::AppError;
use crate::lobby::DEFAULT_MAX_LOBBY_CAPACITY;
use crate::mailbox::DEFAULT_MAILBOX_CAPACITY;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Command line configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "lobby_hub", version, about = "WebSocket session broker with named lobbies")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LOBBY_HUB_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Request path accepted for the WebSocket upgrade
    #[arg(long, env = "LOBBY_HUB_PATH", default_value = "/ws")]
    pub path: String,

    /// Outbound messages buffered per session before it is dropped
    #[arg(long, env = "LOBBY_HUB_MAILBOX_CAPACITY", default_value_t = DEFAULT_MAILBOX_CAPACITY)]
    pub mailbox_capacity: usize,

    /// Seconds between keep-alive pings
    #[arg(long, env = "LOBBY_HUB_PING_PERIOD", default_value_t = 15)]
    pub ping_period_secs: u64,

    /// Seconds of peer silence before the connection is considered dead
    #[arg(long, env = "LOBBY_HUB_PONG_WAIT", default_value_t = 20)]
    pub pong_wait_secs: u64,

    /// Seconds allowed for a single write to the peer
    #[arg(long, env = "LOBBY_HUB_WRITE_WAIT", default_value_t = 20)]
    pub write_wait_secs: u64,

    /// Maximum inbound message size in bytes
    #[arg(long, env = "LOBBY_HUB_MAX_MESSAGE_SIZE", default_value_t = 4096)]
    pub max_message_size: usize,

    /// Largest lobby capacity a client may request
    #[arg(long, env = "LOBBY_HUB_MAX_LOBBY_CAPACITY", default_value_t = DEFAULT_MAX_LOBBY_CAPACITY)]
    pub max_lobby_capacity: usize,
}

impl Config {
    /// Validate and build the per-connection settings
    pub fn connection_settings(&self) -> Result<ConnectionSettings, AppError> {
        if self.mailbox_capacity == 0 {
            return Err(AppError::InvalidConfig(
                "mailbox capacity must be positive".to_string(),
            ));
        }
        if self.max_lobby_capacity == 0 {
            return Err(AppError::InvalidConfig(
                "max lobby capacity must be positive".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(AppError::InvalidConfig(
                "max message size must be positive".to_string(),
            ));
        }
        if self.ping_period_secs == 0 || self.write_wait_secs == 0 {
            return Err(AppError::InvalidConfig(
                "ping period and write wait must be positive".to_string(),
            ));
        }
        if self.ping_period_secs >= self.pong_wait_secs {
            return Err(AppError::InvalidConfig(format!(
                "ping period ({}s) must be less than pong wait ({}s)",
                self.ping_period_secs, self.pong_wait_secs
            )));
        }
        if !self.path.starts_with('/') {
            return Err(AppError::InvalidConfig(format!(
                "path '{}' must start with '/'",
                self.path
            )));
        }

        Ok(ConnectionSettings {
            path: self.path.clone(),
            mailbox_capacity: self.mailbox_capacity,
            ping_period: Duration::from_secs(self.ping_period_secs),
            pong_wait: Duration::from_secs(self.pong_wait_secs),
            write_wait: Duration::from_secs(self.write_wait_secs),
            max_message_size: self.max_message_size,
        })
    }
}

/// Per-connection settings shared by every connection
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Upgrade path
    pub path: String,
    /// Mailbox capacity per session
    pub mailbox_capacity: usize,
    /// Keep-alive ping period, less than `pong_wait`
    pub ping_period: Duration,
    /// Rolling read deadline
    pub pong_wait: Duration,
    /// Deadline for each outbound write
    pub write_wait: Duration,
    /// Maximum inbound message size
    pub max_message_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            ping_period: Duration::from_secs(15),
            pong_wait: Duration::from_secs(20),
            write_wait: Duration::from_secs(20),
            max_message_size: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["lobby_hub"]).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR);

        let settings = config.connection_settings().unwrap();
        let defaults = ConnectionSettings::default();
        assert_eq!(settings.path, defaults.path);
        assert_eq!(settings.ping_period, defaults.ping_period);
        assert_eq!(settings.pong_wait, defaults.pong_wait);
        assert_eq!(settings.write_wait, defaults.write_wait);
        assert_eq!(settings.mailbox_capacity, 256);
        assert_eq!(settings.max_message_size, 4096);
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "lobby_hub",
            "--addr",
            "0.0.0.0:9000",
            "--mailbox-capacity",
            "8",
            "--ping-period-secs",
            "5",
            "--pong-wait-secs",
            "10",
        ])
        .unwrap();

        assert_eq!(config.addr, "0.0.0.0:9000");
        let settings = config.connection_settings().unwrap();
        assert_eq!(settings.mailbox_capacity, 8);
        assert_eq!(settings.ping_period, Duration::from_secs(5));
        assert_eq!(settings.pong_wait, Duration::from_secs(10));
    }

    #[test]
    fn test_ping_period_must_be_below_pong_wait() {
        let config = Config::try_parse_from([
            "lobby_hub",
            "--ping-period-secs",
            "20",
            "--pong-wait-secs",
            "20",
        ])
        .unwrap();

        assert!(matches!(
            config.connection_settings(),
            Err(AppError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_mailbox_rejected() {
        let config = Config::try_parse_from(["lobby_hub", "--mailbox-capacity", "0"]).unwrap();
        assert!(config.connection_settings().is_err());
    }

    #[test]
    fn test_max_lobby_capacity() {
        let config = Config::try_parse_from(["lobby_hub", "--max-lobby-capacity", "8"]).unwrap();
        assert_eq!(config.max_lobby_capacity, 8);
        assert!(config.connection_settings().is_ok());

        let config = Config::try_parse_from(["lobby_hub", "--max-lobby-capacity", "0"]).unwrap();
        assert!(config.connection_settings().is_err());
    }
}
