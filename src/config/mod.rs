//! Station and modem configuration.
//!
//! # Components
//!
//! - [`session`] - live modem parameters ([`RadioSession`]) and packet filter
//! - [`station`] - board wiring, protocol timing and JSON persistence

mod session;
mod station;

use std::fmt;

pub use session::{LdroMode, ModemMode, RadioSession, OOK_DISABLED};
pub use station::{default_config_path, BoardConfig, ProtocolTiming, StationConfig};

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Reading or writing the configuration file failed.
    Io(String),
    /// File content is not valid configuration JSON.
    Parse(String),
    /// A value is outside what any supported radio accepts.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "config I/O error: {}", msg),
            Self::Parse(msg) => write!(f, "config parse error: {}", msg),
            Self::Invalid(msg) => write!(f, "invalid config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
