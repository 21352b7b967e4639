//! Station configuration store.
//!
//! Board wiring, the default modem session and protocol timing, stored as
//! JSON. Uses `~/.gs-radio/station.json` by default.
//!
//! # Usage
//!
//! ```ignore
//! use gs_radio_core::config::StationConfig;
//!
//! let config = StationConfig::load_or_default()?;
//! log::info!("Radio family: {}", config.board.family().as_str());
//! ```

use super::{ConfigError, RadioSession};
use crate::radio::ChipFamily;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Board wiring of the radio module.
///
/// Keys follow the legacy board template (`radio`, `lNSS`, `lDIO0`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// `true` for an SX127x module, `false` for SX126x.
    #[serde(rename = "radio")]
    pub sx127x: bool,
    #[serde(rename = "lNSS")]
    pub nss: u8,
    #[serde(rename = "lDIO0")]
    pub dio0: u8,
    #[serde(rename = "lDIO1")]
    pub dio1: u8,
    #[serde(rename = "lBUSSY")]
    pub busy: u8,
    #[serde(rename = "lRST")]
    pub reset: u8,
    #[serde(rename = "lMISO")]
    pub miso: u8,
    #[serde(rename = "lMOSI")]
    pub mosi: u8,
    #[serde(rename = "lSCK")]
    pub sck: u8,
    /// TCXO supply voltage (SX126x only, 0 = crystal).
    #[serde(rename = "lTCXOV")]
    pub tcxo_voltage: f32,
}

impl Default for BoardConfig {
    /// LILYGO T3-S3 wiring with an SX1262.
    fn default() -> Self {
        Self {
            sx127x: false,
            nss: 10,
            dio0: 0,
            dio1: 1,
            busy: 4,
            reset: 5,
            miso: 13,
            mosi: 11,
            sck: 12,
            tcxo_voltage: 1.8,
        }
    }
}

impl BoardConfig {
    /// Chip family selected by this board.
    pub fn family(&self) -> ChipFamily {
        if self.sx127x {
            ChipFamily::Sx127x
        } else {
            ChipFamily::Sx126x
        }
    }
}

/// Delays and timeouts of the acknowledgement protocols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolTiming {
    /// Pause between a frame and its redundant copy (ms).
    pub redundant_delay_ms: u64,
    /// Inactivity that flushes a bulk transfer (s).
    pub bulk_timeout_secs: u64,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            redundant_delay_ms: 500,
            bulk_timeout_secs: 60,
        }
    }
}

impl ProtocolTiming {
    /// Redundant-send delay.
    pub fn redundant_delay(&self) -> Duration {
        Duration::from_millis(self.redundant_delay_ms)
    }

    /// Bulk-transfer inactivity timeout.
    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_secs(self.bulk_timeout_secs)
    }
}

/// Complete station configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub board: BoardConfig,
    #[serde(rename = "modem")]
    pub session: RadioSession,
    /// Whether this station may transmit at all.
    pub allow_tx: bool,
    pub timing: ProtocolTiming,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            session: RadioSession::default(),
            allow_tx: true,
            timing: ProtocolTiming::default(),
        }
    }
}

impl StationConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.session.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No station config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        let config = Self::from_json(&json)?;
        info!("Loaded station config from {:?}", path);
        Ok(config)
    }

    /// Load configuration from the default path.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = default_config_path().map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::load_from(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        fs::write(path, self.to_json()?).map_err(|e| ConfigError::Io(e.to_string()))?;
        info!("Station config saved to {:?}", path);
        Ok(())
    }
}

/// Get the default configuration file path.
///
/// Returns `~/.gs-radio/station.json`
pub fn default_config_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".gs-radio").join("station.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModemMode;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Counter to ensure unique test files even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_config_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir()
            .join(format!("gs-radio-test-{}-{}", pid, id))
            .join("station.json")
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = unique_config_path();
        let mut config = StationConfig::default();
        config.session.mode = ModemMode::Fsk;
        config.allow_tx = false;
        config.save_to(&path).expect("Failed to save");

        let loaded = StationConfig::load_from(&path).expect("Failed to load");
        assert_eq!(loaded, config);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = unique_config_path();
        let config = StationConfig::load_from(&path).unwrap();
        assert_eq!(config, StationConfig::default());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let path = unique_config_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let result = StationConfig::load_from(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_legacy_board_template_keys() {
        let json = r#"{"board": {"radio": true, "lNSS": 18, "lDIO0": 26, "lDIO1": 33, "lRST": 14}}"#;
        let config = StationConfig::from_json(json).unwrap();
        assert_eq!(config.board.family(), ChipFamily::Sx127x);
        assert_eq!(config.board.nss, 18);
        assert_eq!(config.board.dio0, 26);
        assert_eq!(config.board.reset, 14);
    }

    #[test]
    fn test_invalid_session_rejected() {
        let json = r#"{"modem": {"cr": 9}}"#;
        assert!(matches!(
            StationConfig::from_json(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_timing_defaults() {
        let timing = ProtocolTiming::default();
        assert_eq!(timing.redundant_delay(), Duration::from_millis(500));
        assert_eq!(timing.bulk_timeout(), Duration::from_secs(60));
    }
}
