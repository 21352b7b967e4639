//! Modem session parameters.
//!
//! [`RadioSession`] mirrors what the transceiver currently holds. Only the
//! reconfiguration handler mutates it, and only after the driver accepted
//! the change.
//!
//! Field names on the wire follow the legacy station JSON (`modem_mode`,
//! `bw`, `sf`, `cr`, `sw`, `pl`, `fldro`, `br`, `fd`, `OOK`, `fsw`, ...), so
//! existing station files load unchanged.

use super::ConfigError;
use crate::protocol::PacketFilter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Modem modulation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModemMode {
    #[serde(rename = "LoRa")]
    LoRa,
    #[serde(rename = "FSK")]
    Fsk,
}

impl fmt::Display for ModemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoRa => write!(f, "LoRa"),
            Self::Fsk => write!(f, "FSK"),
        }
    }
}

/// Low data rate optimization mode.
///
/// Serialized as the legacy integer: 0 = off, 1 = on, 2 = auto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LdroMode {
    Off,
    On,
    Auto,
}

impl TryFrom<u8> for LdroMode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            2 => Ok(Self::Auto),
            other => Err(ConfigError::Invalid(format!("ldro mode {}", other))),
        }
    }
}

impl From<LdroMode> for u8 {
    fn from(mode: LdroMode) -> u8 {
        match mode {
            LdroMode::Off => 0,
            LdroMode::On => 1,
            LdroMode::Auto => 2,
        }
    }
}

/// OOK value meaning "OOK disabled" in [`RadioSession::ook`].
pub const OOK_DISABLED: u8 = 255;

/// Full modem parameter set of the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSession {
    /// Satellite being tracked (informational).
    pub satellite: String,
    #[serde(rename = "modem_mode")]
    pub mode: ModemMode,
    /// Frequency in MHz, without the station offset.
    #[serde(rename = "freq")]
    pub frequency: f32,
    /// LoRa bandwidth or FSK RX bandwidth in kHz.
    #[serde(rename = "bw")]
    pub bandwidth: f32,
    #[serde(rename = "sf")]
    pub spreading_factor: u8,
    #[serde(rename = "cr")]
    pub coding_rate: u8,
    #[serde(rename = "sw")]
    pub sync_word: u8,
    /// TX power in dBm.
    pub power: i8,
    #[serde(rename = "pl")]
    pub preamble_length: u16,
    /// LNA gain (0 = AGC).
    pub gain: u8,
    #[serde(rename = "fldro")]
    pub ldro: LdroMode,
    pub crc: bool,
    /// FSK bit rate in kbps.
    #[serde(rename = "br")]
    pub bitrate: f32,
    /// FSK frequency deviation in kHz.
    #[serde(rename = "fd")]
    pub freq_dev: f32,
    /// FSK data shaping; [`OOK_DISABLED`] selects plain FSK.
    #[serde(rename = "OOK")]
    pub ook: u8,
    #[serde(rename = "fsw")]
    pub fsk_sync_word: Vec<u8>,
    /// Station-specific crystal correction in MHz.
    #[serde(rename = "freqOffset")]
    pub freq_offset: f32,
    pub filter: PacketFilter,
}

impl Default for RadioSession {
    fn default() -> Self {
        Self {
            satellite: String::new(),
            mode: ModemMode::LoRa,
            frequency: 436.703,
            bandwidth: 250.0,
            spreading_factor: 10,
            coding_rate: 5,
            sync_word: 0x12,
            power: 5,
            preamble_length: 8,
            gain: 0,
            ldro: LdroMode::Auto,
            crc: true,
            bitrate: 9.6,
            freq_dev: 5.0,
            ook: OOK_DISABLED,
            fsk_sync_word: vec![0x2D, 0xD4],
            freq_offset: 0.0,
            filter: PacketFilter::default(),
        }
    }
}

impl RadioSession {
    /// Frequency the radio is actually tuned to (offset applied).
    pub fn tuned_frequency(&self) -> f32 {
        self.frequency + self.freq_offset
    }

    /// Whether the FSK modem runs in OOK mode.
    pub fn ook_enabled(&self) -> bool {
        self.ook != OOK_DISABLED
    }

    /// Data shaping programmed after an FSK init (`0` for none).
    pub fn data_shaping(&self) -> u8 {
        if self.ook_enabled() {
            self.ook
        } else {
            0
        }
    }

    /// Sanity-check values that no chip would accept.
    ///
    /// Chip-specific ranges are enforced by the driver; this only rejects
    /// station files that are obviously broken.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frequency {} MHz",
                self.frequency
            )));
        }
        if !self.bandwidth.is_finite() || self.bandwidth <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "bandwidth {} kHz",
                self.bandwidth
            )));
        }
        if !(5..=12).contains(&self.spreading_factor) {
            return Err(ConfigError::Invalid(format!(
                "spreading factor {}",
                self.spreading_factor
            )));
        }
        if !(5..=8).contains(&self.coding_rate) {
            return Err(ConfigError::Invalid(format!(
                "coding rate {}",
                self.coding_rate
            )));
        }
        if self.fsk_sync_word.len() > 8 {
            return Err(ConfigError::Invalid(format!(
                "fsk sync word of {} bytes",
                self.fsk_sync_word.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RadioSession::default().validate().is_ok());
    }

    #[test]
    fn test_tuned_frequency_applies_offset() {
        let session = RadioSession {
            frequency: 436.7,
            freq_offset: 0.002,
            ..Default::default()
        };
        assert!((session.tuned_frequency() - 436.702).abs() < 1e-4);
    }

    #[test]
    fn test_ldro_legacy_integers() {
        assert_eq!(LdroMode::try_from(0).unwrap(), LdroMode::Off);
        assert_eq!(LdroMode::try_from(1).unwrap(), LdroMode::On);
        assert_eq!(LdroMode::try_from(2).unwrap(), LdroMode::Auto);
        assert!(LdroMode::try_from(3).is_err());
        assert_eq!(u8::from(LdroMode::Auto), 2);
    }

    #[test]
    fn test_legacy_json_field_names() {
        let json = r#"{
            "modem_mode": "FSK",
            "freq": 145.9,
            "bw": 117.3,
            "br": 9.6,
            "fd": 3.5,
            "OOK": 255,
            "fldro": 1,
            "fsw": [1, 2, 3],
            "filter": [2, 0, 192, 157]
        }"#;
        let session: RadioSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.mode, ModemMode::Fsk);
        assert_eq!(session.ldro, LdroMode::On);
        assert_eq!(session.fsk_sync_word, vec![1, 2, 3]);
        assert!(!session.ook_enabled());
        assert_eq!(session.filter.offset(), 0);
        assert_eq!(session.filter.expected(), &[192, 157]);
        // Unlisted fields keep their defaults
        assert_eq!(session.spreading_factor, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let session = RadioSession {
            spreading_factor: 13,
            ..Default::default()
        };
        assert!(matches!(session.validate(), Err(ConfigError::Invalid(_))));

        let session = RadioSession {
            frequency: f32::NAN,
            ..Default::default()
        };
        assert!(session.validate().is_err());
    }
}
