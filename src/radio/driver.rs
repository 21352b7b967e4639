//! Transceiver driver interface.
//!
//! The protocol core never talks to a chip directly. Everything it needs from
//! the radio (init, parameter changes, TX, RX arming, frame readout and link
//! metrics) goes through the [`Transceiver`] trait, so the receive controller
//! and the reconfiguration handler contain no per-chip branches.
//!
//! Two backends implement it:
//! - [`SimulatedRadio`](super::SimulatedRadio) for host runs and tests
//! - `Sx1262Radio` for the ESP32 firmware (`esp32` feature)

use super::{InterruptFlags, LinkMetrics};
use crate::config::{LdroMode, RadioSession};
use std::fmt;

/// Chip family behind the transceiver.
///
/// Families differ in accepted parameter ranges and optional features (OOK,
/// raw register access), never in the calls the core makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChipFamily {
    /// SX1276/77/78 and RFM9x modules (DIO0 interrupt, OOK capable).
    Sx127x,
    /// SX1261/62/68 modules (DIO1 interrupt, TCXO, no OOK).
    Sx126x,
}

impl ChipFamily {
    /// Name used in log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sx127x => "SX127x",
            Self::Sx126x => "SX126x",
        }
    }
}

/// Status reported alongside a frame read from the radio FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Frame received intact.
    Ok,
    /// Payload CRC did not match.
    CrcMismatch,
    /// LoRa explicit header was corrupted.
    HeaderDamaged,
    /// Any other chip-reported status code.
    Other(i16),
}

/// A single radio parameter change.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// Carrier frequency in MHz (offset already applied).
    Frequency(f32),
    /// LoRa bandwidth in kHz.
    Bandwidth(f32),
    /// LoRa spreading factor.
    SpreadingFactor(u8),
    /// LoRa coding rate denominator (5..=8 for 4/5..4/8).
    CodingRate(u8),
    /// Payload CRC on/off.
    Crc(bool),
    /// LoRa sync word.
    LoRaSyncWord(u8),
    /// Low data rate optimization.
    Ldro(LdroMode),
    /// Preamble length in symbols.
    PreambleLength(u16),
    /// FSK bit rate in kbps.
    BitRate(f32),
    /// FSK frequency deviation in kHz.
    FrequencyDeviation(f32),
    /// FSK receiver bandwidth in kHz.
    RxBandwidth(f32),
    /// FSK sync word bytes.
    FskSyncWord(Vec<u8>),
    /// FSK data shaping (Gaussian BT, raw driver value).
    DataShaping(u8),
    /// OOK modulation and its shaping value.
    Ook { enabled: bool, shaping: u8 },
    /// Masked register write: bits `msb..=lsb` of `reg` set to `value`.
    RegisterField {
        reg: u8,
        value: u8,
        msb: u8,
        lsb: u8,
        check_interval: u8,
    },
}

impl Parameter {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Frequency(_) => "frequency",
            Self::Bandwidth(_) => "bandwidth",
            Self::SpreadingFactor(_) => "spreading factor",
            Self::CodingRate(_) => "coding rate",
            Self::Crc(_) => "crc",
            Self::LoRaSyncWord(_) => "sync word",
            Self::Ldro(_) => "ldro",
            Self::PreambleLength(_) => "preamble length",
            Self::BitRate(_) => "bit rate",
            Self::FrequencyDeviation(_) => "frequency deviation",
            Self::RxBandwidth(_) => "rx bandwidth",
            Self::FskSyncWord(_) => "fsk sync word",
            Self::DataShaping(_) => "data shaping",
            Self::Ook { .. } => "ook",
            Self::RegisterField { .. } => "register field",
        }
    }
}

/// Transceiver driver errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverError {
    /// Parameter value outside the chip's accepted range.
    OutOfRange { param: &'static str },
    /// Operation not available on this chip family.
    Unsupported(&'static str),
    /// Radio has not been initialized.
    NotInitialized,
    /// Radio busy or operation timeout.
    Timeout,
    /// Frame exceeds the radio FIFO.
    PacketTooLarge { size: usize, max: usize },
    /// SPI/GPIO bus failure.
    Bus(String),
    /// Raw chip status code.
    Code(i16),
}

impl DriverError {
    /// Signed status code reported upstream ("failed, code N").
    pub fn code(&self) -> i16 {
        match self {
            Self::OutOfRange { param } => match *param {
                "frequency" => -12,
                "bandwidth" | "rx bandwidth" => -8,
                "spreading factor" => -9,
                "coding rate" => -10,
                "preamble length" => -18,
                "bit rate" => -101,
                "frequency deviation" => -102,
                "sync word" | "fsk sync word" => -105,
                "data shaping" | "ook" => -106,
                _ => -1,
            },
            Self::Unsupported(_) => -804,
            Self::NotInitialized => -20,
            Self::Timeout => -5,
            Self::PacketTooLarge { .. } => -4,
            Self::Bus(_) => -2,
            Self::Code(code) => *code,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { param } => write!(f, "{} out of range", param),
            Self::Unsupported(what) => write!(f, "{} not supported by this radio", what),
            Self::NotInitialized => write!(f, "radio not initialized"),
            Self::Timeout => write!(f, "radio timeout"),
            Self::PacketTooLarge { size, max } => {
                write!(f, "packet too large: {} bytes (max {})", size, max)
            }
            Self::Bus(msg) => write!(f, "bus error: {}", msg),
            Self::Code(code) => write!(f, "driver status {}", code),
        }
    }
}

impl std::error::Error for DriverError {}

/// Radio transceiver capability set used by the protocol core.
pub trait Transceiver {
    /// Chip family of this transceiver.
    fn family(&self) -> ChipFamily;

    /// Full (re)initialization for the session's modem mode.
    ///
    /// Applies every field of `session` and tunes to
    /// [`RadioSession::tuned_frequency`].
    fn initialize(&mut self, session: &RadioSession) -> Result<(), DriverError>;

    /// Change a single parameter.
    fn set_parameter(&mut self, param: Parameter) -> Result<(), DriverError>;

    /// Transmit a frame (blocking until TX done).
    fn transmit(&mut self, data: &[u8]) -> Result<(), DriverError>;

    /// Put the radio back into continuous receive.
    fn start_receive(&mut self) -> Result<(), DriverError>;

    /// Read the pending frame and the status the chip reported for it.
    fn read_frame(&mut self) -> Result<(Vec<u8>, DriverStatus), DriverError>;

    /// Link metrics of the last frame read.
    fn link_metrics(&self) -> LinkMetrics;

    /// Route the chip's RX-done line to `flags`.
    fn attach_interrupt(&mut self, flags: InterruptFlags) -> Result<(), DriverError>;

    /// Leave receive so the synthesizer can be retuned.
    ///
    /// The chip must still accept SPI commands afterwards: SX127x parts go
    /// to sleep mode, SX126x parts to standby (their sleep mode holds BUSY
    /// high until NSS is toggled).
    fn standby(&mut self) -> Result<(), DriverError>;

    /// Raw register read.
    fn read_register(&mut self, reg: u8) -> Result<u8, DriverError>;

    /// Raw register write.
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(DriverError::OutOfRange { param: "frequency" }.code(), -12);
        assert_eq!(DriverError::OutOfRange { param: "bit rate" }.code(), -101);
        assert_eq!(DriverError::Code(-707).code(), -707);
        assert_eq!(DriverError::NotInitialized.code(), -20);
    }

    #[test]
    fn test_error_display() {
        let err = DriverError::OutOfRange { param: "bandwidth" };
        assert_eq!(err.to_string(), "bandwidth out of range");
        let err = DriverError::PacketTooLarge { size: 300, max: 255 };
        assert_eq!(err.to_string(), "packet too large: 300 bytes (max 255)");
    }

    #[test]
    fn test_parameter_names_match_error_codes() {
        let param = Parameter::SpreadingFactor(13);
        let err = DriverError::OutOfRange { param: param.name() };
        assert_eq!(err.code(), -9);
    }
}
