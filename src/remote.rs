//! Remote reconfiguration and command dispatch.
//!
//! Commands arrive from the network server as a kind string and a raw
//! payload. Scalars are ASCII decimal (`"436.703"`), tuples are JSON arrays
//! (`"[436.7,125,9,5,18,5,120,8,0]"`).
//!
//! Parsing never touches the radio, so a malformed payload leaves both the
//! radio and the session as they were. Applying a parameter always returns
//! the radio to receive with the interrupt re-attached, whether or not the
//! chip accepted the value; the session only changes on success.

use crate::clock::Clock;
use crate::config::{ConfigError, LdroMode, ModemMode, RadioSession, OOK_DISABLED};
use crate::controller::{ReceiveController, TxError};
use crate::protocol::{PacketFilter, TcCode, Telecommand};
use crate::radio::{DriverError, Parameter, Transceiver};
use crate::transport::FramePublisher;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Remote command errors.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Command kind not recognized.
    UnknownKind(String),
    /// Payload could not be decoded for this kind.
    Malformed { kind: String, reason: String },
    /// Radio refused the change.
    Driver(DriverError),
    /// Transmission failed.
    Tx(TxError),
}

impl RemoteError {
    /// Signed status code reported back to the server.
    pub fn code(&self) -> i16 {
        match self {
            Self::Driver(e) | Self::Tx(TxError::Driver(e)) => e.code(),
            _ => -1,
        }
    }

    fn malformed(kind: &str, reason: impl fmt::Display) -> Self {
        Self::Malformed {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(kind) => write!(f, "unknown command '{}'", kind),
            Self::Malformed { kind, reason } => write!(f, "bad '{}' payload: {}", kind, reason),
            Self::Driver(e) => write!(f, "failed, code {} ({})", e.code(), e),
            Self::Tx(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<DriverError> for RemoteError {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

impl From<TxError> for RemoteError {
    fn from(e: TxError) -> Self {
        Self::Tx(e)
    }
}

/// What an applied command produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply {
    Applied,
    /// Value of a register read.
    Register(u8),
    Transmitted,
}

/// Parameters of a full LoRa re-initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct LoRaBegin {
    pub frequency: f32,
    pub bandwidth: f32,
    pub spreading_factor: u8,
    pub coding_rate: u8,
    pub sync_word: u8,
    pub power: i8,
    pub current_limit: u8,
    pub preamble_length: u16,
    pub gain: u8,
}

/// Parameters of a full FSK re-initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct FskBegin {
    pub frequency: f32,
    pub bitrate: f32,
    pub freq_dev: f32,
    pub rx_bandwidth: f32,
    pub power: i8,
    pub current_limit: u8,
    pub preamble_length: u16,
    /// Data shaping, [`OOK_DISABLED`] for plain FSK.
    pub ook: u8,
}

/// A decoded remote command.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    Frequency(f32),
    Bandwidth(f32),
    SpreadingFactor(u8),
    CodingRate(u8),
    Crc(bool),
    LoRaSyncWord(u8),
    Ldro(LdroMode),
    PreambleLength(u16),
    BeginLoRa(LoRaBegin),
    BeginFsk(FskBegin),
    BitRate(f32),
    FrequencyDeviation(f32),
    FskBandwidth(f32),
    FskSyncWord(Vec<u8>),
    Ook { enabled: bool, shaping: u8 },
    RegisterField {
        reg: u8,
        value: u8,
        msb: u8,
        lsb: u8,
        check_interval: u8,
    },
    RegisterWrite { reg: u8, value: u8 },
    RegisterRead(u8),
    Filter(PacketFilter),
    FrequencyOffset(f32),
    /// Re-initialize with the given session, or the current one.
    Begin(Option<Box<RadioSession>>),
    Transmit(Vec<u8>),
    TestPacket,
    Telecommand(Telecommand),
}

impl RemoteCommand {
    /// Decode a command of `kind` from its payload.
    pub fn parse(kind: &str, payload: &[u8]) -> Result<Self, RemoteError> {
        let command = match kind {
            "freq" => Self::Frequency(scalar(kind, payload)?),
            "bw" => Self::Bandwidth(scalar(kind, payload)?),
            "sf" => Self::SpreadingFactor(scalar(kind, payload)?),
            "cr" => Self::CodingRate(scalar(kind, payload)?),
            "crc" => Self::Crc(flag(kind, payload)?),
            "lsw" => Self::LoRaSyncWord(byte(kind, payload)?),
            "fldro" => Self::Ldro(if flag(kind, payload)? {
                LdroMode::On
            } else {
                LdroMode::Off
            }),
            "aldro" => Self::Ldro(LdroMode::Auto),
            "ldro" => {
                let mode = LdroMode::try_from(byte(kind, payload)?)
                    .map_err(|e: ConfigError| RemoteError::malformed(kind, e))?;
                Self::Ldro(mode)
            }
            "pl" => Self::PreambleLength(scalar(kind, payload)?),
            "begin_lora" => {
                let (
                    frequency,
                    bandwidth,
                    spreading_factor,
                    coding_rate,
                    sync_word,
                    power,
                    current_limit,
                    preamble_length,
                    gain,
                ) = json(kind, payload)?;
                Self::BeginLoRa(LoRaBegin {
                    frequency,
                    bandwidth,
                    spreading_factor,
                    coding_rate,
                    sync_word,
                    power,
                    current_limit,
                    preamble_length,
                    gain,
                })
            }
            "begin_fsk" => {
                let (
                    frequency,
                    bitrate,
                    freq_dev,
                    rx_bandwidth,
                    power,
                    current_limit,
                    preamble_length,
                    ook,
                ) = json(kind, payload)?;
                Self::BeginFsk(FskBegin {
                    frequency,
                    bitrate,
                    freq_dev,
                    rx_bandwidth,
                    power,
                    current_limit,
                    preamble_length,
                    ook,
                })
            }
            "br" => Self::BitRate(scalar(kind, payload)?),
            "fd" => Self::FrequencyDeviation(scalar(kind, payload)?),
            "fbw" => Self::FskBandwidth(scalar(kind, payload)?),
            "fsw" => Self::FskSyncWord(sync_word_bytes(json(kind, payload)?)),
            "fook" => {
                let (enabled, shaping): (Value, u8) = json(kind, payload)?;
                Self::Ook {
                    enabled: json_flag(kind, &enabled)?,
                    shaping,
                }
            }
            "reg_set" => {
                let fields: Vec<u8> = json(kind, payload)?;
                match fields[..] {
                    [reg, value, msb, lsb] => Self::RegisterField {
                        reg,
                        value,
                        msb,
                        lsb,
                        check_interval: 0,
                    },
                    [reg, value, msb, lsb, check_interval] => Self::RegisterField {
                        reg,
                        value,
                        msb,
                        lsb,
                        check_interval,
                    },
                    _ => {
                        return Err(RemoteError::malformed(
                            kind,
                            "expected [reg, value, msb, lsb, (check_interval)]",
                        ))
                    }
                }
            }
            "reg_write" => {
                let (reg, value) = json(kind, payload)?;
                Self::RegisterWrite { reg, value }
            }
            "reg_read" => Self::RegisterRead(byte(kind, payload)?),
            "filter" => {
                let compact: Vec<u8> = json(kind, payload)?;
                let filter = PacketFilter::from_compact(&compact)
                    .map_err(|e| RemoteError::malformed(kind, e))?;
                Self::Filter(filter)
            }
            "freq_offset" => Self::FrequencyOffset(scalar(kind, payload)?),
            "begin" => {
                if text(kind, payload)?.is_empty() {
                    Self::Begin(None)
                } else {
                    let session: RadioSession = json(kind, payload)?;
                    session
                        .validate()
                        .map_err(|e| RemoteError::malformed(kind, e))?;
                    Self::Begin(Some(Box::new(session)))
                }
            }
            "tx" => Self::Transmit(json(kind, payload)?),
            "test" => Self::TestPacket,
            "send_data" => Self::Telecommand(Telecommand::new(TcCode::SendData)),
            "send_config" => Self::Telecommand(Telecommand::new(TcCode::SendConfig)),
            "send_telemetry" => Self::Telecommand(Telecommand::new(TcCode::SendTelemetry)),
            "tc" => Self::Telecommand(telecommand(kind, payload)?),
            other => return Err(RemoteError::UnknownKind(other.to_string())),
        };
        Ok(command)
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Frequency(_) => "frequency",
            Self::Bandwidth(_) => "bandwidth",
            Self::SpreadingFactor(_) => "spreading factor",
            Self::CodingRate(_) => "coding rate",
            Self::Crc(_) => "crc",
            Self::LoRaSyncWord(_) => "lora sync word",
            Self::Ldro(_) => "ldro",
            Self::PreambleLength(_) => "preamble length",
            Self::BeginLoRa(_) => "begin lora",
            Self::BeginFsk(_) => "begin fsk",
            Self::BitRate(_) => "bit rate",
            Self::FrequencyDeviation(_) => "frequency deviation",
            Self::FskBandwidth(_) => "fsk bandwidth",
            Self::FskSyncWord(_) => "fsk sync word",
            Self::Ook { .. } => "ook",
            Self::RegisterField { .. } => "register field",
            Self::RegisterWrite { .. } => "register write",
            Self::RegisterRead(_) => "register read",
            Self::Filter(_) => "filter",
            Self::FrequencyOffset(_) => "frequency offset",
            Self::Begin(_) => "begin",
            Self::Transmit(_) => "tx",
            Self::TestPacket => "test packet",
            Self::Telecommand(_) => "telecommand",
        }
    }

    /// Apply the command to a station.
    pub fn apply<T, P, C>(
        self,
        station: &mut ReceiveController<T, P, C>,
    ) -> Result<CommandReply, RemoteError>
    where
        T: Transceiver,
        P: FramePublisher,
        C: Clock,
    {
        let name = self.name();
        let offset = station.session().freq_offset;

        match self {
            Self::Frequency(mhz) => {
                info!("Set frequency: {:.3} MHz", mhz);
                station.reconfigure(
                    name,
                    |radio| {
                        radio.standby()?;
                        radio.set_parameter(Parameter::Frequency(mhz + offset))
                    },
                    |s| s.frequency = mhz,
                )?;
            }
            Self::FrequencyOffset(off) => {
                info!("Set frequency offset: {:.6} MHz", off);
                let base = station.session().frequency;
                station.reconfigure(
                    name,
                    |radio| {
                        radio.standby()?;
                        radio.set_parameter(Parameter::Frequency(base + off))
                    },
                    |s| s.freq_offset = off,
                )?;
            }
            Self::Bandwidth(khz) => {
                set(station, name, Parameter::Bandwidth(khz), |s| s.bandwidth = khz)?
            }
            Self::SpreadingFactor(sf) => set(station, name, Parameter::SpreadingFactor(sf), |s| {
                s.spreading_factor = sf
            })?,
            Self::CodingRate(cr) => {
                set(station, name, Parameter::CodingRate(cr), |s| s.coding_rate = cr)?
            }
            Self::Crc(on) => set(station, name, Parameter::Crc(on), |s| s.crc = on)?,
            Self::LoRaSyncWord(sw) => {
                set(station, name, Parameter::LoRaSyncWord(sw), |s| s.sync_word = sw)?
            }
            Self::Ldro(mode) => set(station, name, Parameter::Ldro(mode), |s| s.ldro = mode)?,
            Self::PreambleLength(len) => set(station, name, Parameter::PreambleLength(len), |s| {
                s.preamble_length = len
            })?,
            Self::BitRate(kbps) => {
                set(station, name, Parameter::BitRate(kbps), |s| s.bitrate = kbps)?
            }
            Self::FrequencyDeviation(khz) => {
                set(station, name, Parameter::FrequencyDeviation(khz), |s| {
                    s.freq_dev = khz
                })?
            }
            Self::FskBandwidth(khz) => {
                set(station, name, Parameter::RxBandwidth(khz), |s| s.bandwidth = khz)?
            }
            Self::FskSyncWord(bytes) => {
                let stored = bytes.clone();
                set(station, name, Parameter::FskSyncWord(bytes), |s| {
                    s.fsk_sync_word = stored
                })?
            }
            Self::Ook { enabled, shaping } => {
                set(station, name, Parameter::Ook { enabled, shaping }, |s| {
                    s.ook = if enabled { shaping } else { OOK_DISABLED }
                })?
            }
            Self::RegisterField {
                reg,
                value,
                msb,
                lsb,
                check_interval,
            } => {
                let param = Parameter::RegisterField {
                    reg,
                    value,
                    msb,
                    lsb,
                    check_interval,
                };
                set(station, name, param, |_| {})?
            }
            Self::RegisterWrite { reg, value } => {
                info!("Register {:#04x} <- {:#04x}", reg, value);
                station.reconfigure(name, |radio| radio.write_register(reg, value), |_| {})?;
            }
            Self::RegisterRead(reg) => {
                let value = station.reconfigure(name, |radio| radio.read_register(reg), |_| {})?;
                info!("Register {:#04x} = {:#04x} ({:#010b})", reg, value, value);
                return Ok(CommandReply::Register(value));
            }
            Self::BeginLoRa(p) => {
                info!(
                    "Begin LoRa: {:.3} MHz, BW {} kHz, SF{}, CR4/{}, sync word {:#04x}, current limit {} mA",
                    p.frequency, p.bandwidth, p.spreading_factor, p.coding_rate, p.sync_word, p.current_limit
                );
                let session = RadioSession {
                    mode: ModemMode::LoRa,
                    frequency: p.frequency,
                    bandwidth: p.bandwidth,
                    spreading_factor: p.spreading_factor,
                    coding_rate: p.coding_rate,
                    sync_word: p.sync_word,
                    power: p.power,
                    preamble_length: p.preamble_length,
                    gain: p.gain,
                    ..station.session().clone()
                };
                station.reinitialize(session)?;
            }
            Self::BeginFsk(p) => {
                info!(
                    "Begin FSK: {:.3} MHz, {} kbps, deviation {} kHz, RX BW {} kHz, OOK {}",
                    p.frequency,
                    p.bitrate,
                    p.freq_dev,
                    p.rx_bandwidth,
                    if p.ook != OOK_DISABLED { "on" } else { "off" }
                );
                let session = RadioSession {
                    mode: ModemMode::Fsk,
                    frequency: p.frequency,
                    bitrate: p.bitrate,
                    freq_dev: p.freq_dev,
                    bandwidth: p.rx_bandwidth,
                    power: p.power,
                    preamble_length: p.preamble_length,
                    ook: p.ook,
                    ..station.session().clone()
                };
                station.reinitialize(session)?;
            }
            Self::Begin(session) => {
                let session = match session {
                    Some(session) => *session,
                    None => station.session().clone(),
                };
                station.reinitialize(session)?;
            }
            Self::Filter(filter) => {
                info!(
                    "Set filter: {:02X?} at offset {}",
                    filter.expected(),
                    filter.offset()
                );
                station.session_mut().filter = filter;
                station.stats().set_session(station.session());
            }
            Self::Transmit(bytes) => {
                station.send_tx(&bytes)?;
                return Ok(CommandReply::Transmitted);
            }
            Self::TestPacket => {
                station.send_test_packet()?;
                return Ok(CommandReply::Transmitted);
            }
            Self::Telecommand(tc) => {
                station.send_telecommand(&tc)?;
                return Ok(CommandReply::Transmitted);
            }
        }
        Ok(CommandReply::Applied)
    }
}

impl<T: Transceiver, P: FramePublisher, C: Clock> ReceiveController<T, P, C> {
    /// Parse and apply a remote command.
    pub fn handle_remote(
        &mut self,
        kind: &str,
        payload: &[u8],
    ) -> Result<CommandReply, RemoteError> {
        let result = RemoteCommand::parse(kind, payload).and_then(|command| command.apply(self));
        if let Err(e) = &result {
            warn!("Remote '{}' rejected: {}", kind, e);
        }
        result
    }
}

fn set<T, P, C, U>(
    station: &mut ReceiveController<T, P, C>,
    name: &str,
    param: Parameter,
    update: U,
) -> Result<(), DriverError>
where
    T: Transceiver,
    P: FramePublisher,
    C: Clock,
    U: FnOnce(&mut RadioSession),
{
    info!("Set {}: {:?}", name, param);
    station.reconfigure(name, |radio| radio.set_parameter(param), update)
}

fn text<'a>(kind: &str, payload: &'a [u8]) -> Result<&'a str, RemoteError> {
    std::str::from_utf8(payload)
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0'))
        .map_err(|e| RemoteError::malformed(kind, e))
}

fn scalar<V>(kind: &str, payload: &[u8]) -> Result<V, RemoteError>
where
    V: FromStr,
    V::Err: fmt::Display,
{
    let s = text(kind, payload)?;
    s.parse()
        .map_err(|e| RemoteError::malformed(kind, format!("'{}': {}", s, e)))
}

/// Byte value in decimal or `0x` hex.
fn byte(kind: &str, payload: &[u8]) -> Result<u8, RemoteError> {
    let s = text(kind, payload)?;
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| RemoteError::malformed(kind, format!("'{}': {}", s, e)))
}

/// `0`/`1`, any integer (non-zero is on) or `true`/`false`.
fn flag(kind: &str, payload: &[u8]) -> Result<bool, RemoteError> {
    let s = text(kind, payload)?;
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => s
            .parse::<i64>()
            .map(|n| n != 0)
            .map_err(|e| RemoteError::malformed(kind, format!("'{}': {}", s, e))),
    }
}

fn json<V: DeserializeOwned>(kind: &str, payload: &[u8]) -> Result<V, RemoteError> {
    serde_json::from_slice(payload).map_err(|e| RemoteError::malformed(kind, e))
}

fn json_flag(kind: &str, value: &Value) -> Result<bool, RemoteError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        other => Err(RemoteError::malformed(kind, format!("{} is not a flag", other))),
    }
}

/// Sync word bytes, dropping a leading length byte if present.
fn sync_word_bytes(bytes: Vec<u8>) -> Vec<u8> {
    match bytes.split_first() {
        Some((&len, rest)) if !rest.is_empty() && len as usize == rest.len() => rest.to_vec(),
        _ => bytes,
    }
}

/// `["name", args...]`; no args means the command's defaults.
fn telecommand(kind: &str, payload: &[u8]) -> Result<Telecommand, RemoteError> {
    let items: Vec<Value> = json(kind, payload)?;
    let (name, args) = items
        .split_first()
        .ok_or_else(|| RemoteError::malformed(kind, "empty telecommand"))?;
    let name = name
        .as_str()
        .ok_or_else(|| RemoteError::malformed(kind, "telecommand name must be a string"))?;
    let code = TcCode::from_name(name)
        .ok_or_else(|| RemoteError::malformed(kind, format!("unknown telecommand '{}'", name)))?;
    if args.is_empty() {
        return Ok(Telecommand::new(code));
    }
    let args = args
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| RemoteError::malformed(kind, format!("{} is not a byte", v)))
        })
        .collect::<Result<Vec<u8>, _>>()?;
    Ok(Telecommand::with_args(code, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::StationConfig;
    use crate::fec;
    use crate::radio::{ChipFamily, SimulatedRadio};
    use crate::transport::DecodedFrame;

    type Station = ReceiveController<SimulatedRadio, Vec<DecodedFrame>, ManualClock>;

    fn station(family: ChipFamily) -> Station {
        let radio = SimulatedRadio::new(family);
        let mut station = ReceiveController::new(
            radio,
            Vec::new(),
            ManualClock::new(0),
            &StationConfig::default(),
        );
        station.begin().unwrap();
        station
    }

    // ==================== Parse Tests ====================

    #[test]
    fn test_parse_scalars() {
        assert_eq!(
            RemoteCommand::parse("freq", b"437.25").unwrap(),
            RemoteCommand::Frequency(437.25)
        );
        assert_eq!(
            RemoteCommand::parse("sf", b" 11\n").unwrap(),
            RemoteCommand::SpreadingFactor(11)
        );
        assert_eq!(
            RemoteCommand::parse("crc", b"0").unwrap(),
            RemoteCommand::Crc(false)
        );
        assert_eq!(
            RemoteCommand::parse("lsw", b"0x12").unwrap(),
            RemoteCommand::LoRaSyncWord(0x12)
        );
        assert_eq!(
            RemoteCommand::parse("br", b"4.8").unwrap(),
            RemoteCommand::BitRate(4.8)
        );
    }

    #[test]
    fn test_parse_ldro_variants() {
        assert_eq!(
            RemoteCommand::parse("fldro", b"1").unwrap(),
            RemoteCommand::Ldro(LdroMode::On)
        );
        assert_eq!(
            RemoteCommand::parse("aldro", b"").unwrap(),
            RemoteCommand::Ldro(LdroMode::Auto)
        );
        assert_eq!(
            RemoteCommand::parse("ldro", b"0").unwrap(),
            RemoteCommand::Ldro(LdroMode::Off)
        );
        assert!(RemoteCommand::parse("ldro", b"7").is_err());
    }

    #[test]
    fn test_parse_begin_lora() {
        let cmd = RemoteCommand::parse("begin_lora", b"[436.7,125,9,5,18,5,120,8,0]").unwrap();
        match cmd {
            RemoteCommand::BeginLoRa(p) => {
                assert_eq!(p.spreading_factor, 9);
                assert_eq!(p.sync_word, 18);
                assert_eq!(p.preamble_length, 8);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(RemoteCommand::parse("begin_lora", b"[436.7,125]").is_err());
    }

    #[test]
    fn test_parse_fsk_sync_word() {
        assert_eq!(
            RemoteCommand::parse("fsw", b"[2,18,52]").unwrap(),
            RemoteCommand::FskSyncWord(vec![0x12, 0x34])
        );
        assert_eq!(
            RemoteCommand::parse("fsw", b"[45,212]").unwrap(),
            RemoteCommand::FskSyncWord(vec![0x2D, 0xD4])
        );
    }

    #[test]
    fn test_parse_ook_and_registers() {
        assert_eq!(
            RemoteCommand::parse("fook", b"[true,2]").unwrap(),
            RemoteCommand::Ook {
                enabled: true,
                shaping: 2
            }
        );
        assert_eq!(
            RemoteCommand::parse("fook", b"[0,1]").unwrap(),
            RemoteCommand::Ook {
                enabled: false,
                shaping: 1
            }
        );
        assert_eq!(
            RemoteCommand::parse("reg_set", b"[12,3,7,6]").unwrap(),
            RemoteCommand::RegisterField {
                reg: 12,
                value: 3,
                msb: 7,
                lsb: 6,
                check_interval: 0
            }
        );
        assert!(RemoteCommand::parse("reg_set", b"[12,3]").is_err());
        assert_eq!(
            RemoteCommand::parse("reg_read", b"66").unwrap(),
            RemoteCommand::RegisterRead(66)
        );
    }

    #[test]
    fn test_parse_telecommand() {
        assert_eq!(
            RemoteCommand::parse("tc", br#"["low", 75]"#).unwrap(),
            RemoteCommand::Telecommand(Telecommand::with_args(TcCode::PowerLow, vec![75]))
        );
        assert_eq!(
            RemoteCommand::parse("tc", br#"["reset"]"#).unwrap(),
            RemoteCommand::Telecommand(Telecommand::new(TcCode::Reset))
        );
        assert!(RemoteCommand::parse("tc", br#"["warp"]"#).is_err());
        assert!(RemoteCommand::parse("tc", br#"["low", 300]"#).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            RemoteCommand::parse("jump", b"1"),
            Err(RemoteError::UnknownKind("jump".into()))
        );
        let err = RemoteCommand::parse("freq", b"abc").unwrap_err();
        assert!(matches!(err, RemoteError::Malformed { .. }));
        assert_eq!(err.code(), -1);
        assert!(RemoteCommand::parse("sf", &[0xFF, 0xFE]).is_err());
    }

    // ==================== Apply Tests ====================

    #[test]
    fn test_frequency_applied() {
        let mut station = station(ChipFamily::Sx126x);
        let reply = station.handle_remote("freq", b"437.1").unwrap();
        assert_eq!(reply, CommandReply::Applied);
        assert_eq!(station.session().frequency, 437.1);
        assert_eq!(station.radio().state().frequency, 437.1);
        assert!(station.radio().is_receiving());
    }

    #[test]
    fn test_retune_leaves_sx126x_listening() {
        let mut station = station(ChipFamily::Sx126x);
        let rx_starts = station.radio().rx_starts();

        station.handle_remote("freq", b"436.5").unwrap();
        station.handle_remote("freq_offset", b"0.002").unwrap();

        assert!(!station.radio().is_sleeping());
        assert!(station.radio().is_receiving());
        assert_eq!(station.radio().rx_starts(), rx_starts + 2);
        assert!((station.radio().state().tuned_frequency() - 436.502).abs() < 1e-3);
        assert!((station.session().tuned_frequency() - 436.502).abs() < 1e-3);
    }

    #[test]
    fn test_retune_wakes_sx127x_from_sleep() {
        let mut station = station(ChipFamily::Sx127x);
        station.handle_remote("freq", b"145.9").unwrap();
        assert!(!station.radio().is_sleeping());
        assert!(station.radio().is_receiving());
    }

    #[test]
    fn test_out_of_range_frequency_keeps_session_and_rearms() {
        let mut station = station(ChipFamily::Sx127x);
        let before = station.session().frequency;
        let rx_starts = station.radio().rx_starts();
        let attaches = station.radio().interrupt_attaches();

        let err = station.handle_remote("freq", b"900.0").unwrap_err();
        assert_eq!(err.code(), -12);
        assert_eq!(station.session().frequency, before);
        assert!(station.radio().is_receiving());
        assert_eq!(station.radio().rx_starts(), rx_starts + 1);
        assert_eq!(station.radio().interrupt_attaches(), attaches + 1);
        assert!(station.flags().interrupts_enabled());
    }

    #[test]
    fn test_malformed_payload_leaves_radio_alone() {
        let mut station = station(ChipFamily::Sx126x);
        let rx_starts = station.radio().rx_starts();
        let session = station.session().clone();
        assert!(station.handle_remote("begin_lora", b"[not json").is_err());
        assert_eq!(station.session(), &session);
        assert_eq!(station.radio().rx_starts(), rx_starts);
    }

    #[test]
    fn test_family_specific_ranges() {
        let mut sx126x = station(ChipFamily::Sx126x);
        assert!(sx126x.handle_remote("sf", b"5").is_ok());
        assert_eq!(sx126x.session().spreading_factor, 5);

        let mut sx127x = station(ChipFamily::Sx127x);
        assert!(sx127x.handle_remote("sf", b"5").is_err());
        assert_eq!(sx127x.session().spreading_factor, 10);
    }

    #[test]
    fn test_ook_unsupported_on_sx126x() {
        let mut station = station(ChipFamily::Sx126x);
        let err = station.handle_remote("fook", b"[1,1]").unwrap_err();
        assert_eq!(err, RemoteError::Driver(DriverError::Unsupported("ook")));
        assert_eq!(station.session().ook, OOK_DISABLED);
        assert!(station.radio().is_receiving());
    }

    #[test]
    fn test_ook_on_sx127x() {
        let mut station = station(ChipFamily::Sx127x);
        station.handle_remote("begin_fsk", b"[436.7,9.6,5,50,5,100,16,255]").unwrap();
        station.handle_remote("fook", b"[1,2]").unwrap();
        assert!(station.session().ook_enabled());
        assert_eq!(station.session().ook, 2);
    }

    #[test]
    fn test_register_write_then_read() {
        let mut station = station(ChipFamily::Sx127x);
        station.handle_remote("reg_write", b"[57,171]").unwrap();
        assert_eq!(
            station.handle_remote("reg_read", b"57").unwrap(),
            CommandReply::Register(171)
        );

        station.handle_remote("reg_set", b"[57,1,1,0]").unwrap();
        assert_eq!(
            station.handle_remote("reg_read", b"0x39").unwrap(),
            CommandReply::Register(0b1010_1001)
        );
    }

    #[test]
    fn test_begin_fsk_switches_mode() {
        let mut station = station(ChipFamily::Sx126x);
        station
            .handle_remote("begin_fsk", b"[437.1,9.6,3.5,117.3,10,120,32,255]")
            .unwrap();
        let session = station.session();
        assert_eq!(session.mode, ModemMode::Fsk);
        assert_eq!(session.frequency, 437.1);
        assert_eq!(session.bitrate, 9.6);
        assert_eq!(session.bandwidth, 117.3);
        assert!(!session.ook_enabled());
        assert!(station.is_ready());
    }

    #[test]
    fn test_begin_fsk_shaping_on_sx126x() {
        let mut station = station(ChipFamily::Sx126x);
        station
            .handle_remote("begin_fsk", b"[437.1,9.6,3.5,117.3,10,120,32,1]")
            .unwrap();
        assert_eq!(station.session().ook, 1);
        assert_eq!(station.radio().data_shaping(), 1);
        assert!(station.radio().is_receiving());
    }

    #[test]
    fn test_failed_begin_keeps_session() {
        let mut station = station(ChipFamily::Sx126x);
        let session = station.session().clone();
        assert!(station
            .handle_remote("begin_lora", b"[2000,125,9,5,18,5,120,8,0]")
            .is_err());
        assert_eq!(station.session(), &session);
        assert!(!station.is_ready());

        station.handle_remote("begin", b"").unwrap();
        assert!(station.is_ready());
    }

    #[test]
    fn test_begin_with_session_json() {
        let mut station = station(ChipFamily::Sx126x);
        station
            .handle_remote("begin", br#"{"freq": 401.5, "sf": 12, "bw": 125}"#)
            .unwrap();
        assert_eq!(station.session().frequency, 401.5);
        assert!(station.radio().ldro_active());
    }

    #[test]
    fn test_frequency_offset_retunes() {
        let mut station = station(ChipFamily::Sx126x);
        station.handle_remote("freq", b"436.0").unwrap();
        station.handle_remote("freq_offset", b"0.005").unwrap();
        assert_eq!(station.session().freq_offset, 0.005);
        assert_eq!(station.session().frequency, 436.0);
    }

    #[test]
    fn test_filter_command() {
        let mut station = station(ChipFamily::Sx126x);
        station.handle_remote("filter", b"[2,1,192,157]").unwrap();
        assert_eq!(station.session().filter, PacketFilter::new(1, vec![0xC0, 0x9D]));

        station.handle_remote("filter", b"[0]").unwrap();
        assert!(!station.session().filter.is_enabled());
    }

    #[test]
    fn test_telecommand_commands() {
        let mut station = station(ChipFamily::Sx126x);
        assert_eq!(
            station.handle_remote("send_telemetry", b"").unwrap(),
            CommandReply::Transmitted
        );
        assert!(station.pending().telemetry_pending());

        station.handle_remote("tc", br#"["nominal"]"#).unwrap();
        let sent = station.radio().transmitted().last().unwrap().clone();
        assert_eq!(fec::decode(&sent).unwrap(), vec![0xC8, 0x9D, 0x02, 0x5A]);

        station.handle_remote("send_data", b"").unwrap();
        assert!(station.bulk().is_active());
    }

    #[test]
    fn test_raw_tx_and_test_packet() {
        let mut station = station(ChipFamily::Sx126x);
        station.handle_remote("tx", b"[1,2,3]").unwrap();
        station.handle_remote("test", b"").unwrap();
        assert_eq!(
            station.radio().transmitted(),
            &[vec![1, 2, 3], b"TinyGS-test ".to_vec()]
        );
    }
}
