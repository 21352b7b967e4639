//! Telecommand frames.
//!
//! Every frame starts with the two-byte vendor header `C8 9D`, then a
//! one-byte command code and command-specific arguments.

/// Vendor header of every telecommand frame.
pub const HEADER: [u8; 2] = [0xC8, 0x9D];

/// Frame sent by [`send_test_packet`](crate::ReceiveController::send_test_packet).
///
/// Starts with the filter-bypass marker.
pub const TEST_PACKET: &[u8] = b"TinyGS-test ";

/// Known telecommand codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcCode {
    Reset,
    /// Nominal power threshold (default 90%).
    PowerNominal,
    /// Low power threshold (default 80%).
    PowerLow,
    /// Critical power threshold (default 65%).
    PowerCritical,
    ExitLowPower,
    ExitContingency,
    ExitSunSafe,
    SetTime,
    SetConstantKp,
    Tle,
    SetGyroResolution,
    /// Starts a bulk transfer from the satellite.
    SendData,
    SendTelemetry,
    StopSendingData,
    /// Bulk-transfer acknowledgement (27-byte frame).
    AckData,
    /// Shares its code with [`TcCode::AckData`].
    SetSfCr,
    SendCalibration,
    ChangeTimeout,
    TakePhoto,
    TakeRf,
    SendConfig,
    Nack,
}

impl TcCode {
    /// Every code, in table order.
    pub const ALL: [TcCode; 22] = [
        Self::Reset,
        Self::PowerNominal,
        Self::PowerLow,
        Self::PowerCritical,
        Self::ExitLowPower,
        Self::ExitContingency,
        Self::ExitSunSafe,
        Self::SetTime,
        Self::SetConstantKp,
        Self::Tle,
        Self::SetGyroResolution,
        Self::SendData,
        Self::SendTelemetry,
        Self::StopSendingData,
        Self::AckData,
        Self::SetSfCr,
        Self::SendCalibration,
        Self::ChangeTimeout,
        Self::TakePhoto,
        Self::TakeRf,
        Self::SendConfig,
        Self::Nack,
    ];

    /// Command byte on the wire.
    pub fn code(self) -> u8 {
        match self {
            Self::Reset => 0x01,
            Self::PowerNominal => 0x02,
            Self::PowerLow => 0x03,
            Self::PowerCritical => 0x04,
            Self::ExitLowPower => 0x05,
            Self::ExitContingency => 0x06,
            Self::ExitSunSafe => 0x07,
            Self::SetTime => 0x08,
            Self::SetConstantKp => 0x0A,
            Self::Tle => 0x0B,
            Self::SetGyroResolution => 0x0C,
            Self::SendData => 0x14,
            Self::SendTelemetry => 0x15,
            Self::StopSendingData => 0x16,
            Self::AckData | Self::SetSfCr => 0x18,
            Self::SendCalibration => 0x19,
            Self::ChangeTimeout => 0x1A,
            Self::TakePhoto => 0x1E,
            Self::TakeRf => 0x28,
            Self::SendConfig => 0x32,
            Self::Nack => 0x33,
        }
    }

    /// Name accepted by [`TcCode::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::PowerNominal => "nominal",
            Self::PowerLow => "low",
            Self::PowerCritical => "critical",
            Self::ExitLowPower => "exit_low_power",
            Self::ExitContingency => "exit_contingency",
            Self::ExitSunSafe => "exit_sunsafe",
            Self::SetTime => "set_time",
            Self::SetConstantKp => "set_constant_kp",
            Self::Tle => "tle",
            Self::SetGyroResolution => "set_gyro_res",
            Self::SendData => "send_data",
            Self::SendTelemetry => "send_telemetry",
            Self::StopSendingData => "stop_sending_data",
            Self::AckData => "ack_data",
            Self::SetSfCr => "set_sf_cr",
            Self::SendCalibration => "send_calibration",
            Self::ChangeTimeout => "change_timeout",
            Self::TakePhoto => "take_photo",
            Self::TakeRf => "take_rf",
            Self::SendConfig => "send_config",
            Self::Nack => "nack",
        }
    }

    /// Look a code up by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.name() == name)
    }

    /// Arguments sent when the caller gives none.
    pub fn default_args(self) -> &'static [u8] {
        match self {
            Self::PowerNominal => &[0x5A],
            Self::PowerLow => &[0x50],
            Self::PowerCritical => &[0x41],
            Self::SendData => &[0x00],
            _ => &[],
        }
    }
}

/// A telecommand with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telecommand {
    pub code: TcCode,
    pub args: Vec<u8>,
}

impl Telecommand {
    /// Telecommand with the code's default arguments.
    pub fn new(code: TcCode) -> Self {
        Self {
            code,
            args: code.default_args().to_vec(),
        }
    }

    /// Telecommand with explicit arguments.
    pub fn with_args(code: TcCode, args: Vec<u8>) -> Self {
        Self { code, args }
    }

    /// Plain (unencoded) frame bytes.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(3 + self.args.len());
        frame.extend_from_slice(&HEADER);
        frame.push(self.code.code());
        frame.extend_from_slice(&self.args);
        frame
    }
}
