//! Line-based operator console for the host station.
//!
//! # Commands
//!
//! - `rx <hex>` - Inject a received frame into the simulated radio
//! - `crc <hex>` - Inject a frame that failed its CRC
//! - `irq` - Fire the RX interrupt without a frame
//! - `status` - Print station status
//! - `help` - Show available commands
//! - `<kind> <payload>` - Run a remote command (`freq 437.1`, `sf 11`, ...)
//!
//! # Example Session
//!
//! ```text
//! > send_data
//! > rx C8 9D 14 01 AA BB
//! > rx C8 9D 14 13 CC DD
//! > begin_lora [436.7,125,9,5,18,5,120,8,0]
//! ```

use crate::radio::DriverStatus;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Frame to inject with the status the driver should report.
    Receive { data: Vec<u8>, status: DriverStatus },
    /// Interrupt without a frame.
    Interrupt,
    /// Remote command by kind.
    Remote { kind: String, payload: String },
    Status,
    Help,
    /// Unknown or invalid input, with a message for the operator.
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse a command from an input line.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return ConsoleCommand::Unknown(String::new());
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        match cmd {
            "rx" | "crc" => match parse_hex(args) {
                Some(data) if !data.is_empty() => ConsoleCommand::Receive {
                    data,
                    status: if cmd == "rx" {
                        DriverStatus::Ok
                    } else {
                        DriverStatus::CrcMismatch
                    },
                },
                _ => ConsoleCommand::Unknown(format!("Usage: {} <hex bytes>", cmd)),
            },
            "irq" => ConsoleCommand::Interrupt,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            kind => ConsoleCommand::Remote {
                kind: kind.to_string(),
                payload: args.to_string(),
            },
        }
    }
}

/// Parse hex bytes, with or without spaces (`"C8 9D 18"`, `"c89d18"`).
pub fn parse_hex(input: &str) -> Option<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        })
        .collect()
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  rx <hex>            Inject a received frame (FEC-encoded or raw "Tiny" test frame)
  crc <hex>           Inject a frame with a CRC error
  irq                 Fire the RX interrupt without a frame
  status              Show station status
  help                Show this help

Remote commands:
  freq <MHz>  bw <kHz>  sf <n>  cr <n>  crc <0|1>  lsw <byte>  pl <n>
  fldro <0|1>  aldro  ldro <0|1|2>  br <kbps>  fd <kHz>  fbw <kHz>
  fsw [bytes]  fook [on,shape]  reg_set [reg,val,msb,lsb]  reg_write [reg,val]
  reg_read <reg>  filter [len,offset,bytes..]  freq_offset <MHz>
  begin_lora [freq,bw,sf,cr,sw,power,limit,pl,gain]
  begin_fsk [freq,br,fd,rxbw,power,limit,pl,ook]  begin [session json]
  tx [bytes]  test  send_data  send_config  send_telemetry  tc ["name",args..]
"#;
