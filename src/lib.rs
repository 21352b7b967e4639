//! Ground-station radio core.
//!
//! Receive/transmit protocol core of a satellite ground station's LoRa/FSK
//! front end: interrupt-driven receive, FEC decoding, packet filtering,
//! bulk-transfer acknowledgement, NACKs and live radio reconfiguration.
//!
//! Everything except the SX1262 backend (`esp32` feature) is platform
//! independent and tested on the host against [`SimulatedRadio`].

pub mod clock;
pub mod config;
pub mod console;
pub mod controller;
pub mod fec;
pub mod protocol;
pub mod radio;
pub mod remote;
pub mod status;
pub mod transport;

// Re-export commonly used items
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, RadioSession, StationConfig};
pub use controller::{PollOutcome, ReceiveController, RxError, TxError};
pub use radio::{
    ChipFamily, DriverError, DriverStatus, InterruptFlags, LinkMetrics, SimulatedRadio,
    Transceiver,
};
pub use remote::{CommandReply, RemoteCommand, RemoteError};
pub use status::{StationStats, StatusServer};
pub use transport::{DecodedFrame, FramePublisher};

/// Format bytes as space-separated uppercase hex (`"C8 9D 18"`).
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0xC8, 0x9D, 0x18]), "C8 9D 18");
        assert_eq!(hex(&[]), "");
        assert_eq!(hex(&[0x05]), "05");
    }
}
