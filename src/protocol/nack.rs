//! Negative acknowledgement of outstanding requests.
//!
//! When a "send config" or "send telemetry" request is outstanding and the
//! reply arrives with a bad CRC, the station asks for it again with a fixed
//! NACK frame naming the request.

use super::telecommand::{TcCode, HEADER};

/// Request that can be refused with a NACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackKind {
    Config,
    Telemetry,
}

impl NackKind {
    /// Fixed NACK frame: header, NACK code, refused request code.
    pub fn frame(self) -> [u8; 4] {
        let refused = match self {
            Self::Config => TcCode::SendConfig,
            Self::Telemetry => TcCode::SendTelemetry,
        };
        [HEADER[0], HEADER[1], TcCode::Nack.code(), refused.code()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Telemetry => "telemetry",
        }
    }
}

/// Outstanding config/telemetry requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingRequests {
    config: bool,
    telemetry: bool,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_config(&mut self) {
        self.config = true;
    }

    pub fn request_telemetry(&mut self) {
        self.telemetry = true;
    }

    pub fn config_pending(&self) -> bool {
        self.config
    }

    pub fn telemetry_pending(&self) -> bool {
        self.telemetry
    }

    /// Forget both requests (a good frame arrived).
    pub fn clear(&mut self) {
        self.config = false;
        self.telemetry = false;
    }

    /// NACKs owed after a CRC failure, config first. Clears them.
    pub fn take_nacks(&mut self) -> Vec<NackKind> {
        let mut owed = Vec::new();
        if std::mem::take(&mut self.config) {
            owed.push(NackKind::Config);
        }
        if std::mem::take(&mut self.telemetry) {
            owed.push(NackKind::Telemetry);
        }
        owed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nack_frames() {
        assert_eq!(NackKind::Config.frame(), [0xC8, 0x9D, 0x33, 0x32]);
        assert_eq!(NackKind::Telemetry.frame(), [0xC8, 0x9D, 0x33, 0x15]);
    }

    #[test]
    fn test_take_nacks_clears() {
        let mut pending = PendingRequests::new();
        assert!(pending.take_nacks().is_empty());

        pending.request_telemetry();
        pending.request_config();
        assert_eq!(
            pending.take_nacks(),
            vec![NackKind::Config, NackKind::Telemetry]
        );
        assert!(!pending.config_pending());
        assert!(!pending.telemetry_pending());
    }

    #[test]
    fn test_clear() {
        let mut pending = PendingRequests::new();
        pending.request_config();
        pending.clear();
        assert_eq!(pending, PendingRequests::default());
    }
}
