//! Time-on-air calculation.
//!
//! LoRa uses the formula from the Semtech SX1262 datasheet (Section 6.1.4);
//! FSK is plain bits over bit rate with preamble, sync word, length byte and
//! CRC. Also decides whether automatic low data rate optimization applies.
//!
//! # Example
//!
//! ```
//! use gs_radio_core::config::RadioSession;
//! use gs_radio_core::radio::airtime_us;
//!
//! let session = RadioSession::default();
//! let airtime = airtime_us(27, &session);
//! println!("ack frame takes {:.2} ms", airtime as f64 / 1000.0);
//! ```

use crate::config::{LdroMode, ModemMode, RadioSession};

/// LoRa symbol duration in microseconds.
pub fn symbol_duration_us(spreading_factor: u8, bandwidth_khz: f32) -> u64 {
    // T_sym = 2^SF / BW
    let bw_hz = (bandwidth_khz as f64) * 1000.0;
    if bw_hz <= 0.0 || spreading_factor > 31 {
        return 0;
    }
    ((1u64 << spreading_factor) as f64 * 1_000_000.0 / bw_hz) as u64
}

/// Whether low data rate optimization must be on for these settings.
///
/// Required when symbol time exceeds 16ms (SF11/SF12 at 125kHz).
pub fn low_data_rate_optimize(spreading_factor: u8, bandwidth_khz: f32) -> bool {
    symbol_duration_us(spreading_factor, bandwidth_khz) > 16_000
}

/// Effective LDRO state of a session, resolving [`LdroMode::Auto`].
pub fn ldro_active(session: &RadioSession) -> bool {
    match session.ldro {
        LdroMode::Off => false,
        LdroMode::On => true,
        LdroMode::Auto => low_data_rate_optimize(session.spreading_factor, session.bandwidth),
    }
}

/// Airtime of a `payload_bytes` frame under `session`, in microseconds.
pub fn airtime_us(payload_bytes: usize, session: &RadioSession) -> u64 {
    match session.mode {
        ModemMode::LoRa => lora_airtime_us(payload_bytes, session),
        ModemMode::Fsk => fsk_airtime_us(payload_bytes, session),
    }
}

/// Airtime in milliseconds (convenience wrapper).
pub fn airtime_ms(payload_bytes: usize, session: &RadioSession) -> f64 {
    airtime_us(payload_bytes, session) as f64 / 1000.0
}

fn lora_airtime_us(payload_bytes: usize, session: &RadioSession) -> u64 {
    let sf = session.spreading_factor as f64;
    let t_sym_us = symbol_duration_us(session.spreading_factor, session.bandwidth) as f64;
    if t_sym_us == 0.0 {
        return 0;
    }

    let t_preamble_us = (session.preamble_length as f64 + 4.25) * t_sym_us;

    // Explicit header always
    let de = if ldro_active(session) { 1.0 } else { 0.0 };
    let crc_bits = if session.crc { 16.0 } else { 0.0 };

    // 8*PL - 4*SF + 28 + 16*CRC - 20*H
    let numerator = 8.0 * payload_bytes as f64 - 4.0 * sf + 28.0 + crc_bits;
    let denominator = 4.0 * (sf - 2.0 * de);

    let cr = session.coding_rate as f64;
    let payload_symbols = if denominator > 0.0 {
        8.0 + (numerator / denominator).ceil().max(0.0) * cr
    } else {
        8.0
    };

    (t_preamble_us + payload_symbols * t_sym_us) as u64
}

fn fsk_airtime_us(payload_bytes: usize, session: &RadioSession) -> u64 {
    let bitrate_bps = session.bitrate as f64 * 1000.0;
    if bitrate_bps <= 0.0 {
        return 0;
    }
    let crc_bytes = if session.crc { 2 } else { 0 };
    // Preamble counted in bytes, plus the length byte
    let bytes = session.preamble_length as usize
        + session.fsk_sync_word.len()
        + 1
        + payload_bytes
        + crc_bytes;
    ((bytes * 8) as f64 * 1_000_000.0 / bitrate_bps).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lora(sf: u8, bw: f32) -> RadioSession {
        RadioSession {
            spreading_factor: sf,
            bandwidth: bw,
            ..Default::default()
        }
    }

    #[test]
    fn test_symbol_duration() {
        // 2^7 / 125000 = 1024 us
        assert_eq!(symbol_duration_us(7, 125.0), 1024);
        // 2^12 / 125000 = 32768 us
        assert_eq!(symbol_duration_us(12, 125.0), 32768);
        assert_eq!(symbol_duration_us(7, 0.0), 0);
    }

    #[test]
    fn test_auto_ldro_threshold() {
        assert!(!low_data_rate_optimize(7, 125.0));
        assert!(low_data_rate_optimize(11, 125.0));
        assert!(!low_data_rate_optimize(12, 500.0));
    }

    #[test]
    fn test_forced_ldro_overrides_auto() {
        let mut session = lora(7, 125.0);
        assert!(!ldro_active(&session));
        session.ldro = LdroMode::On;
        assert!(ldro_active(&session));

        let mut session = lora(12, 125.0);
        assert!(ldro_active(&session));
        session.ldro = LdroMode::Off;
        assert!(!ldro_active(&session));
    }

    #[test]
    fn test_lora_airtime_sf7_125khz() {
        let session = RadioSession {
            spreading_factor: 7,
            bandwidth: 125.0,
            coding_rate: 5,
            preamble_length: 8,
            ..Default::default()
        };
        // 12.25 preamble + 8 + ceil(96 / 28) * 5 = 28 payload symbols at 1.024 ms
        assert_eq!(airtime_us(10, &session), 41_216);
    }

    #[test]
    fn test_airtime_grows_with_payload_and_sf() {
        let session = lora(9, 125.0);
        assert!(airtime_us(100, &session) > airtime_us(10, &session));
        assert!(airtime_us(50, &lora(12, 125.0)) > airtime_us(50, &lora(9, 125.0)));
    }

    #[test]
    fn test_fsk_airtime() {
        let session = RadioSession {
            mode: ModemMode::Fsk,
            bitrate: 9.6,
            preamble_length: 8,
            fsk_sync_word: vec![0x2D, 0xD4],
            crc: true,
            ..Default::default()
        };
        // (8 + 2 + 1 + 20 + 2) bytes * 8 bits / 9600 bps = 27.5 ms
        assert_eq!(airtime_us(20, &session), 27_500);
    }

    #[test]
    fn test_fsk_airtime_rounds_to_nearest_us() {
        let session = RadioSession {
            mode: ModemMode::Fsk,
            bitrate: 4.8,
            preamble_length: 4,
            fsk_sync_word: vec![0x12],
            crc: false,
            ..Default::default()
        };
        // 8 bytes * 8 bits / 4800 bps = 13333.33 us
        assert_eq!(airtime_us(2, &session), 13_333);
        // 9 bytes at 9.6 kbps (not exact in f32) = 7500 us
        let session = RadioSession {
            bitrate: 9.6,
            ..session
        };
        assert_eq!(airtime_us(3, &session), 7_500);
    }
}
