//! Simulated transceiver for host runs and tests.
//!
//! Behaves like a chip of the chosen [`ChipFamily`]: parameter ranges are
//! enforced per family, OOK and raw register access are SX127x-only, and an
//! injected frame raises the attached [`InterruptFlags`] just like the DIO
//! line would. Everything the core does to the radio is recorded so it can
//! be inspected afterwards.
//!
//! # Example
//!
//! ```
//! use gs_radio_core::radio::{ChipFamily, DriverStatus, LinkMetrics, SimulatedRadio};
//!
//! let mut radio = SimulatedRadio::new(ChipFamily::Sx126x);
//! radio.inject(vec![1, 2, 3], DriverStatus::Ok, LinkMetrics::new(-100.0, 5.0, 12.0));
//! assert_eq!(radio.pending_frames(), 1);
//! ```

use super::{
    ldro_active, ChipFamily, DriverError, DriverStatus, InterruptFlags, LinkMetrics, Parameter,
    Transceiver,
};
use crate::config::{ModemMode, RadioSession};
use log::{debug, trace};
use std::collections::VecDeque;

/// Largest frame the radio FIFO holds.
pub const MAX_FRAME_LEN: usize = 255;

/// LoRa bandwidths (kHz) accepted by both families.
const LORA_BANDWIDTHS: [f32; 10] = [
    7.8, 10.4, 15.6, 20.8, 31.25, 41.7, 62.5, 125.0, 250.0, 500.0,
];

/// A frame waiting in the simulated FIFO.
#[derive(Debug, Clone)]
struct QueuedFrame {
    data: Vec<u8>,
    status: DriverStatus,
    metrics: LinkMetrics,
}

/// In-memory transceiver.
#[derive(Debug)]
pub struct SimulatedRadio {
    family: ChipFamily,
    initialized: bool,
    sleeping: bool,
    receiving: bool,
    /// FSK data shaping value last programmed.
    shaping: u8,
    /// Mirror of what the simulated chip currently holds.
    state: RadioSession,
    fifo: VecDeque<QueuedFrame>,
    metrics: LinkMetrics,
    flags: Option<InterruptFlags>,
    registers: [u8; 128],
    transmitted: Vec<Vec<u8>>,
    applied: Vec<Parameter>,
    rx_starts: usize,
    interrupt_attaches: usize,
    fail_transmit: Option<DriverError>,
    fail_receive: Option<DriverError>,
}

impl SimulatedRadio {
    /// Create an uninitialized radio of the given family.
    pub fn new(family: ChipFamily) -> Self {
        Self {
            family,
            initialized: false,
            sleeping: false,
            receiving: false,
            shaping: 0,
            state: RadioSession::default(),
            fifo: VecDeque::new(),
            metrics: LinkMetrics::default(),
            flags: None,
            registers: [0; 128],
            transmitted: Vec::new(),
            applied: Vec::new(),
            rx_starts: 0,
            interrupt_attaches: 0,
            fail_transmit: None,
            fail_receive: None,
        }
    }

    /// Queue a received frame and fire the RX interrupt.
    pub fn inject(&mut self, data: Vec<u8>, status: DriverStatus, metrics: LinkMetrics) {
        trace!("sim: frame of {} bytes queued ({:?})", data.len(), status);
        self.fifo.push_back(QueuedFrame {
            data,
            status,
            metrics,
        });
        self.fire_interrupt();
    }

    /// Fire the RX interrupt without a new frame (noisy line).
    pub fn fire_interrupt(&self) {
        if let Some(flags) = &self.flags {
            flags.on_interrupt();
        }
    }

    /// Make every following transmission fail with `error` (`None` clears).
    pub fn fail_transmissions(&mut self, error: Option<DriverError>) {
        self.fail_transmit = error;
    }

    /// Make every following receive start fail with `error` (`None` clears).
    pub fn fail_receive_starts(&mut self, error: Option<DriverError>) {
        self.fail_receive = error;
    }

    /// Frames transmitted so far, oldest first.
    pub fn transmitted(&self) -> &[Vec<u8>] {
        &self.transmitted
    }

    /// Forget recorded transmissions.
    pub fn clear_transmitted(&mut self) {
        self.transmitted.clear();
    }

    /// Parameter changes the chip accepted, oldest first.
    pub fn applied(&self) -> &[Parameter] {
        &self.applied
    }

    /// How often continuous receive was (re)armed.
    pub fn rx_starts(&self) -> usize {
        self.rx_starts
    }

    /// How often an interrupt handler was attached.
    pub fn interrupt_attaches(&self) -> usize {
        self.interrupt_attaches
    }

    /// Whether the radio currently sits in continuous receive.
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// FSK data shaping currently programmed.
    pub fn data_shaping(&self) -> u8 {
        self.shaping
    }

    /// Whether the chip is in sleep mode.
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Frames still waiting in the FIFO.
    pub fn pending_frames(&self) -> usize {
        self.fifo.len()
    }

    /// Parameters currently held by the chip.
    pub fn state(&self) -> &RadioSession {
        &self.state
    }

    /// Effective low data rate optimization, with auto mode resolved.
    pub fn ldro_active(&self) -> bool {
        ldro_active(&self.state)
    }

    fn check_ready(&self) -> Result<(), DriverError> {
        if self.initialized {
            Ok(())
        } else {
            Err(DriverError::NotInitialized)
        }
    }

    /// Range-check a parameter for this family and store it.
    fn apply(&mut self, param: &Parameter) -> Result<(), DriverError> {
        let sx127x = self.family == ChipFamily::Sx127x;
        let out_of_range = DriverError::OutOfRange {
            param: param.name(),
        };
        match param {
            Parameter::Frequency(mhz) => {
                let (min, max) = if sx127x { (137.0, 525.0) } else { (150.0, 960.0) };
                if !(min..=max).contains(mhz) {
                    return Err(out_of_range);
                }
                self.state.frequency = *mhz - self.state.freq_offset;
            }
            Parameter::Bandwidth(khz) => {
                if !LORA_BANDWIDTHS.iter().any(|bw| (bw - khz).abs() < 0.05) {
                    return Err(out_of_range);
                }
                self.state.bandwidth = *khz;
            }
            Parameter::SpreadingFactor(sf) => {
                let min = if sx127x { 6 } else { 5 };
                if !(min..=12).contains(sf) {
                    return Err(out_of_range);
                }
                self.state.spreading_factor = *sf;
            }
            Parameter::CodingRate(cr) => {
                if !(5..=8).contains(cr) {
                    return Err(out_of_range);
                }
                self.state.coding_rate = *cr;
            }
            Parameter::Crc(on) => self.state.crc = *on,
            Parameter::LoRaSyncWord(sw) => self.state.sync_word = *sw,
            Parameter::Ldro(mode) => self.state.ldro = *mode,
            Parameter::PreambleLength(len) => {
                let min = if sx127x { 6 } else { 1 };
                if *len < min {
                    return Err(out_of_range);
                }
                self.state.preamble_length = *len;
            }
            Parameter::BitRate(kbps) => {
                let min = if sx127x { 1.2 } else { 0.6 };
                if !(min..=300.0).contains(kbps) {
                    return Err(out_of_range);
                }
                self.state.bitrate = *kbps;
            }
            Parameter::FrequencyDeviation(khz) => {
                if !(0.6..=200.0).contains(khz) {
                    return Err(out_of_range);
                }
                self.state.freq_dev = *khz;
            }
            Parameter::RxBandwidth(khz) => {
                let (min, max) = if sx127x { (2.6, 250.0) } else { (4.8, 467.0) };
                if !(min..=max).contains(khz) {
                    return Err(out_of_range);
                }
                self.state.bandwidth = *khz;
            }
            Parameter::FskSyncWord(bytes) => {
                if bytes.is_empty() || bytes.len() > 8 {
                    return Err(out_of_range);
                }
                self.state.fsk_sync_word = bytes.clone();
            }
            Parameter::DataShaping(shaping) => {
                if *shaping > 3 {
                    return Err(out_of_range);
                }
                self.shaping = *shaping;
            }
            Parameter::Ook { enabled, shaping } => {
                if !sx127x {
                    return Err(DriverError::Unsupported("ook"));
                }
                if *shaping > 3 {
                    return Err(out_of_range);
                }
                self.state.ook = if *enabled {
                    *shaping
                } else {
                    crate::config::OOK_DISABLED
                };
            }
            Parameter::RegisterField {
                reg,
                value,
                msb,
                lsb,
                ..
            } => {
                if !sx127x {
                    return Err(DriverError::Unsupported("register access"));
                }
                if *msb > 7 || lsb > msb || *reg as usize >= self.registers.len() {
                    return Err(out_of_range);
                }
                let mask = (0xFFu8 >> (7 - msb)) & (0xFFu8 << lsb);
                let current = self.registers[*reg as usize];
                self.registers[*reg as usize] = (current & !mask) | ((value << lsb) & mask);
            }
        }
        Ok(())
    }
}

impl Transceiver for SimulatedRadio {
    fn family(&self) -> ChipFamily {
        self.family
    }

    fn initialize(&mut self, session: &RadioSession) -> Result<(), DriverError> {
        let sx127x = self.family == ChipFamily::Sx127x;
        let mut params = vec![Parameter::Frequency(session.tuned_frequency())];
        match session.mode {
            ModemMode::LoRa => params.extend([
                Parameter::Bandwidth(session.bandwidth),
                Parameter::SpreadingFactor(session.spreading_factor),
                Parameter::CodingRate(session.coding_rate),
                Parameter::LoRaSyncWord(session.sync_word),
                Parameter::Ldro(session.ldro),
            ]),
            ModemMode::Fsk => {
                params.extend([
                    Parameter::BitRate(session.bitrate),
                    Parameter::FrequencyDeviation(session.freq_dev),
                    Parameter::RxBandwidth(session.bandwidth),
                    Parameter::FskSyncWord(session.fsk_sync_word.clone()),
                ]);
                if sx127x && session.ook_enabled() {
                    params.push(Parameter::Ook {
                        enabled: true,
                        shaping: session.ook,
                    });
                }
                params.push(Parameter::DataShaping(session.data_shaping()));
            }
        }
        params.extend([
            Parameter::PreambleLength(session.preamble_length),
            Parameter::Crc(session.crc),
        ]);

        // Validate against a scratch copy so a failed init leaves the chip untouched
        let mut scratch = SimulatedRadio::new(self.family);
        scratch.state.freq_offset = session.freq_offset;
        for param in &params {
            scratch.apply(param)?;
        }

        self.state = session.clone();
        self.shaping = scratch.shaping;
        self.initialized = true;
        self.sleeping = false;
        self.receiving = false;
        debug!(
            "sim {}: initialized {} at {:.4} MHz",
            self.family.as_str(),
            session.mode,
            session.tuned_frequency()
        );
        Ok(())
    }

    fn set_parameter(&mut self, param: Parameter) -> Result<(), DriverError> {
        self.check_ready()?;
        self.apply(&param)?;
        debug!("sim {}: {} set", self.family.as_str(), param.name());
        self.applied.push(param);
        Ok(())
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), DriverError> {
        self.check_ready()?;
        if data.len() > MAX_FRAME_LEN {
            return Err(DriverError::PacketTooLarge {
                size: data.len(),
                max: MAX_FRAME_LEN,
            });
        }
        if let Some(err) = &self.fail_transmit {
            return Err(err.clone());
        }
        self.receiving = false;
        self.transmitted.push(data.to_vec());
        Ok(())
    }

    fn start_receive(&mut self) -> Result<(), DriverError> {
        self.check_ready()?;
        if self.sleeping && self.family == ChipFamily::Sx126x {
            // BUSY stays high in SX126x sleep
            return Err(DriverError::Timeout);
        }
        if let Some(err) = &self.fail_receive {
            return Err(err.clone());
        }
        self.sleeping = false;
        self.receiving = true;
        self.rx_starts += 1;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<(Vec<u8>, DriverStatus), DriverError> {
        self.check_ready()?;
        match self.fifo.pop_front() {
            Some(frame) => {
                self.metrics = frame.metrics;
                Ok((frame.data, frame.status))
            }
            // Empty FIFO: the chip hands back nothing and stale metrics
            None => Ok((Vec::new(), DriverStatus::Ok)),
        }
    }

    fn link_metrics(&self) -> LinkMetrics {
        self.metrics
    }

    fn attach_interrupt(&mut self, flags: InterruptFlags) -> Result<(), DriverError> {
        self.flags = Some(flags);
        self.interrupt_attaches += 1;
        Ok(())
    }

    fn standby(&mut self) -> Result<(), DriverError> {
        self.check_ready()?;
        self.sleeping = self.family == ChipFamily::Sx127x;
        self.receiving = false;
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, DriverError> {
        if self.family != ChipFamily::Sx127x {
            return Err(DriverError::Unsupported("register access"));
        }
        self.registers
            .get(reg as usize)
            .copied()
            .ok_or(DriverError::OutOfRange { param: "register" })
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), DriverError> {
        if self.family != ChipFamily::Sx127x {
            return Err(DriverError::Unsupported("register access"));
        }
        let slot = self
            .registers
            .get_mut(reg as usize)
            .ok_or(DriverError::OutOfRange { param: "register" })?;
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LdroMode;

    fn ready(family: ChipFamily) -> SimulatedRadio {
        let mut radio = SimulatedRadio::new(family);
        radio.initialize(&RadioSession::default()).unwrap();
        radio
    }

    // ==================== Initialization Tests ====================

    #[test]
    fn test_operations_require_init() {
        let mut radio = SimulatedRadio::new(ChipFamily::Sx126x);
        assert_eq!(radio.transmit(&[1]), Err(DriverError::NotInitialized));
        assert_eq!(radio.start_receive(), Err(DriverError::NotInitialized));
    }

    #[test]
    fn test_failed_init_keeps_previous_state() {
        let mut radio = ready(ChipFamily::Sx127x);
        let bad = RadioSession {
            frequency: 915.0,
            ..Default::default()
        };
        assert_eq!(
            radio.initialize(&bad),
            Err(DriverError::OutOfRange { param: "frequency" })
        );
        assert!((radio.state().frequency - 436.703).abs() < 1e-3);
    }

    #[test]
    fn test_fsk_init_applies_data_shaping() {
        for family in [ChipFamily::Sx126x, ChipFamily::Sx127x] {
            let mut radio = SimulatedRadio::new(family);
            let session = RadioSession {
                mode: ModemMode::Fsk,
                bandwidth: 117.3,
                ook: 2,
                ..Default::default()
            };
            radio.initialize(&session).unwrap();
            assert_eq!(radio.data_shaping(), 2);
        }

        let mut radio = SimulatedRadio::new(ChipFamily::Sx126x);
        let bad = RadioSession {
            mode: ModemMode::Fsk,
            bandwidth: 117.3,
            ook: 7,
            ..Default::default()
        };
        assert_eq!(
            radio.initialize(&bad),
            Err(DriverError::OutOfRange {
                param: "data shaping"
            })
        );
    }

    // ==================== Parameter Tests ====================

    #[test]
    fn test_family_ranges() {
        let mut sx127x = ready(ChipFamily::Sx127x);
        let mut sx126x = ready(ChipFamily::Sx126x);

        assert!(sx127x.set_parameter(Parameter::SpreadingFactor(5)).is_err());
        assert!(sx126x.set_parameter(Parameter::SpreadingFactor(5)).is_ok());

        assert!(sx127x.set_parameter(Parameter::Frequency(868.0)).is_err());
        assert!(sx126x.set_parameter(Parameter::Frequency(868.0)).is_ok());
    }

    #[test]
    fn test_bandwidth_must_be_listed() {
        let mut radio = ready(ChipFamily::Sx126x);
        assert!(radio.set_parameter(Parameter::Bandwidth(125.0)).is_ok());
        assert!(radio.set_parameter(Parameter::Bandwidth(62.5)).is_ok());
        assert_eq!(
            radio.set_parameter(Parameter::Bandwidth(100.0)),
            Err(DriverError::OutOfRange { param: "bandwidth" })
        );
    }

    #[test]
    fn test_rejected_parameter_not_recorded() {
        let mut radio = ready(ChipFamily::Sx126x);
        let _ = radio.set_parameter(Parameter::CodingRate(9));
        assert!(radio.applied().is_empty());
        assert_eq!(radio.state().coding_rate, 5);
    }

    #[test]
    fn test_auto_ldro_resolution() {
        let mut radio = ready(ChipFamily::Sx126x);
        radio.set_parameter(Parameter::Ldro(LdroMode::Auto)).unwrap();
        radio.set_parameter(Parameter::Bandwidth(125.0)).unwrap();
        radio.set_parameter(Parameter::SpreadingFactor(12)).unwrap();
        assert!(radio.ldro_active());
        radio.set_parameter(Parameter::SpreadingFactor(7)).unwrap();
        assert!(!radio.ldro_active());
    }

    #[test]
    fn test_register_field_write() {
        let mut radio = ready(ChipFamily::Sx127x);
        radio.write_register(0x0C, 0b1111_0000).unwrap();
        radio
            .set_parameter(Parameter::RegisterField {
                reg: 0x0C,
                value: 0b01,
                msb: 5,
                lsb: 4,
                check_interval: 2,
            })
            .unwrap();
        assert_eq!(radio.read_register(0x0C).unwrap(), 0b1101_0000);
    }

    #[test]
    fn test_register_access_unsupported_on_sx126x() {
        let mut radio = ready(ChipFamily::Sx126x);
        assert_eq!(
            radio.read_register(0x01),
            Err(DriverError::Unsupported("register access"))
        );
    }

    // ==================== Receive/Transmit Tests ====================

    #[test]
    fn test_inject_raises_attached_flags() {
        let mut radio = ready(ChipFamily::Sx126x);
        let flags = InterruptFlags::new();
        radio.attach_interrupt(flags.clone()).unwrap();

        let metrics = LinkMetrics::new(-98.0, 6.5, 210.0);
        radio.inject(vec![0xAA], DriverStatus::Ok, metrics);
        assert!(flags.take_frame_ready());

        let (data, status) = radio.read_frame().unwrap();
        assert_eq!(data, vec![0xAA]);
        assert_eq!(status, DriverStatus::Ok);
        assert_eq!(radio.link_metrics(), metrics);
    }

    #[test]
    fn test_empty_fifo_keeps_stale_metrics() {
        let mut radio = ready(ChipFamily::Sx126x);
        let metrics = LinkMetrics::new(-98.0, 6.5, 210.0);
        radio.inject(vec![1], DriverStatus::Ok, metrics);
        radio.read_frame().unwrap();

        let (data, _) = radio.read_frame().unwrap();
        assert!(data.is_empty());
        assert_eq!(radio.link_metrics(), metrics);
    }

    #[test]
    fn test_transmit_records_and_limits_size() {
        let mut radio = ready(ChipFamily::Sx127x);
        radio.start_receive().unwrap();
        radio.transmit(&[1, 2, 3]).unwrap();
        assert!(!radio.is_receiving());
        assert_eq!(radio.transmitted(), &[vec![1, 2, 3]]);

        let big = vec![0u8; 256];
        assert!(matches!(
            radio.transmit(&big),
            Err(DriverError::PacketTooLarge { size: 256, max: 255 })
        ));
    }
}
