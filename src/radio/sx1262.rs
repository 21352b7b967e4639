//! SX1262 transceiver backend for ESP32.
//!
//! Drives the radio over SPI with the `sx1262` crate. Commands the crate
//! gets wrong or lacks (modulation params, register access, sleep) are sent
//! raw through `regiface`.
//!
//! # Pin Configuration (LILYGO T3-S3)
//!
//! | Signal | GPIO | Notes |
//! |--------|------|-------|
//! | SPI MOSI | 11 | Master Out Slave In |
//! | SPI MISO | 13 | Master In Slave Out |
//! | SPI CLK | 12 | SPI Clock |
//! | NSS (CS) | 10 | Chip Select |
//! | RESET | 5 | Radio Reset |
//! | BUSY | 4 | Radio Busy Status |
//! | DIO1 | 1 | RX done / CRC / header error interrupt |

use super::{
    ChipFamily, DriverError, DriverStatus, InterruptFlags, LinkMetrics, Parameter, Transceiver,
};
use crate::config::{LdroMode, ModemMode, RadioSession};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{Gpio1, Gpio10, Gpio4, Gpio5, Input, InterruptType, Output, PinDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::spi::config::Config as SpiConfig;
use esp_idf_hal::spi::config::DriverConfig;
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriver, SPI2};
use esp_idf_hal::units::FromValueType;
use log::{debug, info};
use regiface::{Command, FromByteArray, NoParameters, ToByteArray};
use std::time::{Duration, Instant};
use sx1262::{
    ClearIrqStatus, Device, DeviceSelect, DioIrqConfig, GetIrqStatus, GetPacketStatus,
    GetRxBufferStatus, IrqMask, PaConfig, PacketParams, PacketType, RampTime, RfFrequencyConfig,
    RxMode, SetDioIrqParams, SetPaConfig, SetPacketParams, SetPacketType, SetRfFrequency, SetRx,
    SetStandby, SetTx, SetTxParams, StandbyConfig, Timeout, TxParams,
};

/// Maximum time to wait for radio to become ready (ms).
const BUSY_TIMEOUT_MS: u64 = 1000;

/// Maximum time to wait for TX completion (seconds).
const TX_TIMEOUT_SECS: u64 = 5;

const MAX_FRAME_LEN: usize = 255;
const XTAL_HZ: f64 = 32_000_000.0;

// IRQ status bits not exposed by name in the sx1262 crate
const IRQ_HEADER_ERR: u16 = 1 << 5;
const IRQ_CRC_ERR: u16 = 1 << 6;

const REG_LORA_SYNC_WORD: u16 = 0x0740;
const REG_FSK_SYNC_WORD: u16 = 0x06C0;
const REG_FREQ_ERROR: u16 = 0x076B;

/// Control bits merged into the one-byte LoRa sync word.
const SYNC_WORD_CONTROL: u8 = 0x44;

/// Opaque parameter bytes for raw commands.
#[derive(Debug, Clone)]
struct RawBytes<const N: usize>([u8; N]);

impl<const N: usize> ToByteArray for RawBytes<N> {
    type Error = core::convert::Infallible;
    type Array = [u8; N];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.0)
    }
}

/// Raw command with a fixed opcode and no response.
#[derive(Debug, Clone)]
struct RawCommand<const OP: u8, const N: usize> {
    params: RawBytes<N>,
}

impl<const OP: u8, const N: usize> RawCommand<OP, N> {
    fn new(bytes: [u8; N]) -> Self {
        Self {
            params: RawBytes(bytes),
        }
    }
}

impl<const OP: u8, const N: usize> Command for RawCommand<OP, N> {
    type IdType = u8;
    type CommandParameters = RawBytes<N>;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        OP
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// SetModulationParams (0x8B); the crate's bandwidth enum has wrong values.
type SetModulationParams = RawCommand<0x8B, 8>;
/// WriteRegister (0x0D) with a 16-bit address and two data bytes.
type WriteRegister2 = RawCommand<0x0D, 4>;
/// WriteRegister (0x0D) with a 16-bit address and eight data bytes.
type WriteRegister8 = RawCommand<0x0D, 10>;

/// ReadRegister (0x1D) of three bytes: status byte, then data.
#[derive(Debug, Clone, Default)]
struct Read3Response {
    bytes: [u8; 3],
}

impl FromByteArray for Read3Response {
    type Error = core::convert::Infallible;
    type Array = [u8; 4];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            bytes: [bytes[1], bytes[2], bytes[3]],
        })
    }
}

#[derive(Debug, Clone)]
struct ReadRegister3 {
    params: RawBytes<3>,
}

impl Command for ReadRegister3 {
    type IdType = u8;
    type CommandParameters = RawBytes<3>;
    type ResponseParameters = Read3Response;

    fn id() -> Self::IdType {
        0x1D
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// Run a command between BUSY waits.
macro_rules! exec {
    ($radio:ident, $cmd:expr) => {
        $radio.wait_busy().and_then(|_| {
            let response = $radio.device.execute_command($cmd).map_err(bus)?;
            $radio.wait_busy()?;
            Ok(response)
        })
    };
}

fn bus<E: std::fmt::Debug>(e: E) -> DriverError {
    DriverError::Bus(format!("{:?}", e))
}

/// LoRa bandwidth register code for a bandwidth in kHz.
fn lora_bandwidth_code(khz: f32) -> Option<u8> {
    const TABLE: [(f32, u8); 10] = [
        (7.8, 0x00),
        (10.4, 0x08),
        (15.6, 0x01),
        (20.8, 0x09),
        (31.25, 0x02),
        (41.7, 0x0A),
        (62.5, 0x03),
        (125.0, 0x04),
        (250.0, 0x05),
        (500.0, 0x06),
    ];
    TABLE
        .iter()
        .find(|(bw, _)| (bw - khz).abs() < 0.05)
        .map(|(_, code)| *code)
}

/// Smallest FSK receiver bandwidth code covering `khz`.
fn fsk_bandwidth_code(khz: f32) -> Option<u8> {
    const TABLE: [(f32, u8); 21] = [
        (4.8, 0x1F),
        (5.8, 0x17),
        (7.3, 0x0F),
        (9.7, 0x1E),
        (11.7, 0x16),
        (14.6, 0x0E),
        (19.5, 0x1D),
        (23.4, 0x15),
        (29.3, 0x0D),
        (39.0, 0x1C),
        (46.9, 0x14),
        (58.6, 0x0C),
        (78.2, 0x1B),
        (93.8, 0x13),
        (117.3, 0x0B),
        (156.2, 0x1A),
        (187.2, 0x12),
        (234.3, 0x0A),
        (312.0, 0x19),
        (373.6, 0x11),
        (467.0, 0x09),
    ];
    TABLE
        .iter()
        .find(|(bw, _)| *bw >= khz - 0.05)
        .map(|(_, code)| *code)
}

/// SX1262 radio on the T3-S3 pinout.
pub struct Sx1262Radio<'d> {
    device: Device<SpiDeviceDriver<'d, SpiDriver<'d>>>,
    reset: PinDriver<'d, Gpio5, Output>,
    busy: PinDriver<'d, Gpio4, Input>,
    dio1: PinDriver<'d, Gpio1, Input>,
    /// Parameters currently programmed into the chip.
    state: RadioSession,
    /// Data shaping applied to FSK modulation.
    shaping: u8,
    metrics: LinkMetrics,
    initialized: bool,
}

impl<'d> Sx1262Radio<'d> {
    /// Set up SPI and GPIO. The chip is configured by [`Transceiver::initialize`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spi: impl Peripheral<P = SPI2> + 'd,
        sclk: impl Peripheral<P = esp_idf_hal::gpio::Gpio12> + 'd,
        mosi: impl Peripheral<P = esp_idf_hal::gpio::Gpio11> + 'd,
        miso: impl Peripheral<P = esp_idf_hal::gpio::Gpio13> + 'd,
        cs: impl Peripheral<P = Gpio10> + 'd,
        reset: impl Peripheral<P = Gpio5> + 'd,
        busy: impl Peripheral<P = Gpio4> + 'd,
        dio1: impl Peripheral<P = Gpio1> + 'd,
    ) -> Result<Self, DriverError> {
        // SX1262 supports up to 16MHz, use conservative 2MHz
        let spi_config = SpiConfig::new().baudrate(2.MHz().into());
        let driver_config = DriverConfig::new();

        let spi_driver =
            SpiDriver::new(spi, sclk, mosi, Some(miso), &driver_config).map_err(bus)?;
        let spi_device = SpiDeviceDriver::new(spi_driver, Some(cs), &spi_config).map_err(bus)?;

        Ok(Self {
            device: Device::new(spi_device),
            reset: PinDriver::output(reset).map_err(bus)?,
            busy: PinDriver::input(busy).map_err(bus)?,
            dio1: PinDriver::input(dio1).map_err(bus)?,
            state: RadioSession::default(),
            shaping: 0,
            metrics: LinkMetrics::default(),
            initialized: false,
        })
    }

    fn hardware_reset(&mut self) -> Result<(), DriverError> {
        debug!("Resetting radio");
        self.reset.set_low().map_err(bus)?;
        FreeRtos::delay_ms(1);
        self.reset.set_high().map_err(bus)?;
        FreeRtos::delay_ms(10);
        Ok(())
    }

    /// Wait for BUSY low.
    fn wait_busy(&self) -> Result<(), DriverError> {
        let start = Instant::now();
        let timeout = Duration::from_millis(BUSY_TIMEOUT_MS);
        while self.busy.is_high() {
            if start.elapsed() > timeout {
                return Err(DriverError::Timeout);
            }
            FreeRtos::delay_ms(1);
        }
        Ok(())
    }

    fn enter_standby(&mut self) -> Result<(), DriverError> {
        exec!(self, SetStandby {
            config: StandbyConfig::Rc,
        })?;
        Ok(())
    }

    fn write_register16(&mut self, addr: u16, data: [u8; 2]) -> Result<(), DriverError> {
        let [hi, lo] = addr.to_be_bytes();
        exec!(self, WriteRegister2::new([hi, lo, data[0], data[1]]))?;
        Ok(())
    }

    fn set_frequency(&mut self, mhz: f32) -> Result<(), DriverError> {
        if !(150.0..=960.0).contains(&mhz) {
            return Err(DriverError::OutOfRange { param: "frequency" });
        }
        exec!(self, SetRfFrequency {
            config: RfFrequencyConfig {
                frequency: (mhz as f64 * 1_000_000.0) as u32,
            },
        })?;
        Ok(())
    }

    /// Program modulation params from `state` for the current modem.
    fn apply_modulation(&mut self, state: &RadioSession, shaping: u8) -> Result<(), DriverError> {
        let bytes = match state.mode {
            ModemMode::LoRa => {
                let bw = lora_bandwidth_code(state.bandwidth)
                    .ok_or(DriverError::OutOfRange { param: "bandwidth" })?;
                if !(5..=12).contains(&state.spreading_factor) {
                    return Err(DriverError::OutOfRange {
                        param: "spreading factor",
                    });
                }
                if !(5..=8).contains(&state.coding_rate) {
                    return Err(DriverError::OutOfRange {
                        param: "coding rate",
                    });
                }
                let ldro = match state.ldro {
                    LdroMode::Off => false,
                    LdroMode::On => true,
                    LdroMode::Auto => {
                        super::low_data_rate_optimize(state.spreading_factor, state.bandwidth)
                    }
                };
                [
                    state.spreading_factor,
                    bw,
                    state.coding_rate - 4,
                    ldro as u8,
                    0,
                    0,
                    0,
                    0,
                ]
            }
            ModemMode::Fsk => {
                if !(0.6..=300.0).contains(&state.bitrate) {
                    return Err(DriverError::OutOfRange { param: "bit rate" });
                }
                if !(0.6..=200.0).contains(&state.freq_dev) {
                    return Err(DriverError::OutOfRange {
                        param: "frequency deviation",
                    });
                }
                let rx_bw = fsk_bandwidth_code(state.bandwidth)
                    .ok_or(DriverError::OutOfRange {
                        param: "rx bandwidth",
                    })?;
                let pulse = match shaping {
                    0 => 0x00,
                    1 => 0x08,
                    2 => 0x09,
                    3 => 0x0A,
                    _ => {
                        return Err(DriverError::OutOfRange {
                            param: "data shaping",
                        })
                    }
                };
                let br = (32.0 * XTAL_HZ / (state.bitrate as f64 * 1000.0)) as u32;
                let fdev =
                    (state.freq_dev as f64 * 1000.0 * (1u64 << 25) as f64 / XTAL_HZ) as u32;
                let br = br.to_be_bytes();
                let fdev = fdev.to_be_bytes();
                [br[1], br[2], br[3], pulse, rx_bw, fdev[1], fdev[2], fdev[3]]
            }
        };
        exec!(self, SetModulationParams::new(bytes))?;
        Ok(())
    }

    /// Program packet params for a payload of `payload_len` bytes.
    fn apply_packet_params(&mut self, state: &RadioSession, payload_len: u8) -> Result<(), DriverError> {
        let [pre_hi, pre_lo] = state.preamble_length.to_be_bytes();
        let params = match state.mode {
            // [preamble(2), explicit header, length, crc, invert iq]
            ModemMode::LoRa => [pre_hi, pre_lo, 0x00, payload_len, state.crc as u8, 0x00, 0, 0, 0],
            // [preamble bits(2), detector 16 bits, sync bits, no addr, variable len, length, crc, no whitening]
            ModemMode::Fsk => {
                let pre_bits = (state.preamble_length.saturating_mul(8)).to_be_bytes();
                let sync_bits = (state.fsk_sync_word.len() * 8) as u8;
                let crc = if state.crc { 0x06 } else { 0x01 };
                [
                    pre_bits[0],
                    pre_bits[1],
                    0x05,
                    sync_bits,
                    0x00,
                    0x01,
                    payload_len,
                    crc,
                    0x00,
                ]
            }
        };
        exec!(self, SetPacketParams {
            params: PacketParams { params },
        })?;
        Ok(())
    }

    fn apply_sync_word(&mut self, state: &RadioSession) -> Result<(), DriverError> {
        match state.mode {
            ModemMode::LoRa => {
                let sw = state.sync_word;
                let msb = (sw & 0xF0) | ((SYNC_WORD_CONTROL & 0xF0) >> 4);
                let lsb = ((sw & 0x0F) << 4) | (SYNC_WORD_CONTROL & 0x0F);
                self.write_register16(REG_LORA_SYNC_WORD, [msb, lsb])
            }
            ModemMode::Fsk => {
                let sw = &state.fsk_sync_word;
                if sw.is_empty() || sw.len() > 8 {
                    return Err(DriverError::OutOfRange {
                        param: "fsk sync word",
                    });
                }
                let [hi, lo] = REG_FSK_SYNC_WORD.to_be_bytes();
                let mut bytes = [0u8; 10];
                bytes[0] = hi;
                bytes[1] = lo;
                bytes[2..2 + sw.len()].copy_from_slice(sw);
                exec!(self, WriteRegister8::new(bytes))?;
                Ok(())
            }
        }
    }

    fn configure_irq(&mut self) -> Result<(), DriverError> {
        let irq_mask = IrqMask::TX_DONE | IrqMask::RX_DONE | IrqMask::TIMEOUT;
        let rx_lines = IrqMask::RX_DONE;
        let irq_mask = IrqMask::from_bits_retain(irq_mask.bits() | IRQ_CRC_ERR | IRQ_HEADER_ERR);
        // DIO1 only signals receive events; TX completion is polled
        let dio1_mask =
            IrqMask::from_bits_retain(rx_lines.bits() | IRQ_CRC_ERR | IRQ_HEADER_ERR);
        exec!(self, SetDioIrqParams {
            config: DioIrqConfig {
                irq_mask,
                dio1_mask,
                dio2_mask: IrqMask::empty(),
                dio3_mask: IrqMask::empty(),
            },
        })?;
        Ok(())
    }

    fn wait_tx_done(&mut self) -> Result<(), DriverError> {
        let start = Instant::now();
        let timeout = Duration::from_secs(TX_TIMEOUT_SECS);
        loop {
            let irq = exec!(self, GetIrqStatus)?;
            if irq.irq_mask.contains(IrqMask::TX_DONE) {
                exec!(self, ClearIrqStatus {
                    irq_mask: IrqMask::all(),
                })?;
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(DriverError::Timeout);
            }
            FreeRtos::delay_ms(1);
        }
    }

    /// Signed LoRa frequency error of the last frame, in Hz.
    fn read_frequency_error(&mut self) -> Result<f32, DriverError> {
        let [hi, lo] = REG_FREQ_ERROR.to_be_bytes();
        let response = exec!(self, ReadRegister3 {
            params: RawBytes([hi, lo, 0x00]),
        })?;
        let b = response.bytes;
        let efe = (((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32) & 0x0F_FFFF;
        // 20-bit two's complement
        let efe = if efe & 0x8_0000 != 0 {
            efe as i32 - 0x10_0000
        } else {
            efe as i32
        };
        Ok(1.55 * efe as f32 / (1600.0 / self.state.bandwidth))
    }
}

impl Transceiver for Sx1262Radio<'_> {
    fn family(&self) -> ChipFamily {
        ChipFamily::Sx126x
    }

    fn initialize(&mut self, session: &RadioSession) -> Result<(), DriverError> {
        info!(
            "Initializing SX1262 for {} at {:.4} MHz",
            session.mode,
            session.tuned_frequency()
        );
        self.initialized = false;

        self.hardware_reset()?;
        self.wait_busy()?;
        self.enter_standby()?;

        let packet_type = match session.mode {
            ModemMode::LoRa => PacketType::LoRa,
            ModemMode::Fsk => PacketType::Gfsk,
        };
        exec!(self, SetPacketType { packet_type })?;
        self.set_frequency(session.tuned_frequency())?;
        // SX126x has no OOK; the FSK "OOK" value is its Gaussian shaping
        let shaping = match session.mode {
            ModemMode::Fsk => session.data_shaping(),
            ModemMode::LoRa => 0,
        };
        self.apply_modulation(session, shaping)?;
        self.apply_packet_params(session, MAX_FRAME_LEN as u8)?;
        self.apply_sync_word(session)?;

        // +22dBm capable PA
        exec!(self, SetPaConfig {
            config: PaConfig {
                duty_cycle: 0x04,
                hp_max: 0x07,
                device_sel: DeviceSelect::Sx1262,
                pa_lut: 0x01,
            },
        })?;
        exec!(self, SetTxParams {
            params: TxParams {
                power: session.power,
                ramp_time: RampTime::Micros200,
            },
        })?;
        self.configure_irq()?;

        self.state = session.clone();
        self.shaping = shaping;
        self.initialized = true;
        info!(
            "SX1262 ready: {} dBm, preamble {}",
            session.power, session.preamble_length
        );
        Ok(())
    }

    fn set_parameter(&mut self, param: Parameter) -> Result<(), DriverError> {
        if !self.initialized {
            return Err(DriverError::NotInitialized);
        }
        let mut next = self.state.clone();
        let mut shaping = self.shaping;
        match &param {
            Parameter::Frequency(mhz) => {
                self.set_frequency(*mhz)?;
                next.frequency = *mhz - next.freq_offset;
                self.state = next;
                return Ok(());
            }
            Parameter::Bandwidth(khz) | Parameter::RxBandwidth(khz) => next.bandwidth = *khz,
            Parameter::SpreadingFactor(sf) => next.spreading_factor = *sf,
            Parameter::CodingRate(cr) => next.coding_rate = *cr,
            Parameter::Crc(on) => next.crc = *on,
            Parameter::LoRaSyncWord(sw) => next.sync_word = *sw,
            Parameter::Ldro(mode) => next.ldro = *mode,
            Parameter::PreambleLength(len) => next.preamble_length = *len,
            Parameter::BitRate(kbps) => next.bitrate = *kbps,
            Parameter::FrequencyDeviation(khz) => next.freq_dev = *khz,
            Parameter::FskSyncWord(bytes) => next.fsk_sync_word = bytes.clone(),
            Parameter::DataShaping(value) => shaping = *value,
            Parameter::Ook { .. } => return Err(DriverError::Unsupported("ook")),
            Parameter::RegisterField { .. } => {
                return Err(DriverError::Unsupported("register access"))
            }
        }

        self.enter_standby()?;
        match param {
            Parameter::Crc(_) | Parameter::PreambleLength(_) => {
                self.apply_packet_params(&next, MAX_FRAME_LEN as u8)?
            }
            Parameter::LoRaSyncWord(_) | Parameter::FskSyncWord(_) => {
                self.apply_sync_word(&next)?;
                self.apply_packet_params(&next, MAX_FRAME_LEN as u8)?;
            }
            _ => self.apply_modulation(&next, shaping)?,
        }
        self.state = next;
        self.shaping = shaping;
        Ok(())
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), DriverError> {
        if !self.initialized {
            return Err(DriverError::NotInitialized);
        }
        if data.len() > MAX_FRAME_LEN {
            return Err(DriverError::PacketTooLarge {
                size: data.len(),
                max: MAX_FRAME_LEN,
            });
        }

        self.enter_standby()?;
        let state = self.state.clone();
        self.apply_packet_params(&state, data.len() as u8)?;
        self.wait_busy()?;
        self.device.write_buffer(0, data).map_err(bus)?;
        exec!(self, ClearIrqStatus {
            irq_mask: IrqMask::all(),
        })?;
        exec!(self, SetTx {
            timeout: Timeout(0),
        })?;
        let result = self.wait_tx_done();

        // Restore the maximum length for receive
        self.apply_packet_params(&state, MAX_FRAME_LEN as u8)?;
        result
    }

    fn start_receive(&mut self) -> Result<(), DriverError> {
        if !self.initialized {
            return Err(DriverError::NotInitialized);
        }
        exec!(self, ClearIrqStatus {
            irq_mask: IrqMask::all(),
        })?;
        exec!(self, SetRx {
            mode: RxMode::Continuous,
        })?;
        // The GPIO driver disarms the line after every ISR
        self.dio1.enable_interrupt().map_err(bus)?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<(Vec<u8>, DriverStatus), DriverError> {
        if !self.initialized {
            return Err(DriverError::NotInitialized);
        }
        let irq = exec!(self, GetIrqStatus)?.irq_mask.bits();
        exec!(self, ClearIrqStatus {
            irq_mask: IrqMask::all(),
        })?;

        let packet = exec!(self, GetPacketStatus)?.packet_status.status;
        self.metrics = match self.state.mode {
            // [rssi_pkt, snr_pkt, signal_rssi]
            ModemMode::LoRa => LinkMetrics::new(
                -(packet[0] as f32) / 2.0,
                (packet[1] as i8) as f32 / 4.0,
                self.read_frequency_error()?,
            ),
            // [rx_status, rssi_sync, rssi_avg]
            ModemMode::Fsk => LinkMetrics::new(-(packet[2] as f32) / 2.0, 0.0, 0.0),
        };

        if irq & IRQ_CRC_ERR != 0 {
            return Ok((Vec::new(), DriverStatus::CrcMismatch));
        }
        if irq & IRQ_HEADER_ERR != 0 {
            return Ok((Vec::new(), DriverStatus::HeaderDamaged));
        }
        if irq & IrqMask::RX_DONE.bits() == 0 {
            return Ok((Vec::new(), DriverStatus::Ok));
        }

        let status = exec!(self, GetRxBufferStatus)?;
        let len = status.buffer_status.payload_length as usize;
        let offset = status.buffer_status.buffer_pointer;
        let mut data = vec![0u8; len];
        if len > 0 {
            self.device.read_buffer(offset, &mut data).map_err(bus)?;
        }
        Ok((data, DriverStatus::Ok))
    }

    fn link_metrics(&self) -> LinkMetrics {
        self.metrics
    }

    fn attach_interrupt(&mut self, flags: InterruptFlags) -> Result<(), DriverError> {
        self.dio1
            .set_interrupt_type(InterruptType::PosEdge)
            .map_err(bus)?;
        // SAFETY: the callback only touches atomics
        unsafe {
            self.dio1
                .subscribe(move || flags.on_interrupt())
                .map_err(bus)?;
        }
        self.dio1.enable_interrupt().map_err(bus)?;
        Ok(())
    }

    fn standby(&mut self) -> Result<(), DriverError> {
        self.enter_standby()
    }

    fn read_register(&mut self, _reg: u8) -> Result<u8, DriverError> {
        Err(DriverError::Unsupported("register access"))
    }

    fn write_register(&mut self, _reg: u8, _value: u8) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("register access"))
    }
}
