//! Transceiver abstraction and backends.
//!
//! This module contains:
//! - [`driver`]: the [`Transceiver`] trait, parameters, status and errors
//! - [`flags`]: interrupt-shared receive flags
//! - [`metrics`]: link metrics and spurious-interrupt detection
//! - [`airtime`]: time-on-air and LDRO resolution
//! - [`sim`]: in-memory backend for host runs and tests
//! - `sx1262`: SPI backend (ESP32 only)

mod airtime;
mod driver;
mod flags;
mod metrics;
mod sim;

#[cfg(feature = "esp32")]
mod sx1262;

pub use airtime::{
    airtime_ms, airtime_us, ldro_active, low_data_rate_optimize, symbol_duration_us,
};
pub use driver::{ChipFamily, DriverError, DriverStatus, Parameter, Transceiver};
pub use flags::InterruptFlags;
pub use metrics::{LinkMetrics, LinkMetricsTracker};
pub use sim::{SimulatedRadio, MAX_FRAME_LEN};

#[cfg(feature = "esp32")]
pub use sx1262::Sx1262Radio;
