//! Board-agnostic I2C peripheral objects for an embedded scripting runtime
//!
//! This crate contains the binding between the runtime's `I2C` object and
//! the board's vendor I2C driver, independent of the concrete hardware:
//!
//! - Peripheral object lifecycle and master transfers
//! - Driver handle adapter over both vendor driver shapes
//! - Interrupt-safe transfer status handoff
//! - Bus registry with boot-time defaults
//! - Bus helpers (probe, scan, register access)
//! - Configuration type definitions
//!
//! # Example
//!
//! ```ignore
//! static STATUS: [TransferStatus; 1] = [TransferStatus::new()];
//!
//! let mut buses = I2cBuses::new([Some(Generic::new(driver))], &STATUS, BindingConfig::default());
//! let i2c = buses.initialize(1, BusConfig::STANDARD)?;
//! i2c.write(0x50, &[0x01, 0x02], 100, &mut delay)?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod adapter;
pub mod bus;
pub mod config;
pub mod error;
pub mod peripheral;
pub mod registry;
pub mod runtime;
pub mod status;

pub use adapter::{Capability, DmaPair, DriverHandle, Generic, LegacyDma, Transport};
pub use bus::{BusId, MAX_BUSES};
pub use config::{BindingConfig, BusConfig, Role};
pub use error::{Error, Result};
pub use peripheral::{Direction, I2cPeripheral, PeripheralState, Transfer};
pub use registry::I2cBuses;
pub use runtime::{TypeTag, MASTER};
pub use status::TransferStatus;
