//! busbind vendor driver interfaces
//!
//! This crate defines the narrow interfaces through which the peripheral
//! objects in `busbind-core` reach a vendor I2C driver. Two mutually
//! exclusive vendor shapes are supported:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  busbind-core (peripheral objects)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  I2cDriver    │       │ LegacyI2c-    │
//! │  (generic)    │       │ Handle (+DMA) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! Completion and fault notifications travel back through [`EventSink`],
//! which the vendor driver calls from interrupt context.
//!
//! # Modules
//!
//! - [`i2c`] - Bus speed classes, events, faults, the master sentinel address
//! - [`driver`] - Generic capability-based driver interface
//! - [`legacy`] - Register-level handle interface with DMA descriptors
//! - [`blocking`] - [`driver::I2cDriver`] over any `embedded-hal` I2C bus
//! - `mock` - Simulated bus and drivers (feature `mock`)

#![cfg_attr(not(any(test, feature = "mock")), no_std)]
#![deny(unsafe_code)]

pub mod blocking;
pub mod driver;
pub mod i2c;
pub mod legacy;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export key types at crate root for convenience
pub use blocking::BlockingDriver;
pub use driver::{Control, DriverError, DriverStatus, I2cDriver, PowerState};
pub use i2c::{BusFault, BusSpeed, EventSink, I2cEvent, MASTER_ADDRESS, MAX_TRANSFER_LEN};
pub use legacy::{
    DmaDescriptor, FrameEnd, HalStatus, HandleInit, HandleState, I2cIrq, LegacyI2cHandle,
    TransferMode,
};
