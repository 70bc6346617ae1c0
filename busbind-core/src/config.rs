//! Configuration type definitions
//!
//! [`BusConfig`] is what the runtime passes to `initialize`;
//! [`BindingConfig`] tunes the binding itself and lists the buses brought up
//! at boot. The binding config can be stored in flash as postcard-serialized
//! binary data (feature `serde`).

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bus::MAX_BUSES;

/// Bus role
///
/// Only master operation is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Role {
    /// Local device initiates transactions and drives SCL
    #[default]
    Master,
}

/// Configuration applied by `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// Bus role
    pub role: Role,
    /// Requested SCL frequency in Hz
    pub frequency: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl BusConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self::master(100_000);

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self::master(400_000);

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self::master(1_000_000);

    /// Master configuration at `frequency` Hz
    pub const fn master(frequency: u32) -> Self {
        Self {
            role: Role::Master,
            frequency,
        }
    }
}

/// Bus brought up at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DefaultBus {
    /// Bus identity (1-based)
    pub bus: u8,
    /// Configuration to apply
    pub config: BusConfig,
}

/// Binding-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BindingConfig {
    /// Extra setup attempts while the vendor driver reports "not ready"
    pub ready_retries: u8,
    /// Interval between status polls while waiting for a transfer (µs)
    pub poll_interval_us: u32,
    /// Buses initialized at boot
    pub default_buses: Vec<DefaultBus, MAX_BUSES>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            ready_retries: 3,
            poll_interval_us: 10,
            default_buses: Vec::new(),
        }
    }
}

/// Errors from storing or loading a [`BindingConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// More default buses than [`MAX_BUSES`]
    TooManyBuses,
    /// Buffer too small for the encoded config
    BufferTooSmall,
    /// Stored bytes are not a valid config
    Corrupted,
}

impl BindingConfig {
    /// Add a bus to bring up at boot
    pub fn with_default_bus(mut self, bus: u8, config: BusConfig) -> Result<Self, ConfigError> {
        self.default_buses
            .push(DefaultBus { bus, config })
            .map_err(|_| ConfigError::TooManyBuses)?;
        Ok(self)
    }

    /// Encode into `buf`, returning the used prefix
    #[cfg(feature = "serde")]
    pub fn to_bytes<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::BufferTooSmall)
    }

    /// Decode a config written by [`BindingConfig::to_bytes`]
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)
    }
}
