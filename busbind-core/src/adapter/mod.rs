//! Driver handle adapter
//!
//! A [`DriverHandle`] binds one bus identity to exactly one vendor driver
//! instance and presents it to the peripheral object through the
//! [`Transport`] trait, whichever vendor shape the board provides:
//!
//! - [`Generic`] - capability-based driver ([`busbind_hal::I2cDriver`])
//! - [`LegacyDma`] - register-level handle with DMA descriptors
//!   ([`busbind_hal::LegacyI2cHandle`])
//!
//! The board picks one at build time through the transport type parameter
//! of its bus registry. Peripheral object behaviour is identical for both.

pub mod generic;
pub mod legacy;

pub use generic::Generic;
pub use legacy::{DmaPair, LegacyDma};

use busbind_hal::{DriverError, EventSink, I2cIrq};

use crate::bus::BusId;
use crate::error::{Error, Result};

/// Which vendor driver shape backs a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Capability {
    /// Capability-based generic driver interface
    Generic,
    /// Register-level handle, transfers through DMA when reserved
    LegacyDma,
}

/// Direction and size of a transfer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// Write these bytes (empty for an address-only probe)
    Write(&'a [u8]),
    /// Read this many bytes
    Read(usize),
}

impl Request<'_> {
    /// Number of bytes the request moves
    pub fn len(&self) -> usize {
        match self {
            Request::Write(data) => data.len(),
            Request::Read(len) => *len,
        }
    }

    /// Whether the request moves no data
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Uniform view of a vendor driver instance
pub trait Transport {
    /// Vendor shape behind this transport type
    const CAPABILITY: Capability;

    /// Vendor shape behind this transport
    fn capability(&self) -> Capability {
        Self::CAPABILITY
    }

    /// Run the vendor driver's internal setup and route its events to `sink`
    ///
    /// Transient failures ([`DriverError::is_transient`]) may succeed on a
    /// later call.
    fn setup(&mut self, sink: &'static dyn EventSink) -> core::result::Result<(), DriverError>;

    /// Whether the vendor driver finished its internal setup
    fn is_ready(&self) -> bool;

    /// Program the bus frequency
    ///
    /// Returns the SCL rate now in effect.
    fn configure(&mut self, frequency: u32) -> Result<u32>;

    /// Start a non-blocking master transfer
    ///
    /// With `pending` set the bus is kept for a repeated start.
    fn start(&mut self, address: u8, request: Request<'_>, pending: bool) -> Result<()>;

    /// Copy bytes received by the last read into `buf`
    fn take_received(&mut self, buf: &mut [u8]) -> usize;

    /// Bytes moved by the current or last transfer, as the vendor counts them
    fn transferred(&self) -> usize;

    /// Power down and free transient resources
    fn release(&mut self);

    /// Interrupt half for the board's vectors (legacy handles only)
    fn irq(&self) -> Option<&'static dyn I2cIrq> {
        None
    }
}

/// Live binding between a bus identity and its vendor driver
#[derive(Debug)]
pub struct DriverHandle<T> {
    bus: BusId,
    transport: T,
}

impl<T: Transport> DriverHandle<T> {
    /// Resolve the vendor driver backing `bus`
    ///
    /// Moves the driver out of the board's table; issues nothing on the bus.
    pub fn acquire<const N: usize>(table: &mut [Option<T>; N], bus: BusId) -> Result<Self> {
        let transport = table
            .get_mut(bus.index())
            .and_then(Option::take)
            .ok_or(Error::UnsupportedBus)?;
        Ok(Self { bus, transport })
    }

    /// Whether the vendor driver finished its internal setup
    pub fn is_ready(&self) -> bool {
        self.transport.is_ready()
    }

    /// Bus this handle is bound to
    pub fn bus(&self) -> BusId {
        self.bus
    }

    /// Vendor shape behind this handle
    pub fn capability(&self) -> Capability {
        self.transport.capability()
    }

    /// Vendor transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
