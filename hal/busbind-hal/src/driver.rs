//! Generic capability-based I2C driver interface
//!
//! A vendor driver of this shape is initialized once with an event sink,
//! powered, tuned through control requests, and then started on
//! non-blocking master transfers whose completion is reported through the
//! sink from interrupt context.

use crate::i2c::{BusSpeed, EventSink};

/// Errors returned by driver entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// Unspecified failure
    Error,
    /// Driver is busy (also used for "not ready yet" during setup)
    Busy,
    /// Operation timed out inside the driver
    Timeout,
    /// Operation not supported by this driver
    Unsupported,
    /// Parameter rejected
    Parameter,
    /// Vendor-specific error code
    Specific(i32),
}

impl DriverError {
    /// Whether retrying the same call later may succeed
    pub fn is_transient(self) -> bool {
        matches!(self, DriverError::Busy | DriverError::Timeout)
    }
}

/// Power state requested through [`I2cDriver::power_control`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Peripheral clock gated, state lost
    Off,
    /// Low power, state retained
    Low,
    /// Fully operational
    Full,
}

/// Control requests understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    /// Select the bus speed class
    BusSpeed(BusSpeed),
    /// Set the own (slave) address; master operation does not need one
    OwnAddress(u8),
    /// Clock out nine pulses to free a stuck bus
    BusClear,
    /// Abort the outstanding master transfer
    AbortTransfer,
}

/// Snapshot returned by [`I2cDriver::status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverStatus {
    /// Driver completed its internal initialization
    pub initialized: bool,
    /// Peripheral is powered
    pub powered: bool,
    /// A transfer is in progress
    pub busy: bool,
    /// Last transfer lost arbitration
    pub arbitration_lost: bool,
    /// Last transfer saw a bus error
    pub bus_error: bool,
}

/// Generic capability-based I2C driver
///
/// Transfers are started non-blocking; the driver buffers read data
/// internally (up to [`crate::MAX_TRANSFER_LEN`] bytes) until collected with
/// [`I2cDriver::read_received`].
pub trait I2cDriver {
    /// Run the driver's internal setup and register the event sink
    fn initialize(&mut self, sink: &'static dyn EventSink) -> Result<(), DriverError>;

    /// Undo [`I2cDriver::initialize`]
    fn uninitialize(&mut self) -> Result<(), DriverError>;

    /// Change the peripheral power state
    fn power_control(&mut self, state: PowerState) -> Result<(), DriverError>;

    /// Apply a control request
    fn control(&mut self, control: Control) -> Result<(), DriverError>;

    /// Start writing `data` to the peer at `address`
    ///
    /// # Arguments
    /// * `address` - 7-bit peer address
    /// * `data` - Bytes to write; empty for an address-only probe
    /// * `pending` - Keep the bus (no STOP) for a following repeated start
    fn master_transmit(&mut self, address: u8, data: &[u8], pending: bool)
        -> Result<(), DriverError>;

    /// Start reading `len` bytes from the peer at `address`
    fn master_receive(&mut self, address: u8, len: usize, pending: bool)
        -> Result<(), DriverError>;

    /// Copy bytes received by the last read into `buf`
    ///
    /// Returns the number of bytes copied.
    fn read_received(&mut self, buf: &mut [u8]) -> usize;

    /// Bytes moved by the current or last transfer
    fn data_count(&self) -> usize;

    /// Current driver status
    fn status(&self) -> DriverStatus;
}
