//! Register-level I2C handle interface with DMA descriptors
//!
//! Older vendor HALs expose each peripheral as a handle programmed from an
//! init structure. Transfers run either interrupt-driven or through a DMA
//! stream described by a [`DmaDescriptor`].
//!
//! The handle itself is owned by the API side. Its interrupt half is a
//! separate `&'static` [`I2cIrq`] obtained from [`LegacyI2cHandle::irq`];
//! the board's event and error vectors call into it and it reports
//! completion through the registered [`EventSink`].
//!
//! ```ignore
//! static I2C1_IRQ: Mutex<Cell<Option<&'static dyn I2cIrq>>> = Mutex::new(Cell::new(None));
//!
//! // at boot, before the registry moves into its task
//! let irq = buses.irq(1)?;
//! critical_section::with(|cs| I2C1_IRQ.borrow(cs).set(Some(irq)));
//!
//! #[interrupt]
//! fn I2C1_EV() {
//!     if let Some(irq) = critical_section::with(|cs| I2C1_IRQ.borrow(cs).get()) {
//!         irq.irq_event();
//!     }
//! }
//! ```

use crate::i2c::{EventSink, MASTER_ADDRESS};

/// Status codes returned by handle entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalStatus {
    /// Generic failure
    Error,
    /// Handle busy or not ready yet
    Busy,
    /// Operation timed out
    Timeout,
}

/// Handle state as tracked by the vendor HAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandleState {
    /// Not initialized
    #[default]
    Reset,
    /// Initialized and idle
    Ready,
    /// Transmitting
    BusyTx,
    /// Receiving
    BusyRx,
    /// Unrecoverable error, needs deinit/init
    Error,
}

/// Address width of the own address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressingMode {
    #[default]
    SevenBit,
    TenBit,
}

/// Init structure programmed into the handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleInit {
    /// Requested SCL rate in Hz
    pub clock_speed: u32,
    /// Own address; [`MASTER_ADDRESS`] selects master mode
    pub own_address: u8,
    /// Own address width
    pub addressing: AddressingMode,
    /// Respond to the general call address
    pub general_call: bool,
    /// Disable clock stretching
    pub no_stretch: bool,
}

impl HandleInit {
    /// Master-mode init structure at `clock_speed` Hz
    pub const fn master(clock_speed: u32) -> Self {
        Self {
            clock_speed,
            own_address: MASTER_ADDRESS,
            addressing: AddressingMode::SevenBit,
            general_call: false,
            no_stretch: false,
        }
    }
}

/// Static description of one DMA stream used by an I2C peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaDescriptor {
    /// DMA controller number
    pub controller: u8,
    /// Stream (or channel) index on the controller
    pub stream: u8,
    /// Request line routed to the stream
    pub request: u8,
}

/// How a transfer moves its bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferMode {
    /// One interrupt per byte
    Interrupt,
    /// Through the given DMA stream
    Dma(&'static DmaDescriptor),
}

/// How a transfer ends on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameEnd {
    /// Release the bus with a stop condition
    #[default]
    Stop,
    /// Keep the bus; the next transfer starts with a repeated start
    Hold,
}

/// Interrupt-context half of a legacy handle
///
/// Called from the event and error vectors while the handle stays borrowed
/// by the API side.
pub trait I2cIrq: Sync {
    /// Event interrupt entry point
    fn irq_event(&self);

    /// Error interrupt entry point
    fn irq_error(&self);
}

/// Register-level I2C handle
pub trait LegacyI2cHandle {
    /// Program the peripheral from `init`
    fn init(&mut self, init: &HandleInit) -> Result<(), HalStatus>;

    /// Return the peripheral to reset state
    fn deinit(&mut self) -> Result<(), HalStatus>;

    /// Current handle state
    fn state(&self) -> HandleState;

    /// SCL rate actually produced by the current timing registers
    fn baudrate(&self) -> u32;

    /// Register the sink called from the event/error interrupts
    fn register_callbacks(&mut self, sink: &'static dyn EventSink);

    /// Claim a DMA stream for this peripheral
    fn reserve_dma(&mut self, descriptor: &'static DmaDescriptor) -> Result<(), HalStatus>;

    /// Return a DMA stream claimed with [`LegacyI2cHandle::reserve_dma`]
    fn release_dma(&mut self, descriptor: &'static DmaDescriptor);

    /// Start a master write
    fn master_transmit(
        &mut self,
        address: u8,
        data: &[u8],
        mode: TransferMode,
        end: FrameEnd,
    ) -> Result<(), HalStatus>;

    /// Start a master read of `len` bytes
    fn master_receive(
        &mut self,
        address: u8,
        len: usize,
        mode: TransferMode,
        end: FrameEnd,
    ) -> Result<(), HalStatus>;

    /// Copy bytes received by the last read into `buf`
    fn take_received(&mut self, buf: &mut [u8]) -> usize;

    /// Bytes moved by the current or last transfer
    fn transfer_count(&self) -> usize;

    /// Interrupt half, for the board's vector table
    fn irq(&self) -> &'static dyn I2cIrq;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_init_uses_sentinel() {
        let init = HandleInit::master(400_000);
        assert_eq!(init.own_address, 0xFE);
        assert_eq!(init.clock_speed, 400_000);
        assert_eq!(init.addressing, AddressingMode::SevenBit);
        assert!(!init.general_call);
    }

    #[test]
    fn test_frames_end_with_stop_by_default() {
        assert_eq!(FrameEnd::default(), FrameEnd::Stop);
    }
}
