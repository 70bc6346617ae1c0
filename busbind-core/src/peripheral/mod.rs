//! I2C peripheral object
//!
//! One [`I2cPeripheral`] exists per physical bus for the whole process
//! lifetime; the bus registry creates them and hands out references. The
//! object validates every request, enforces the lifecycle in
//! [`state::PeripheralState`], and delegates bus activity to its
//! [`DriverHandle`].
//!
//! # Transfers
//!
//! Transfers are started non-blocking on the vendor driver. Their outcome is
//! published by the driver's interrupt handler into the bus's
//! [`TransferStatus`] cell. The synchronous [`I2cPeripheral::transfer`]
//! busy-polls that cell until a deadline; the asynchronous form is
//! [`I2cPeripheral::start_write`]/[`I2cPeripheral::start_read`] followed by
//! [`I2cPeripheral::poll`].

pub mod helpers;
pub mod state;

pub use state::{Event, PeripheralState};

use busbind_hal::i2c::is_valid_peer_address;
use busbind_hal::{I2cIrq, MAX_TRANSFER_LEN};
use embedded_hal::delay::DelayNs;

use crate::adapter::{Capability, DriverHandle, Request, Transport};
use crate::bus::BusId;
use crate::config::{BindingConfig, BusConfig, Role};
use crate::error::{Error, Result};
use crate::status::{Outcome, TransferStatus};

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Master writes to the peer
    Write,
    /// Master reads from the peer
    Read,
}

/// Synchronous transfer request with its buffer
#[derive(Debug)]
pub enum Transfer<'a> {
    /// Write these bytes
    Write(&'a [u8]),
    /// Fill this buffer
    Read(&'a mut [u8]),
}

impl Transfer<'_> {
    /// Direction of this transfer
    pub fn direction(&self) -> Direction {
        match self {
            Transfer::Write(_) => Direction::Write,
            Transfer::Read(_) => Direction::Read,
        }
    }
}

/// Configuration in effect on a ready object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActiveConfig {
    /// Bus role
    pub role: Role,
    /// Frequency the runtime asked for (Hz)
    pub requested: u32,
    /// SCL rate the vendor driver runs at (Hz)
    pub frequency: u32,
}

/// Binding settings each object carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tuning {
    pub ready_retries: u8,
    pub poll_interval_us: u32,
}

impl From<&BindingConfig> for Tuning {
    fn from(config: &BindingConfig) -> Self {
        Self {
            ready_retries: config.ready_retries,
            poll_interval_us: config.poll_interval_us.max(1),
        }
    }
}

/// Long-lived binding for one physical I2C bus
#[derive(Debug)]
pub struct I2cPeripheral<T> {
    bus: BusId,
    handle: Option<DriverHandle<T>>,
    state: PeripheralState,
    active: Option<ActiveConfig>,
    status: &'static TransferStatus,
    tuning: Tuning,
}

impl<T: Transport> I2cPeripheral<T> {
    pub(crate) fn new(bus: BusId, status: &'static TransferStatus, tuning: Tuning) -> Self {
        Self {
            bus,
            handle: None,
            state: PeripheralState::Uninitialized,
            active: None,
            status,
            tuning,
        }
    }

    pub(crate) fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn attach(&mut self, handle: DriverHandle<T>) {
        self.handle = Some(handle);
    }

    /// Bus this object represents
    pub fn bus(&self) -> BusId {
        self.bus
    }

    /// Current lifecycle state
    ///
    /// A transfer whose completion the interrupt handler already published
    /// no longer counts as outstanding.
    pub fn status(&self) -> PeripheralState {
        match self.state {
            PeripheralState::Busy if !self.status.is_busy() => {
                self.state.transition(Event::TransferFinished)
            }
            state => state,
        }
    }

    /// Whether the object is configured and idle
    pub fn is_ready(&self) -> bool {
        self.status() == PeripheralState::Ready
    }

    /// Configuration in effect
    pub fn active_config(&self) -> Option<ActiveConfig> {
        self.active
    }

    /// SCL rate in effect (Hz)
    pub fn frequency(&self) -> Option<u32> {
        self.active.map(|a| a.frequency)
    }

    /// Configured role
    pub fn role(&self) -> Option<Role> {
        self.active.map(|a| a.role)
    }

    /// Vendor shape behind this bus, once a driver is bound
    pub fn capability(&self) -> Option<Capability> {
        self.handle.as_ref().map(DriverHandle::capability)
    }

    /// Driver handle, once bound
    pub fn handle(&self) -> Option<&DriverHandle<T>> {
        self.handle.as_ref()
    }

    fn sync_state(&mut self) {
        self.state = self.status();
    }

    /// Fully reset the vendor driver and apply `config`
    ///
    /// Invalid arguments leave the object untouched. Any failure after the
    /// reset leaves it uninitialized with no recorded configuration.
    pub(crate) fn configure(&mut self, config: BusConfig) -> Result<()> {
        self.sync_state();
        if !self.state.accepts_configure() {
            return Err(Error::Busy);
        }
        if config.frequency == 0 {
            return Err(Error::InvalidFrequency);
        }
        let handle = self.handle.as_mut().ok_or(Error::UnsupportedBus)?;

        let transport = handle.transport_mut();
        transport.release();
        self.status.reset();
        self.active = None;
        self.state = self.state.transition(Event::Reset);

        let frequency = bring_up(transport, self.status, self.tuning.ready_retries, config.frequency)
            .map_err(|e| {
                warn!("I2C{}: initialize failed: {}", self.bus.number(), e);
                e
            })?;

        self.active = Some(ActiveConfig {
            role: config.role,
            requested: config.frequency,
            frequency,
        });
        self.state = self.state.transition(Event::Configured);
        info!("I2C{}: ready at {} Hz", self.bus.number(), frequency);
        Ok(())
    }

    /// Release transient resources and return to uninitialized
    ///
    /// An outstanding transfer is abandoned; its completion, if it still
    /// arrives, is dropped. The object stays allocated and bound to its
    /// driver for a later `initialize`.
    pub fn deinitialize(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.transport_mut().release();
        }
        self.status.reset();
        self.active = None;
        self.state = self.state.transition(Event::Deinitialized);
        debug!("I2C{}: deinitialized", self.bus.number());
    }

    /// Run a transfer to completion
    ///
    /// Returns the number of bytes moved. On [`Error::Timeout`] the transfer
    /// stays outstanding and the object stays `Busy` until it completes or
    /// the object is deinitialized.
    ///
    /// # Arguments
    /// * `address` - 7-bit peer address; the master sentinel is refused
    /// * `transfer` - Direction and buffer
    /// * `timeout_ms` - Deadline for completion
    /// * `delay` - Delay source used between status polls
    pub fn transfer<D: DelayNs>(
        &mut self,
        address: u8,
        transfer: Transfer<'_>,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<usize> {
        match transfer {
            Transfer::Write(data) => {
                self.begin(address, Request::Write(data), false)?;
                self.wait(timeout_ms, delay)
            }
            Transfer::Read(buf) => {
                self.begin(address, Request::Read(buf.len()), false)?;
                self.wait(timeout_ms, delay)?;
                Ok(self.finish_read(buf))
            }
        }
    }

    /// Write `data` to `address`
    pub fn write<D: DelayNs>(
        &mut self,
        address: u8,
        data: &[u8],
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<usize> {
        self.transfer(address, Transfer::Write(data), timeout_ms, delay)
    }

    /// Fill `buf` from `address`
    pub fn read<D: DelayNs>(
        &mut self,
        address: u8,
        buf: &mut [u8],
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<usize> {
        self.transfer(address, Transfer::Read(buf), timeout_ms, delay)
    }

    /// Start writing `data` to `address` without waiting
    pub fn start_write(&mut self, address: u8, data: &[u8]) -> Result<()> {
        self.begin(address, Request::Write(data), false)
    }

    /// Start reading `len` bytes from `address` without waiting
    pub fn start_read(&mut self, address: u8, len: usize) -> Result<()> {
        self.begin(address, Request::Read(len), false)
    }

    /// Claim the outcome of the outstanding transfer
    ///
    /// Returns `None` while it is still running or when there is nothing to
    /// claim.
    pub fn poll(&mut self) -> Option<Result<usize>> {
        let outcome = self.status.take()?;
        self.state = self.state.transition(Event::TransferFinished);
        Some(match outcome {
            Outcome::Done { count } => Ok(count),
            Outcome::Failed { fault, .. } => {
                debug!("I2C{}: transfer failed: {}", self.bus.number(), fault);
                Err(Error::Bus(fault))
            }
        })
    }

    /// Copy the bytes of a completed read into `buf`
    pub fn finish_read(&mut self, buf: &mut [u8]) -> usize {
        self.handle
            .as_mut()
            .map_or(0, |h| h.transport_mut().take_received(buf))
    }

    /// Interrupt half of a legacy handle, for the board's vectors
    ///
    /// The reference is `'static` and independent of this object, so a board
    /// fetches it once at boot and calls it from the event and error vectors
    /// while the API side keeps `&mut` access. `None` for generic drivers and
    /// before a driver is bound.
    pub fn irq(&self) -> Option<&'static dyn I2cIrq> {
        self.handle.as_ref().and_then(|h| h.transport().irq())
    }

    pub(crate) fn begin(&mut self, address: u8, request: Request<'_>, pending: bool) -> Result<()> {
        if !is_valid_peer_address(address) {
            return Err(Error::InvalidAddress);
        }
        self.sync_state();
        match self.state {
            PeripheralState::Uninitialized => return Err(Error::NotInitialized),
            PeripheralState::Busy => return Err(Error::Busy),
            PeripheralState::Ready => {}
        }
        if request.len() > MAX_TRANSFER_LEN || matches!(request, Request::Read(0)) {
            return Err(Error::InvalidLength);
        }
        let handle = self.handle.as_mut().ok_or(Error::NotInitialized)?;

        // Armed before the start call; the driver may complete inside it
        self.status.begin();
        if let Err(e) = handle.transport_mut().start(address, request, pending) {
            self.status.reset();
            return Err(e);
        }
        self.state = self.state.transition(Event::TransferStarted);
        trace!("I2C{}: started {} bytes to {:x}", self.bus.number(), request.len(), address);
        Ok(())
    }

    pub(crate) fn wait<D: DelayNs>(&mut self, timeout_ms: u32, delay: &mut D) -> Result<usize> {
        let budget_us = u64::from(timeout_ms) * 1000;
        let interval = self.tuning.poll_interval_us;
        let mut waited_us = 0u64;
        loop {
            if let Some(result) = self.poll() {
                return result;
            }
            if waited_us >= budget_us {
                let transferred = self
                    .handle
                    .as_ref()
                    .map_or(0, |h| h.transport().transferred())
                    .max(self.status.transferred());
                debug!("I2C{}: timeout after {} bytes", self.bus.number(), transferred);
                return Err(Error::Timeout { transferred });
            }
            delay.delay_us(interval);
            waited_us += u64::from(interval);
        }
    }
}

/// Run vendor setup with bounded retries, then program the frequency
fn bring_up<T: Transport>(
    transport: &mut T,
    sink: &'static TransferStatus,
    retries: u8,
    frequency: u32,
) -> Result<u32> {
    let mut attempt = 0u8;
    loop {
        match transport.setup(sink) {
            Ok(()) if transport.is_ready() => break,
            Ok(()) => {}
            Err(e) if e.is_transient() => {}
            Err(_) => {
                transport.release();
                return Err(Error::DriverNotReady);
            }
        }
        if attempt >= retries {
            transport.release();
            return Err(Error::DriverNotReady);
        }
        attempt += 1;
        debug!("I2C driver not ready, retry {}", attempt);
    }
    transport.configure(frequency).inspect_err(|_| transport.release())
}
