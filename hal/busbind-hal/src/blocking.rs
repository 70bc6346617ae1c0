//! Generic driver over a blocking `embedded-hal` I2C bus
//!
//! Boards whose HAL exposes an `embedded_hal::i2c::I2c` implementation
//! (embassy, rp-hal, stm32 HALs, ...) can use this adapter as their
//! [`I2cDriver`]. Transfers complete inside the start call, and the result
//! is reported through the event sink just as an interrupt handler would.
//!
//! The SCL rate of such buses is fixed when the HAL object is built, so the
//! driver only accepts the speed class of that wired rate.
//!
//! A write started with `pending` set is held back and reported done at
//! once. It goes out with the read that follows as one write-read
//! transaction, so the peer sees a repeated start instead of a stop. A
//! fault on the held write surfaces on that read.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};
use heapless::Vec;

use crate::driver::{Control, DriverError, DriverStatus, I2cDriver, PowerState};
use crate::i2c::{BusFault, BusSpeed, EventSink, I2cEvent, MAX_TRANSFER_LEN};

/// Write waiting for the repeated start
struct HeldWrite {
    address: u8,
    data: Vec<u8, MAX_TRANSFER_LEN>,
}

/// [`I2cDriver`] backed by a blocking `embedded-hal` bus
pub struct BlockingDriver<I> {
    bus: I,
    wired: BusSpeed,
    sink: Option<&'static dyn EventSink>,
    powered: bool,
    rx: Vec<u8, MAX_TRANSFER_LEN>,
    held: Option<HeldWrite>,
    count: usize,
    last_fault: Option<BusFault>,
}

impl<I: I2c> BlockingDriver<I> {
    /// Wrap `bus`, which the HAL configured for `wired_frequency` Hz
    ///
    /// Fails with [`DriverError::Parameter`] when the rate falls in no speed
    /// class.
    pub fn new(bus: I, wired_frequency: u32) -> Result<Self, DriverError> {
        let wired = BusSpeed::for_frequency(wired_frequency).ok_or(DriverError::Parameter)?;
        Ok(Self {
            bus,
            wired,
            sink: None,
            powered: false,
            rx: Vec::new(),
            held: None,
            count: 0,
            last_fault: None,
        })
    }

    /// Speed class the bus was wired for
    pub fn wired_speed(&self) -> BusSpeed {
        self.wired
    }

    /// Give the HAL bus back
    pub fn release(self) -> I {
        self.bus
    }

    fn check_usable(&self) -> Result<&'static dyn EventSink, DriverError> {
        match self.sink {
            Some(sink) if self.powered => Ok(sink),
            _ => Err(DriverError::Error),
        }
    }

    /// Send a held write on its own
    fn flush_held(&mut self) -> Result<(), BusFault> {
        match self.held.take() {
            Some(held) => self.bus.write(held.address, &held.data).map_err(fault_of),
            None => Ok(()),
        }
    }

    fn finish(&mut self, sink: &'static dyn EventSink, result: Result<usize, BusFault>) {
        match result {
            Ok(count) => {
                self.count = count;
                self.last_fault = None;
                sink.signal(I2cEvent::TransferDone { count });
            }
            Err(fault) => {
                self.count = 0;
                self.last_fault = Some(fault);
                sink.signal(I2cEvent::Fault { fault, count: 0 });
            }
        }
    }
}

fn fault_of<E: embedded_hal::i2c::Error>(e: E) -> BusFault {
    fault_from_kind(e.kind())
}

/// Map an `embedded-hal` error kind onto a vendor fault
fn fault_from_kind(kind: ErrorKind) -> BusFault {
    match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => BusFault::DataNack,
        ErrorKind::NoAcknowledge(_) => BusFault::AddressNack,
        ErrorKind::ArbitrationLoss => BusFault::ArbitrationLost,
        ErrorKind::Bus => BusFault::BusError,
        _ => BusFault::Incomplete,
    }
}

impl<I: I2c> I2cDriver for BlockingDriver<I> {
    fn initialize(&mut self, sink: &'static dyn EventSink) -> Result<(), DriverError> {
        self.sink = Some(sink);
        self.rx.clear();
        self.held = None;
        self.count = 0;
        self.last_fault = None;
        Ok(())
    }

    fn uninitialize(&mut self) -> Result<(), DriverError> {
        self.sink = None;
        self.powered = false;
        self.held = None;
        Ok(())
    }

    fn power_control(&mut self, state: PowerState) -> Result<(), DriverError> {
        if self.sink.is_none() {
            return Err(DriverError::Error);
        }
        self.powered = state == PowerState::Full;
        Ok(())
    }

    fn control(&mut self, control: Control) -> Result<(), DriverError> {
        match control {
            Control::BusSpeed(speed) if speed == self.wired => Ok(()),
            Control::BusSpeed(_) => Err(DriverError::Unsupported),
            // Master-only; the own address is never used
            Control::OwnAddress(_) => Ok(()),
            Control::BusClear | Control::AbortTransfer => Err(DriverError::Unsupported),
        }
    }

    fn master_transmit(
        &mut self,
        address: u8,
        data: &[u8],
        pending: bool,
    ) -> Result<(), DriverError> {
        let sink = self.check_usable()?;
        if let Err(fault) = self.flush_held() {
            self.finish(sink, Err(fault));
            return Ok(());
        }
        if pending {
            let data = Vec::from_slice(data).map_err(|()| DriverError::Parameter)?;
            let count = data.len();
            self.held = Some(HeldWrite { address, data });
            self.finish(sink, Ok(count));
            return Ok(());
        }
        let result = self.bus.write(address, data).map(|()| data.len());
        self.finish(sink, result.map_err(fault_of));
        Ok(())
    }

    /// Reads always end with a stop; `pending` is not honoured here
    fn master_receive(
        &mut self,
        address: u8,
        len: usize,
        _pending: bool,
    ) -> Result<(), DriverError> {
        let sink = self.check_usable()?;
        if len > MAX_TRANSFER_LEN {
            return Err(DriverError::Parameter);
        }
        self.rx.clear();
        self.rx
            .resize_default(len)
            .map_err(|_| DriverError::Parameter)?;
        let result = match self.held.take() {
            Some(held) if held.address == address => {
                self.bus.write_read(address, &held.data, &mut self.rx)
            }
            Some(held) => self
                .bus
                .write(held.address, &held.data)
                .and_then(|()| self.bus.read(address, &mut self.rx)),
            None => self.bus.read(address, &mut self.rx),
        };
        if result.is_err() {
            self.rx.clear();
        }
        self.finish(sink, result.map(|()| len).map_err(fault_of));
        Ok(())
    }

    fn read_received(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        n
    }

    fn data_count(&self) -> usize {
        self.count
    }

    fn status(&self) -> DriverStatus {
        DriverStatus {
            initialized: self.sink.is_some(),
            powered: self.powered,
            busy: false,
            arbitration_lost: self.last_fault == Some(BusFault::ArbitrationLost),
            bus_error: self.last_fault == Some(BusFault::BusError),
        }
    }
}
