//! Transport over a register-level vendor handle
//!
//! The handle is put in master mode by programming the reserved own address
//! [`busbind_hal::MASTER_ADDRESS`]. When the board assigns DMA streams to the
//! bus, they are reserved during setup, used for every data-carrying
//! transfer, and released on teardown.

use busbind_hal::{
    DmaDescriptor, DriverError, EventSink, FrameEnd, HalStatus, HandleInit, HandleState, I2cIrq,
    LegacyI2cHandle, TransferMode,
};

use super::{Capability, Request, Transport};
use crate::error::{Error, Result};

/// Rate programmed during setup, before the first `configure`
const SETUP_FREQUENCY: u32 = 100_000;

/// TX/RX DMA streams assigned to one bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaPair {
    pub tx: &'static DmaDescriptor,
    pub rx: &'static DmaDescriptor,
}

/// [`Transport`] for a [`LegacyI2cHandle`]
#[derive(Debug)]
pub struct LegacyDma<H> {
    handle: H,
    dma: Option<DmaPair>,
    dma_reserved: bool,
    set_up: bool,
}

impl<H: LegacyI2cHandle> LegacyDma<H> {
    /// Interrupt-driven transfers only
    pub fn new(handle: H) -> Self {
        Self {
            handle,
            dma: None,
            dma_reserved: false,
            set_up: false,
        }
    }

    /// Transfers through the given DMA streams
    pub fn with_dma(handle: H, dma: DmaPair) -> Self {
        Self {
            dma: Some(dma),
            ..Self::new(handle)
        }
    }

    /// Vendor handle
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Whether DMA streams are currently reserved
    pub fn uses_dma(&self) -> bool {
        self.dma_reserved
    }

    fn reserve_dma(&mut self) -> core::result::Result<(), DriverError> {
        let Some(dma) = self.dma else {
            return Ok(());
        };
        self.handle.reserve_dma(dma.tx).map_err(driver_error)?;
        if let Err(e) = self.handle.reserve_dma(dma.rx) {
            self.handle.release_dma(dma.tx);
            return Err(driver_error(e));
        }
        self.dma_reserved = true;
        Ok(())
    }

    fn release_dma(&mut self) {
        if let (true, Some(dma)) = (self.dma_reserved, self.dma) {
            self.handle.release_dma(dma.tx);
            self.handle.release_dma(dma.rx);
        }
        self.dma_reserved = false;
    }

    fn mode(&self, request: &Request<'_>) -> TransferMode {
        match (self.dma_reserved, self.dma) {
            (true, Some(dma)) if !request.is_empty() => match request {
                Request::Write(_) => TransferMode::Dma(dma.tx),
                Request::Read(_) => TransferMode::Dma(dma.rx),
            },
            _ => TransferMode::Interrupt,
        }
    }
}

fn driver_error(status: HalStatus) -> DriverError {
    match status {
        HalStatus::Busy => DriverError::Busy,
        HalStatus::Timeout => DriverError::Timeout,
        HalStatus::Error => DriverError::Error,
    }
}

impl<H: LegacyI2cHandle> Transport for LegacyDma<H> {
    const CAPABILITY: Capability = Capability::LegacyDma;

    fn setup(&mut self, sink: &'static dyn EventSink) -> core::result::Result<(), DriverError> {
        if self.set_up {
            self.release();
        }
        self.handle.register_callbacks(sink);
        self.reserve_dma()?;
        self.set_up = true;
        self.handle
            .init(&HandleInit::master(SETUP_FREQUENCY))
            .map_err(driver_error)
    }

    fn is_ready(&self) -> bool {
        self.set_up && self.handle.state() == HandleState::Ready
    }

    fn configure(&mut self, frequency: u32) -> Result<u32> {
        if frequency == 0 {
            return Err(Error::InvalidFrequency);
        }
        self.handle.deinit().map_err(|_| Error::DriverNotReady)?;
        self.handle
            .init(&HandleInit::master(frequency))
            .map_err(|_| Error::InvalidFrequency)?;
        Ok(self.handle.baudrate())
    }

    fn start(&mut self, address: u8, request: Request<'_>, pending: bool) -> Result<()> {
        let mode = self.mode(&request);
        let end = if pending { FrameEnd::Hold } else { FrameEnd::Stop };
        let started = match request {
            Request::Write(data) => self.handle.master_transmit(address, data, mode, end),
            Request::Read(len) => self.handle.master_receive(address, len, mode, end),
        };
        started.map_err(|s| Error::from(driver_error(s)))
    }

    fn take_received(&mut self, buf: &mut [u8]) -> usize {
        self.handle.take_received(buf)
    }

    fn transferred(&self) -> usize {
        self.handle.transfer_count()
    }

    fn release(&mut self) {
        // Teardown failures leave nothing for the caller to act on
        let _ = self.handle.deinit();
        self.release_dma();
        self.set_up = false;
    }

    fn irq(&self) -> Option<&'static dyn I2cIrq> {
        Some(self.handle.irq())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TransferStatus;
    use busbind_hal::mock::{MockHandle, SimBus, SimMode, SimTransaction};
    use busbind_hal::MASTER_ADDRESS;

    static TX: DmaDescriptor = DmaDescriptor {
        controller: 1,
        stream: 6,
        request: 1,
    };
    static RX: DmaDescriptor = DmaDescriptor {
        controller: 1,
        stream: 0,
        request: 1,
    };

    fn sink() -> &'static TransferStatus {
        Box::leak(Box::new(TransferStatus::new()))
    }

    #[test]
    fn test_setup_enters_master_mode() {
        let sim = SimBus::shared();
        let mut transport = LegacyDma::new(MockHandle::new(sim.clone()));
        transport.setup(sink()).unwrap();

        assert!(transport.is_ready());
        let init = transport.handle().init_struct().unwrap();
        assert_eq!(init.own_address, MASTER_ADDRESS);
    }

    #[test]
    fn test_configure_reads_back_baudrate() {
        let sim = SimBus::shared();
        let mut transport = LegacyDma::new(MockHandle::new(sim.clone()));
        transport.setup(sink()).unwrap();

        assert_eq!(transport.configure(400_000), Ok(400_000));
        assert_eq!(transport.handle().init_struct().unwrap().clock_speed, 400_000);
        assert_eq!(transport.configure(0), Err(Error::InvalidFrequency));
    }

    #[test]
    fn test_dma_reserved_and_released() {
        let sim = SimBus::shared();
        let mut transport =
            LegacyDma::with_dma(MockHandle::new(sim.clone()), DmaPair { tx: &TX, rx: &RX });
        transport.setup(sink()).unwrap();
        assert!(transport.uses_dma());
        assert_eq!(sim.borrow().reserved_dma(), vec![6, 0]);

        transport.release();
        assert!(!transport.uses_dma());
        assert!(sim.borrow().reserved_dma().is_empty());
    }

    #[test]
    fn test_dma_used_for_data_transfers_only() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_loopback(0x50);
        let mut transport =
            LegacyDma::with_dma(MockHandle::new(sim.clone()), DmaPair { tx: &TX, rx: &RX });
        transport.setup(sink()).unwrap();

        transport.start(0x50, Request::Write(&[1, 2]), false).unwrap();
        transport.start(0x50, Request::Read(2), false).unwrap();
        transport.start(0x50, Request::Write(&[]), false).unwrap();

        assert_eq!(
            sim.borrow().modes(),
            vec![
                SimMode::Dma { stream: 6 },
                SimMode::Dma { stream: 0 },
                SimMode::Interrupt
            ]
        );
    }

    #[test]
    fn test_interrupt_only_without_dma() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_loopback(0x50);
        let mut transport = LegacyDma::new(MockHandle::new(sim.clone()));
        transport.setup(sink()).unwrap();
        transport.start(0x50, Request::Write(&[1]), false).unwrap();

        assert!(!transport.uses_dma());
        assert_eq!(sim.borrow().modes(), vec![SimMode::Interrupt]);
    }

    #[test]
    fn test_pending_write_holds_bus_for_read() {
        let sim = SimBus::shared();
        sim.borrow_mut().add_memory(0x50, 1);
        let mut transport =
            LegacyDma::with_dma(MockHandle::new(sim.clone()), DmaPair { tx: &TX, rx: &RX });
        transport.setup(sink()).unwrap();

        transport.start(0x50, Request::Write(&[0x04]), true).unwrap();
        transport.start(0x50, Request::Read(2), false).unwrap();

        assert_eq!(
            sim.borrow().transactions(),
            vec![SimTransaction::WriteRead {
                addr: 0x50,
                data: vec![0x04],
                len: 2
            }]
        );
    }

    #[test]
    fn test_irq_half_comes_from_handle() {
        let sim = SimBus::shared();
        let transport = LegacyDma::new(MockHandle::new(sim.clone()));
        let irq = transport.irq().unwrap();
        assert!(core::ptr::addr_eq(irq, sim.borrow().irq()));
    }
}
