//! Transport over a capability-based vendor driver
//!
//! Frequencies are mapped to the smallest bus speed class that can run
//! them; the nominal rate of that class is the rate in effect.

use busbind_hal::{BusSpeed, Control, DriverError, EventSink, I2cDriver, PowerState};

use super::{Capability, Request, Transport};
use crate::error::{Error, Result};

/// [`Transport`] for an [`I2cDriver`]
#[derive(Debug)]
pub struct Generic<D> {
    driver: D,
    initialized: bool,
}

impl<D: I2cDriver> Generic<D> {
    /// Wrap a vendor driver instance
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            initialized: false,
        }
    }

    /// Vendor driver
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: I2cDriver> Transport for Generic<D> {
    const CAPABILITY: Capability = Capability::Generic;

    fn setup(&mut self, sink: &'static dyn EventSink) -> core::result::Result<(), DriverError> {
        if self.initialized {
            self.release();
        }
        self.driver.initialize(sink)?;
        self.initialized = true;
        self.driver.power_control(PowerState::Full)
    }

    fn is_ready(&self) -> bool {
        let status = self.driver.status();
        self.initialized && status.initialized && status.powered
    }

    fn configure(&mut self, frequency: u32) -> Result<u32> {
        let speed = BusSpeed::for_frequency(frequency).ok_or(Error::InvalidFrequency)?;
        self.driver
            .control(Control::BusSpeed(speed))
            .map_err(|_| Error::InvalidFrequency)?;
        Ok(speed.nominal_hz())
    }

    fn start(&mut self, address: u8, request: Request<'_>, pending: bool) -> Result<()> {
        match request {
            Request::Write(data) => self.driver.master_transmit(address, data, pending)?,
            Request::Read(len) => self.driver.master_receive(address, len, pending)?,
        }
        Ok(())
    }

    fn take_received(&mut self, buf: &mut [u8]) -> usize {
        self.driver.read_received(buf)
    }

    fn transferred(&self) -> usize {
        self.driver.data_count()
    }

    fn release(&mut self) {
        if !self.initialized {
            return;
        }
        // Teardown failures leave nothing for the caller to act on
        let _ = self.driver.power_control(PowerState::Off);
        let _ = self.driver.uninitialize();
        self.initialized = false;
    }
}
