//! Bus helpers built on the master transfer primitives

use busbind_hal::{BusFault, MAX_TRANSFER_LEN};
use embedded_hal::delay::DelayNs;
use heapless::Vec;

use super::I2cPeripheral;
use crate::adapter::{Request, Transport};
use crate::error::{Error, Result};

/// First address probed by [`I2cPeripheral::scan`]
pub const SCAN_FIRST: u8 = 0x08;

/// Last address probed by [`I2cPeripheral::scan`]
pub const SCAN_LAST: u8 = 0x77;

/// Number of addresses a scan can report
pub const SCAN_CAPACITY: usize = (SCAN_LAST - SCAN_FIRST + 1) as usize;

/// Register address header, big-endian
fn register_header(mem_address: u16, addr_size: u8) -> Result<Vec<u8, 2>> {
    let bytes = mem_address.to_be_bytes();
    let header = match addr_size {
        8 => &bytes[1..],
        16 => &bytes[..],
        _ => return Err(Error::InvalidLength),
    };
    Vec::from_slice(header).map_err(|_| Error::InvalidLength)
}

impl<T: Transport> I2cPeripheral<T> {
    /// Check whether a peer acknowledges its address
    pub fn probe<D: DelayNs>(&mut self, address: u8, timeout_ms: u32, delay: &mut D) -> Result<bool> {
        match self.write(address, &[], timeout_ms, delay) {
            Ok(_) => Ok(true),
            Err(Error::Bus(BusFault::AddressNack)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Addresses in `0x08..=0x77` that acknowledge
    pub fn scan<D: DelayNs>(
        &mut self,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<Vec<u8, SCAN_CAPACITY>> {
        let mut found = Vec::new();
        for address in SCAN_FIRST..=SCAN_LAST {
            if self.probe(address, timeout_ms, delay)? {
                // Capacity covers the whole range
                let _ = found.push(address);
            }
        }
        debug!("I2C{}: scan found {} peers", self.bus.number(), found.len());
        Ok(found)
    }

    /// Write `data` to a register of a memory-mapped peer
    ///
    /// # Arguments
    /// * `address` - Peer address
    /// * `mem_address` - Register address
    /// * `addr_size` - Register address width in bits (8 or 16)
    /// * `data` - Bytes written from the register on
    ///
    /// Returns the number of data bytes written. The count carried by
    /// [`Error::Timeout`] likewise excludes the register address.
    pub fn mem_write<D: DelayNs>(
        &mut self,
        address: u8,
        mem_address: u16,
        addr_size: u8,
        data: &[u8],
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<usize> {
        let header = register_header(mem_address, addr_size)?;
        let mut frame: Vec<u8, MAX_TRANSFER_LEN> = Vec::new();
        frame
            .extend_from_slice(&header)
            .and_then(|_| frame.extend_from_slice(data))
            .map_err(|_| Error::InvalidLength)?;

        let written = self
            .write(address, &frame, timeout_ms, delay)
            .map_err(|e| match e {
                Error::Timeout { transferred } => Error::Timeout {
                    transferred: transferred.saturating_sub(header.len()),
                },
                e => e,
            })?;
        Ok(written.saturating_sub(header.len()))
    }

    /// Read registers of a memory-mapped peer into `buf`
    ///
    /// The register address is written without a stop condition, then the
    /// data is read with a repeated start.
    pub fn mem_read<D: DelayNs>(
        &mut self,
        address: u8,
        mem_address: u16,
        addr_size: u8,
        buf: &mut [u8],
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<usize> {
        let header = register_header(mem_address, addr_size)?;
        if buf.is_empty() {
            return Err(Error::InvalidLength);
        }

        self.begin(address, Request::Write(&header), true)?;
        self.wait(timeout_ms, delay)?;
        self.begin(address, Request::Read(buf.len()), false)?;
        self.wait(timeout_ms, delay)?;
        Ok(self.finish_read(buf))
    }
}
