//! I2C bus abstractions shared by both vendor driver shapes
//!
//! Provides bus speed classes, the event vocabulary used by interrupt
//! handlers, and fault kinds reported by the vendor layer.

/// Own-address value that places a legacy handle in master mode
///
/// Never a valid peer address.
pub const MASTER_ADDRESS: u8 = 0xFE;

/// Highest valid 7-bit peer address
pub const MAX_7BIT_ADDRESS: u8 = 0x7F;

/// Largest single transfer a vendor driver buffers internally
pub const MAX_TRANSFER_LEN: usize = 256;

/// Bus speed class
///
/// Capability-based drivers are programmed with a class rather than an
/// exact rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusSpeed {
    /// Standard mode (100 kHz)
    Standard,
    /// Fast mode (400 kHz)
    Fast,
    /// Fast mode plus (1 MHz)
    FastPlus,
    /// High speed mode (3.4 MHz)
    High,
}

impl BusSpeed {
    /// Nominal SCL rate of this class in Hz
    pub const fn nominal_hz(self) -> u32 {
        match self {
            BusSpeed::Standard => 100_000,
            BusSpeed::Fast => 400_000,
            BusSpeed::FastPlus => 1_000_000,
            BusSpeed::High => 3_400_000,
        }
    }

    /// Smallest class able to run at `frequency` Hz
    ///
    /// Returns `None` for zero or for rates above high speed mode.
    pub fn for_frequency(frequency: u32) -> Option<Self> {
        match frequency {
            0 => None,
            1..=100_000 => Some(BusSpeed::Standard),
            100_001..=400_000 => Some(BusSpeed::Fast),
            400_001..=1_000_000 => Some(BusSpeed::FastPlus),
            1_000_001..=3_400_000 => Some(BusSpeed::High),
            _ => None,
        }
    }
}

/// Fault kinds reported by the vendor layer
///
/// These are passed to the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    /// Peer did not acknowledge its address
    AddressNack,
    /// Peer did not acknowledge a data byte
    DataNack,
    /// Arbitration lost to another master
    ArbitrationLost,
    /// Misplaced START/STOP detected
    BusError,
    /// Transfer ended before all bytes were moved
    Incomplete,
    /// Vendor driver refused to start the transfer
    Driver(crate::driver::DriverError),
}

/// Event raised by a vendor driver from interrupt context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cEvent {
    /// Bytes moved so far on the outstanding transfer
    Progress { count: usize },
    /// Transfer finished; `count` bytes were moved
    TransferDone { count: usize },
    /// Transfer aborted by a bus fault after `count` bytes
    Fault { fault: BusFault, count: usize },
}

/// Receiver of vendor driver events
///
/// Implementations are called from interrupt context and must not block.
pub trait EventSink: Sync {
    /// Deliver one event
    fn signal(&self, event: I2cEvent);
}

/// Check whether `address` can be issued as a peer address
pub fn is_valid_peer_address(address: u8) -> bool {
    address != MASTER_ADDRESS && address <= MAX_7BIT_ADDRESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_class_boundaries() {
        assert_eq!(BusSpeed::for_frequency(0), None);
        assert_eq!(BusSpeed::for_frequency(10_000), Some(BusSpeed::Standard));
        assert_eq!(BusSpeed::for_frequency(100_000), Some(BusSpeed::Standard));
        assert_eq!(BusSpeed::for_frequency(100_001), Some(BusSpeed::Fast));
        assert_eq!(BusSpeed::for_frequency(400_000), Some(BusSpeed::Fast));
        assert_eq!(BusSpeed::for_frequency(1_000_000), Some(BusSpeed::FastPlus));
        assert_eq!(BusSpeed::for_frequency(3_400_000), Some(BusSpeed::High));
        assert_eq!(BusSpeed::for_frequency(3_400_001), None);
    }

    #[test]
    fn test_nominal_rates_map_back_to_class() {
        for speed in [
            BusSpeed::Standard,
            BusSpeed::Fast,
            BusSpeed::FastPlus,
            BusSpeed::High,
        ] {
            assert_eq!(BusSpeed::for_frequency(speed.nominal_hz()), Some(speed));
        }
    }

    #[test]
    fn test_sentinel_is_not_a_peer_address() {
        assert!(!is_valid_peer_address(MASTER_ADDRESS));
        assert!(!is_valid_peer_address(0x80));
        assert!(is_valid_peer_address(0x50));
        assert!(is_valid_peer_address(0x00));
    }
}
