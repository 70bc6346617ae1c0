//! Error types for peripheral object operations

use core::fmt;

pub use busbind_hal::{BusFault, DriverError};

/// Result type for peripheral object operations
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced to the runtime
///
/// Every failure reaches the caller as one of these variants; vendor faults
/// keep their kind inside [`Error::Bus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bus identity outside the supported set, or no driver on this board
    UnsupportedBus,
    /// Frequency zero, out of range, or rejected by the vendor driver
    InvalidFrequency,
    /// Vendor driver failed its internal setup
    DriverNotReady,
    /// Object used before `initialize`
    NotInitialized,
    /// Reserved master sentinel or a non 7-bit peer address
    InvalidAddress,
    /// Deadline passed; `transferred` bytes had moved
    Timeout { transferred: usize },
    /// Fault reported by the vendor driver
    Bus(BusFault),
    /// A transfer is still outstanding on this bus
    Busy,
    /// Buffer or register address length not acceptable
    InvalidLength,
}

impl Error {
    /// Bytes moved before the failure, where meaningful
    pub fn transferred(&self) -> usize {
        match self {
            Error::Timeout { transferred } => *transferred,
            _ => 0,
        }
    }
}

impl From<BusFault> for Error {
    fn from(fault: BusFault) -> Self {
        Error::Bus(fault)
    }
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Busy => Error::Busy,
            DriverError::Timeout => Error::Timeout { transferred: 0 },
            other => Error::Bus(BusFault::Driver(other)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedBus => write!(f, "I2C bus not supported"),
            Error::InvalidFrequency => write!(f, "invalid I2C frequency"),
            Error::DriverNotReady => write!(f, "I2C driver not ready"),
            Error::NotInitialized => write!(f, "I2C bus not initialized"),
            Error::InvalidAddress => write!(f, "invalid I2C peer address"),
            Error::Timeout { transferred } => {
                write!(f, "I2C timeout after {} bytes", transferred)
            }
            Error::Bus(fault) => write!(f, "I2C bus error: {:?}", fault),
            Error::Busy => write!(f, "I2C bus busy"),
            Error::InvalidLength => write!(f, "invalid I2C transfer length"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_driver_error_mapping() {
        assert_eq!(Error::from(DriverError::Busy), Error::Busy);
        assert_eq!(
            Error::from(DriverError::Timeout),
            Error::Timeout { transferred: 0 }
        );
        assert_eq!(
            Error::from(DriverError::Parameter),
            Error::Bus(BusFault::Driver(DriverError::Parameter))
        );
    }

    #[test]
    fn test_fault_kind_preserved() {
        let e: Error = BusFault::ArbitrationLost.into();
        assert_eq!(e, Error::Bus(BusFault::ArbitrationLost));
        assert_eq!(e.to_string(), "I2C bus error: ArbitrationLost");
    }

    #[test]
    fn test_timeout_carries_partial_count() {
        let e = Error::Timeout { transferred: 5 };
        assert_eq!(e.transferred(), 5);
        assert_eq!(e.to_string(), "I2C timeout after 5 bytes");
        assert_eq!(Error::Busy.transferred(), 0);
    }
}
