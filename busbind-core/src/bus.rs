//! Physical bus identities

use core::fmt;

use crate::error::{Error, Result};

/// Number of I2C buses a board can expose
pub const MAX_BUSES: usize = 4;

/// Identity of one physical I2C bus
///
/// Numbered from 1, as the runtime names them (`I2C(1)` .. `I2C(4)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusId(u8);

impl BusId {
    /// Validate a runtime bus number
    pub fn new(id: u8) -> Result<Self> {
        if id == 0 || id as usize > MAX_BUSES {
            return Err(Error::UnsupportedBus);
        }
        Ok(Self(id))
    }

    /// Bus number as seen by the runtime
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based slot index
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// Bus identity of slot `index`
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u8 + 1)
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_numbers() {
        assert_eq!(BusId::new(0), Err(Error::UnsupportedBus));
        assert_eq!(BusId::new(5), Err(Error::UnsupportedBus));
        let bus = BusId::new(4).unwrap();
        assert_eq!(bus.number(), 4);
        assert_eq!(bus.index(), 3);
        assert_eq!(BusId::from_index(0), BusId::new(1).unwrap());
    }
}
